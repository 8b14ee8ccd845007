//! Error taxonomy for the report pipeline.
//!
//! Every variant here is recoverable at the feature level: a missing column
//! disables filtering or resolution, an incomplete resolution blocks export,
//! and a serialization failure drops one artifact. Nothing in this crate has
//! a global crash path for malformed input.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// A required column could not be located by fuzzy header match.
    /// The caller should disable the dependent feature, not abort.
    #[error("no column matching '{keyword}' found for the {role} role")]
    ColumnNotFound {
        role: &'static str,
        keyword: String,
    },

    /// The category column exists but holds no usable distinct values.
    #[error("category column '{column}' has no non-empty values")]
    EmptyOptionSet { column: String },

    /// Export was requested while duplicate groups are still unresolved.
    #[error("{unresolved} duplicate group(s) still need a choice before export")]
    IncompleteResolution { unresolved: usize },

    /// A chosen row does not belong to the group it was chosen for.
    #[error("row {row} is not a member of the duplicate group for '{key}'")]
    InvalidChoice { key: String, row: usize },

    /// There is no duplicate group for the given key.
    #[error("no duplicate group with key '{key}'")]
    UnknownGroup { key: String },

    /// Building an output artifact failed; only that artifact is dropped.
    #[error("failed to build {artifact} output: {message}")]
    Serialization {
        artifact: &'static str,
        message: String,
    },
}

impl ReportError {
    pub fn serialization(artifact: &'static str, err: impl std::fmt::Display) -> Self {
        ReportError::Serialization {
            artifact,
            message: err.to_string(),
        }
    }
}
