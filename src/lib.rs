//! Gradebook Toolkit
//!
//! Turns an exported assignment-results spreadsheet into cleaned, styled
//! report artifacts. The workflow: extract a fixed set of columns with
//! header normalization, filter rows by category, resolve duplicate records
//! sharing an email address (one kept row per group), then export the
//! resolved table as a styled xlsx plus portrait and landscape PDF reports.
//!
//! This library provides:
//! - `extract`: fixed-column extraction with header normalization
//! - `filter`: role-based column lookup and the category filter
//! - `resolve`: the duplicate-resolution state machine
//! - `xlsx_export` / `pdf_report`: the three artifact serializers
//! - `pipeline`: a [`pipeline::Session`] tying the stages together
//!
//! Binaries:
//! - `grade-report`: CLI for inspecting workbooks and producing reports

pub mod error;
pub mod extract;
pub mod filter;
pub mod pdf_report;
pub mod pipeline;
pub mod report;
pub mod resolve;
pub mod table;
pub mod xlsx_export;

pub use error::ReportError;
pub use pipeline::{ExportOptions, ExportOutcome, Session, SessionConfig};
pub use table::{Cell, Table};
