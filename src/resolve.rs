//! Duplicate resolution over the filtered table.
//!
//! Rows sharing a key-column value (email) form duplicate groups; the user
//! picks exactly one row per group before any export is allowed. The
//! resolver is rebuilt whenever the filtered table changes, so a recorded
//! choice can never silently carry over to a different row set — saved
//! choices are validated against a signature of the row set they were made
//! for.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use crate::error::ReportError;
use crate::table::Table;

/// One set of rows sharing a key value, size >= 2. Row ids are indices into
/// the filtered table the resolver was built from.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub key: String,
    pub rows: Vec<usize>,
}

/// Resolution progress, reported to the caller that gates export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStatus {
    /// No header matches the key role. Reported by the session layer;
    /// duplicate resolution and export are unavailable.
    KeyColumnMissing,
    /// Every key value is unique; the filtered table is already resolved.
    NoDuplicates,
    /// At least one group has no recorded choice yet.
    Pending { unresolved: usize },
    /// Every group has a choice; export may proceed.
    Resolved,
}

/// Serializable per-group choices, bound to the filtered row set they were
/// made against. Lets a caller persist choices across process runs without
/// reopening the stale-carryover hole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionState {
    /// Hash of the filtered table's row contents and key column.
    pub signature: u64,
    /// Group key -> chosen row id.
    pub choices: BTreeMap<String, usize>,
}

/// Interactive duplicate-resolution state machine.
#[derive(Debug, Clone)]
pub struct Resolver {
    table: Table,
    key_column: usize,
    unique_rows: Vec<usize>,
    groups: Vec<DuplicateGroup>,
    choices: HashMap<String, usize>,
    signature: u64,
}

impl Resolver {
    /// Partition the filtered table's rows by key value. Groups keep
    /// first-seen order; rows with an empty key never group and are carried
    /// through as unique rows.
    pub fn detect(table: &Table, key_column: usize) -> Resolver {
        let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
        let mut key_order: Vec<String> = Vec::new();
        let mut empty_key_rows: Vec<usize> = Vec::new();

        for (row_id, row) in table.rows().iter().enumerate() {
            let key = row
                .get(key_column)
                .map(|c| c.to_display())
                .unwrap_or_default();
            if key.is_empty() {
                empty_key_rows.push(row_id);
                continue;
            }
            let members = by_key.entry(key.clone()).or_insert_with(|| {
                key_order.push(key.clone());
                Vec::new()
            });
            members.push(row_id);
        }

        let mut unique_rows = empty_key_rows;
        let mut groups = Vec::new();
        for key in key_order {
            let members = by_key.remove(&key).unwrap_or_default();
            if members.len() >= 2 {
                groups.push(DuplicateGroup { key, rows: members });
            } else {
                unique_rows.extend(members);
            }
        }
        unique_rows.sort_unstable();

        let signature = table_signature(table, key_column);

        Resolver {
            table: table.clone(),
            key_column,
            unique_rows,
            groups,
            choices: HashMap::new(),
            signature,
        }
    }

    pub fn groups(&self) -> &[DuplicateGroup] {
        &self.groups
    }

    pub fn unique_row_count(&self) -> usize {
        self.unique_rows.len()
    }

    pub fn status(&self) -> ResolutionStatus {
        if self.groups.is_empty() {
            ResolutionStatus::NoDuplicates
        } else {
            let unresolved = self.unresolved_keys().len();
            if unresolved == 0 {
                ResolutionStatus::Resolved
            } else {
                ResolutionStatus::Pending { unresolved }
            }
        }
    }

    /// Record (or overwrite) the choice for one group. Choosing again for a
    /// resolved group replaces the prior choice.
    pub fn choose(&mut self, key: &str, row_id: usize) -> Result<(), ReportError> {
        let group = self
            .groups
            .iter()
            .find(|g| g.key == key)
            .ok_or_else(|| ReportError::UnknownGroup {
                key: key.to_string(),
            })?;
        if !group.rows.contains(&row_id) {
            return Err(ReportError::InvalidChoice {
                key: key.to_string(),
                row: row_id,
            });
        }
        self.choices.insert(key.to_string(), row_id);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.groups
            .iter()
            .all(|g| self.choices.contains_key(&g.key))
    }

    /// Keys of groups that still need a choice, in group order.
    pub fn unresolved_keys(&self) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|g| !self.choices.contains_key(&g.key))
            .map(|g| g.key.as_str())
            .collect()
    }

    /// Current choice for a group, if any.
    pub fn chosen(&self, key: &str) -> Option<usize> {
        self.choices.get(key).copied()
    }

    /// The final row set: all unique rows plus the chosen row per group, in
    /// original filtered-table order. Fails until every group is resolved.
    pub fn resolved_table(&self) -> Result<Table, ReportError> {
        let unresolved = self.unresolved_keys().len();
        if unresolved > 0 {
            return Err(ReportError::IncompleteResolution { unresolved });
        }
        let mut indices = self.unique_rows.clone();
        for group in &self.groups {
            // Complete by the gate above; every key has an entry.
            if let Some(&row_id) = self.choices.get(&group.key) {
                indices.push(row_id);
            }
        }
        indices.sort_unstable();
        Ok(self.table.with_rows(&indices))
    }

    /// Short display label for one candidate row: the first three fields,
    /// plus a points-like field when the table has one past those.
    pub fn candidate_summary(&self, row_id: usize) -> String {
        let row = match self.table.rows().get(row_id) {
            Some(r) => r,
            None => return String::new(),
        };
        let mut parts: Vec<String> = row
            .iter()
            .take(3)
            .map(|c| c.to_display())
            .collect();
        let points_col = self
            .table
            .headers()
            .iter()
            .position(|h| h.to_lowercase().contains("point"));
        if let Some(col) = points_col {
            if col >= 3 {
                if let Some(cell) = row.get(col) {
                    parts.push(format!(
                        "{}: {}",
                        self.table.headers()[col],
                        cell.to_display()
                    ));
                }
            }
        }
        parts.join(" | ")
    }

    /// Snapshot the current choices for persistence.
    pub fn state(&self) -> ResolutionState {
        ResolutionState {
            signature: self.signature,
            choices: self
                .choices
                .iter()
                .map(|(k, &v)| (k.clone(), v))
                .collect(),
        }
    }

    /// Re-apply a saved state. The signature must match the filtered row set
    /// this resolver was built from; entries for unknown groups or
    /// out-of-group rows are skipped with a warning. Returns the number of
    /// choices applied.
    pub fn apply_state(&mut self, state: &ResolutionState) -> Result<usize> {
        if state.signature != self.signature {
            anyhow::bail!(
                "saved choices were made against a different filtered row set \
                 (signature mismatch); re-resolve the duplicates"
            );
        }
        let mut applied = 0usize;
        for (key, &row_id) in &state.choices {
            match self.choose(key, row_id) {
                Ok(()) => applied += 1,
                Err(e) => log::warn!("skipping saved choice for '{}': {}", key, e),
            }
        }
        Ok(applied)
    }
}

/// Hash the filtered table's row contents plus the key column index.
/// Any change to the row set produces a new signature.
fn table_signature(table: &Table, key_column: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    key_column.hash(&mut hasher);
    table.row_count().hash(&mut hasher);
    for row in table.rows() {
        for cell in row {
            cell.to_display().hash(&mut hasher);
        }
    }
    hasher.finish()
}
