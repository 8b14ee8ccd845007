//! Role-based column lookup and the category filter.
//!
//! Columns are found once, by role, after extraction: the "category" column
//! drives filtering and the "key" column drives duplicate detection. Lookup
//! is a case-insensitive substring match of a configured keyword against the
//! normalized header names. A missing role disables the dependent feature;
//! it is never fatal to the session.

use crate::error::ReportError;
use crate::table::Table;

/// Keywords used to locate the two role columns.
#[derive(Debug, Clone)]
pub struct ColumnRoles {
    pub category_keyword: String,
    pub key_keyword: String,
}

impl Default for ColumnRoles {
    fn default() -> Self {
        ColumnRoles {
            category_keyword: "assignment".to_string(),
            key_keyword: "email".to_string(),
        }
    }
}

/// Column indices resolved from role keywords, validated once per table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolvedRoles {
    pub category: Option<usize>,
    pub key: Option<usize>,
}

impl ColumnRoles {
    /// Resolve both roles against a table's headers. Absent roles resolve to
    /// `None`; the typed errors surface through the accessors below.
    pub fn resolve(&self, table: &Table) -> ResolvedRoles {
        let resolved = ResolvedRoles {
            category: find_column(table, &self.category_keyword),
            key: find_column(table, &self.key_keyword),
        };
        if resolved.category.is_none() {
            log::warn!(
                "no header matches '{}': category filtering disabled",
                self.category_keyword
            );
        }
        if resolved.key.is_none() {
            log::warn!(
                "no header matches '{}': duplicate resolution and export disabled",
                self.key_keyword
            );
        }
        resolved
    }
}

impl ResolvedRoles {
    pub fn category_column(&self, roles: &ColumnRoles) -> Result<usize, ReportError> {
        self.category.ok_or_else(|| ReportError::ColumnNotFound {
            role: "category",
            keyword: roles.category_keyword.clone(),
        })
    }

    pub fn key_column(&self, roles: &ColumnRoles) -> Result<usize, ReportError> {
        self.key.ok_or_else(|| ReportError::ColumnNotFound {
            role: "key",
            keyword: roles.key_keyword.clone(),
        })
    }
}

/// Find the first header containing `keyword`, case-insensitively.
pub fn find_column(table: &Table, keyword: &str) -> Option<usize> {
    let needle = keyword.to_lowercase();
    table
        .headers()
        .iter()
        .position(|h| h.to_lowercase().contains(&needle))
}

/// Sorted distinct non-empty values of one column, string-cast.
pub fn distinct_values(table: &Table, column: usize) -> Result<Vec<String>, ReportError> {
    let mut values: Vec<String> = table
        .rows()
        .iter()
        .filter_map(|row| row.get(column))
        .map(|cell| cell.to_display())
        .filter(|s| !s.is_empty())
        .collect();
    values.sort();
    values.dedup();

    if values.is_empty() {
        return Err(ReportError::EmptyOptionSet {
            column: table
                .headers()
                .get(column)
                .cloned()
                .unwrap_or_default(),
        });
    }
    Ok(values)
}

/// Keep rows whose string-cast value in `column` is one of `chosen`.
///
/// An empty `chosen` slice means "no filter" and returns the table as-is;
/// values are always compared as strings so mixed-typed columns match their
/// text form consistently.
pub fn apply_filter(table: &Table, column: usize, chosen: &[String]) -> Table {
    if chosen.is_empty() {
        return table.clone();
    }
    let indices: Vec<usize> = table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            row.get(column)
                .map(|cell| chosen.contains(&cell.to_display()))
                .unwrap_or(false)
        })
        .map(|(i, _)| i)
        .collect();
    table.with_rows(&indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn sample() -> Table {
        Table::new(
            vec!["Name".into(), "Assignment".into(), "Points".into()],
            vec![
                vec![
                    Cell::Text("A".into()),
                    Cell::Text("M1".into()),
                    Cell::Number(1.0),
                ],
                vec![
                    Cell::Text("B".into()),
                    Cell::Text("M2".into()),
                    Cell::Number(2.0),
                ],
                vec![Cell::Text("C".into()), Cell::Empty, Cell::Number(3.0)],
                vec![
                    Cell::Text("D".into()),
                    Cell::Text("M1".into()),
                    Cell::Number(4.0),
                ],
                vec![
                    Cell::Text("E".into()),
                    Cell::Number(3.0),
                    Cell::Number(5.0),
                ],
            ],
        )
    }

    #[test]
    fn test_find_column_fuzzy() {
        let t = sample();
        assert_eq!(find_column(&t, "ASSIGN"), Some(1));
        assert_eq!(find_column(&t, "point"), Some(2));
        assert_eq!(find_column(&t, "email"), None);
    }

    #[test]
    fn test_roles_resolution() {
        let t = sample();
        let roles = ColumnRoles::default();
        let resolved = roles.resolve(&t);
        assert_eq!(resolved.category, Some(1));
        assert!(resolved.key.is_none());
        assert!(matches!(
            resolved.key_column(&roles),
            Err(ReportError::ColumnNotFound { role: "key", .. })
        ));
    }

    #[test]
    fn test_distinct_values_sorted_no_empties() {
        let t = sample();
        // Numeric 3.0 casts to "3"; the empty cell is excluded.
        assert_eq!(distinct_values(&t, 1).unwrap(), vec!["3", "M1", "M2"]);
    }

    #[test]
    fn test_distinct_values_empty_option_set() {
        let t = Table::new(
            vec!["Assignment".into()],
            vec![vec![Cell::Empty], vec![Cell::Text("".into())]],
        );
        assert!(matches!(
            distinct_values(&t, 0),
            Err(ReportError::EmptyOptionSet { .. })
        ));
    }

    #[test]
    fn test_apply_filter_identity_on_empty_selection() {
        let t = sample();
        let filtered = apply_filter(&t, 1, &[]);
        assert_eq!(filtered, t);
    }

    #[test]
    fn test_apply_filter_soundness() {
        let t = sample();
        let chosen = vec!["M1".to_string()];
        let filtered = apply_filter(&t, 1, &chosen);
        assert_eq!(filtered.row_count(), 2);
        for row in filtered.rows() {
            assert!(chosen.contains(&row[1].to_display()));
        }
        // No omissions: every matching source row survives.
        let expected = t
            .rows()
            .iter()
            .filter(|r| chosen.contains(&r[1].to_display()))
            .count();
        assert_eq!(filtered.row_count(), expected);
    }

    #[test]
    fn test_apply_filter_matches_numeric_as_string() {
        let t = sample();
        let filtered = apply_filter(&t, 1, &["3".to_string()]);
        assert_eq!(filtered.row_count(), 1);
        assert_eq!(filtered.rows()[0][0].to_display(), "E");
    }
}
