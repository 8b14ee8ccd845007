//! Column extraction from the source spreadsheet.
//!
//! Reads a fixed, configured subset of columns from the first worksheet:
//! a title cell, a header row (normalized and deduplicated), and every data
//! row from the configured start row to the last populated sheet row.

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader};
use std::io::Cursor;
use std::path::Path;

use crate::table::{normalize_headers, Cell, Table};

/// Fixed sheet geometry and the configured source columns.
///
/// The input format is positional: the title sits at `(title_row,
/// source_columns[0])`, headers one row below the title, data two rows below.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Row holding the report title (0-based).
    pub title_row: u32,
    /// Row holding the column headers.
    pub header_row: u32,
    /// First data row.
    pub data_start_row: u32,
    /// Spreadsheet column indices to extract, in output order (0-based).
    pub source_columns: Vec<u32>,
    /// Optional substring pre-filter applied to each data row.
    pub row_filter: Option<RowFilter>,
}

/// Keep only rows whose cell in one extracted column contains a keyword,
/// case-insensitively. Dropped rows are counted, not reported as errors.
#[derive(Debug, Clone)]
pub struct RowFilter {
    /// Index into `source_columns` (not a sheet column index).
    pub column: usize,
    pub keyword: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        ExtractConfig {
            title_row: 0,
            header_row: 1,
            data_start_row: 2,
            source_columns: (0..6).collect(),
            row_filter: None,
        }
    }
}

/// Counters describing one extraction pass. Diagnostics only; they never
/// gate downstream behavior.
#[derive(Debug, Clone, Default)]
pub struct ExtractDiagnostics {
    /// Data rows scanned between the start row and the last populated row.
    pub rows_scanned: usize,
    /// Rows that passed the optional pre-filter (equals `rows_scanned` when
    /// no filter is configured).
    pub rows_matched: usize,
}

/// Result of a successful extraction.
#[derive(Debug, Clone)]
pub struct Extracted {
    /// Title cell value, passed through unmodified.
    pub title: String,
    pub table: Table,
    pub diagnostics: ExtractDiagnostics,
}

/// Extract the configured columns from an already-loaded sheet range.
pub fn extract_table(range: &Range<Data>, config: &ExtractConfig) -> Result<Extracted> {
    if config.source_columns.is_empty() {
        anyhow::bail!("no source columns configured");
    }
    if let Some(filter) = &config.row_filter {
        if filter.column >= config.source_columns.len() {
            anyhow::bail!(
                "row filter column {} is out of range for {} configured columns",
                filter.column,
                config.source_columns.len()
            );
        }
    }

    let cell_at = |row: u32, col: u32| -> Cell {
        range
            .get_value((row, col))
            .map(Cell::from_sheet)
            .unwrap_or(Cell::Empty)
    };

    let title = cell_at(config.title_row, config.source_columns[0]).to_display();

    let raw_headers: Vec<(u32, Cell)> = config
        .source_columns
        .iter()
        .map(|&col| (col, cell_at(config.header_row, col)))
        .collect();
    let headers = normalize_headers(&raw_headers);

    let last_row = range.end().map(|(r, _)| r).unwrap_or(0);

    let mut diagnostics = ExtractDiagnostics::default();
    let mut rows: Vec<Vec<Cell>> = Vec::new();

    for sheet_row in config.data_start_row..=last_row {
        let row: Vec<Cell> = config
            .source_columns
            .iter()
            .map(|&col| cell_at(sheet_row, col))
            .collect();

        // The sheet range can extend past the extracted columns; rows that
        // are blank across every configured column carry no data.
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        diagnostics.rows_scanned += 1;

        if let Some(filter) = &config.row_filter {
            let value = row[filter.column].to_display().to_lowercase();
            if !value.contains(&filter.keyword.to_lowercase()) {
                continue;
            }
        }
        diagnostics.rows_matched += 1;
        rows.push(row);
    }

    if config.row_filter.is_some() {
        log::info!(
            "pre-filter kept {} of {} data rows",
            diagnostics.rows_matched,
            diagnostics.rows_scanned
        );
    }

    Ok(Extracted {
        title,
        table: Table::new(headers, rows),
        diagnostics,
    })
}

/// Open a workbook file and extract from its first sheet.
pub fn extract_from_path(path: &Path, config: &ExtractConfig) -> Result<Extracted> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open spreadsheet: {}", path.display()))?;
    let sheet = first_sheet_name(&workbook.sheet_names())?;
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("Failed to read sheet '{}'", sheet))?;
    extract_table(&range, config)
}

/// Extract from in-memory workbook bytes (e.g. an uploaded file).
pub fn extract_from_bytes(bytes: &[u8], config: &ExtractConfig) -> Result<Extracted> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .context("Failed to open spreadsheet from bytes")?;
    let sheet = first_sheet_name(&workbook.sheet_names())?;
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("Failed to read sheet '{}'", sheet))?;
    extract_table(&range, config)
}

fn first_sheet_name(names: &[String]) -> Result<String> {
    names
        .first()
        .cloned()
        .context("Workbook contains no sheets")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(cells: &[(u32, u32, Data)]) -> Range<Data> {
        let mut max = (0u32, 0u32);
        for (r, c, _) in cells {
            max.0 = max.0.max(*r);
            max.1 = max.1.max(*c);
        }
        let mut range = Range::new((0, 0), max);
        for (r, c, v) in cells {
            range.set_value((*r, *c), v.clone());
        }
        range
    }

    fn text(s: &str) -> Data {
        Data::String(s.to_string())
    }

    #[test]
    fn test_extract_basic_layout() {
        let range = sheet(&[
            (0, 0, text("Module 1 Results")),
            (1, 0, text("Name")),
            (1, 1, text("Email")),
            (2, 0, text("Anna")),
            (2, 1, text("a@x")),
            (3, 0, text("Ben")),
            (3, 1, text("b@x")),
        ]);
        let config = ExtractConfig {
            source_columns: vec![0, 1],
            ..Default::default()
        };
        let extracted = extract_table(&range, &config).unwrap();
        assert_eq!(extracted.title, "Module 1 Results");
        assert_eq!(extracted.table.headers(), &["Name", "Email"]);
        assert_eq!(extracted.table.row_count(), 2);
        assert_eq!(extracted.diagnostics.rows_scanned, 2);
        assert_eq!(extracted.diagnostics.rows_matched, 2);
    }

    #[test]
    fn test_extract_skips_blank_rows_and_placeholder_headers() {
        let range = sheet(&[
            (0, 1, text("Title")),
            (2, 1, text("x")),
            (4, 1, text("y")),
            (4, 3, Data::Float(2.0)),
        ]);
        // Header row 1 is entirely blank: both columns become placeholders.
        let config = ExtractConfig {
            source_columns: vec![1, 3],
            ..Default::default()
        };
        let extracted = extract_table(&range, &config).unwrap();
        assert_eq!(extracted.table.headers(), &["Column_B", "Column_D"]);
        // Row 3 is blank across both configured columns and is dropped.
        assert_eq!(extracted.table.row_count(), 2);
    }

    #[test]
    fn test_extract_row_filter_counts() {
        let range = sheet(&[
            (1, 0, text("Assignment")),
            (2, 0, text("Module 1 Homework")),
            (3, 0, text("Quiz 2")),
            (4, 0, text("module 3")),
        ]);
        let config = ExtractConfig {
            source_columns: vec![0],
            row_filter: Some(RowFilter {
                column: 0,
                keyword: "MODULE".to_string(),
            }),
            ..Default::default()
        };
        let extracted = extract_table(&range, &config).unwrap();
        assert_eq!(extracted.diagnostics.rows_scanned, 3);
        assert_eq!(extracted.diagnostics.rows_matched, 2);
        assert_eq!(extracted.table.row_count(), 2);
    }

    #[test]
    fn test_extract_rejects_bad_filter_column() {
        let range = sheet(&[(0, 0, text("t"))]);
        let config = ExtractConfig {
            source_columns: vec![0],
            row_filter: Some(RowFilter {
                column: 3,
                keyword: "x".to_string(),
            }),
            ..Default::default()
        };
        assert!(extract_table(&range, &config).is_err());
    }
}
