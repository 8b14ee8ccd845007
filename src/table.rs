//! In-memory table model shared by every pipeline stage.
//!
//! A `Table` is a normalized header plus rectangular rows of `Cell` values.
//! Headers are unique non-empty strings by construction; the extractor feeds
//! raw (possibly empty, possibly colliding) header cells through
//! `normalize_headers` before a `Table` ever exists.

use calamine::Data;

/// A single cell value after extraction.
///
/// Spreadsheet types collapse to three cases: numbers stay numeric so
/// percentage detection and export can work on real values, everything else
/// becomes text, and blanks stay distinguishable from empty strings.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Build a cell from a calamine sheet value.
    pub fn from_sheet(value: &Data) -> Cell {
        match value {
            Data::Empty => Cell::Empty,
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Data::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(trimmed.to_string())
                }
            }
            // Date cells keep their serial value; the source format only
            // carries text and score columns.
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(e) => Cell::Text(format!("#ERROR:{:?}", e)),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Numeric view of the cell. Text that parses as a number counts, so
    /// columns typed as text in the source sheet still behave numerically.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(t) => t.trim().parse::<f64>().ok(),
            Cell::Empty => None,
        }
    }

    /// String cast used for comparisons, grouping keys, and display.
    /// Whole numbers drop the trailing `.0` so they match their text form.
    pub fn to_display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(t) => t.clone(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
        }
    }
}

/// An extracted table: unique headers plus rectangular rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Build a table, enforcing the rectangular invariant. Short rows are
    /// padded with empty cells; long rows are truncated to the header width.
    pub fn new(headers: Vec<String>, mut rows: Vec<Vec<Cell>>) -> Table {
        let width = headers.len();
        for row in &mut rows {
            row.resize(width, Cell::Empty);
        }
        Table { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Clone the header and a subset of rows (by index) into a new table.
    pub fn with_rows(&self, indices: &[usize]) -> Table {
        let rows = indices
            .iter()
            .filter_map(|&i| self.rows.get(i).cloned())
            .collect();
        Table {
            headers: self.headers.clone(),
            rows,
        }
    }
}

/// Convert a 0-based column index to a spreadsheet column letter
/// (A, B, ..., Z, AA, AB, ...).
pub fn col_letter(idx: u32) -> String {
    let mut result = String::new();
    let mut n = idx;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Normalize raw header cells into unique non-empty display names.
///
/// Empty or blank source headers become `Column_<letter>` placeholders from
/// their spreadsheet position. Any collision with an already-assigned name
/// (placeholders included) gets `_1`, `_2`, ... appended until unique.
pub fn normalize_headers(raw: &[(u32, Cell)]) -> Vec<String> {
    let mut assigned: Vec<String> = Vec::with_capacity(raw.len());
    for (source_col, cell) in raw {
        let base = match cell {
            Cell::Empty => format!("Column_{}", col_letter(*source_col)),
            other => {
                let s = other.to_display().trim().to_string();
                if s.is_empty() {
                    format!("Column_{}", col_letter(*source_col))
                } else {
                    s
                }
            }
        };

        let mut name = base.clone();
        let mut suffix = 1u32;
        while assigned.contains(&name) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        assigned.push(name);
    }
    assigned
}
