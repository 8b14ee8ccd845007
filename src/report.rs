//! Shared exporter plumbing: percent-column detection, display formatting,
//! report labels, and output filename derivation.

use lazy_static::lazy_static;
use regex::Regex;

use crate::table::{Cell, Table};

/// User-visible strings and filename knobs. Label text is configuration,
/// not logic; a caller can localize all of it here.
#[derive(Debug, Clone)]
pub struct ReportLabels {
    /// Worksheet name for the spreadsheet export.
    pub sheet_name: String,
    /// Fallback report title when the source title cell is blank.
    pub default_title: String,
    /// Filename token used when no category filter is selected.
    pub unfiltered_token: String,
    /// The first selected category value is cut at this marker before it
    /// becomes a filename token.
    pub token_marker: Option<String>,
    /// Footer template; `{}` is replaced with the row count.
    pub footer_rows: String,
}

impl Default for ReportLabels {
    fn default() -> Self {
        ReportLabels {
            sheet_name: "Filtered Results".to_string(),
            default_title: "Assignment Results".to_string(),
            unfiltered_token: "unfiltered".to_string(),
            token_marker: Some(" - ".to_string()),
            footer_rows: "{} rows".to_string(),
        }
    }
}

impl ReportLabels {
    /// Footer line: row count plus generation timestamp.
    pub fn footer_text(&self, row_count: usize) -> String {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
        format!(
            "{} \u{2022} {}",
            self.footer_rows.replace("{}", &row_count.to_string()),
            now
        )
    }
}

/// Mark which columns render as fraction percentages.
///
/// A column qualifies iff it has at least one non-empty value and every
/// non-empty value is numeric within [0, 1]. A single out-of-range or
/// non-numeric value disqualifies the whole column.
pub fn percent_columns(table: &Table) -> Vec<bool> {
    (0..table.width())
        .map(|col| {
            let mut seen = false;
            for row in table.rows() {
                let cell = &row[col];
                if cell.is_empty() {
                    continue;
                }
                match cell.as_number() {
                    Some(n) if (0.0..=1.0).contains(&n) => seen = true,
                    _ => return false,
                }
            }
            seen
        })
        .collect()
}

/// Stringify one cell for a rendered report. Percent columns format the
/// underlying fraction as a one-decimal percentage ("0.5" -> "50.0%").
pub fn display_value(cell: &Cell, percent: bool) -> String {
    if percent {
        if let Some(n) = cell.as_number() {
            return format!("{:.1}%", n * 100.0);
        }
    }
    cell.to_display()
}

lazy_static! {
    static ref TOKEN_SANITIZER: Regex = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();
}

const STEM_MAX: usize = 32;
const TOKEN_MAX: usize = 24;

/// Derive the shared output basename: truncated input stem plus a token
/// from the first selected category value (cut at the configured marker),
/// or the unfiltered token when no filter is active.
pub fn output_basename(input_stem: &str, selection: &[String], labels: &ReportLabels) -> String {
    let stem = sanitize_component(input_stem, STEM_MAX);
    let token = match selection.first() {
        Some(value) => {
            let cut = match &labels.token_marker {
                Some(marker) => value.split(marker.as_str()).next().unwrap_or(value),
                None => value.as_str(),
            };
            sanitize_component(cut, TOKEN_MAX)
        }
        None => sanitize_component(&labels.unfiltered_token, TOKEN_MAX),
    };
    if token.is_empty() {
        stem
    } else {
        format!("{}_{}", stem, token)
    }
}

/// The three artifact filenames derived from one basename.
pub fn artifact_filenames(basename: &str) -> (String, String, String) {
    (
        format!("{}.xlsx", basename),
        format!("{}_portrait.pdf", basename),
        format!("{}_landscape.pdf", basename),
    )
}

fn sanitize_component(raw: &str, max_len: usize) -> String {
    let cleaned = TOKEN_SANITIZER
        .replace_all(raw.trim(), "_")
        .trim_matches('_')
        .to_string();
    let mut out = String::new();
    for ch in cleaned.chars() {
        if out.len() + ch.len_utf8() > max_len {
            break;
        }
        out.push(ch);
    }
    out.trim_matches('_').to_string()
}
