//! Styled spreadsheet export of a resolved table.
//!
//! Layout: row 0 = title band merged across the header width, row 1 =
//! header band, rows 2.. = zebra-striped data with an auto-filter on the
//! header row. Percent columns keep their stored fraction values and get a
//! `0.0%` number format.

use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, FormatAlign, Workbook};

use crate::report::{percent_columns, ReportLabels};
use crate::table::{Cell, Table};

// Band colors shared with the PDF exporter's palette.
const ACCENT: &str = "#4472C4"; // header/title band
const ZEBRA: &str = "#DCE6F1"; // light blue band
const PERCENT_FORMAT: &str = "0.0%";

const MIN_WIDTH: f64 = 8.0;
const MAX_WIDTH: f64 = 60.0;
const WIDTH_PADDING: f64 = 3.0;

/// Serialize a resolved table to xlsx bytes.
///
/// `width_overrides` pins specific columns (by position) to a fixed width;
/// every other column is auto-fit to its longest string representation.
pub fn export_xlsx(
    table: &Table,
    title: &str,
    labels: &ReportLabels,
    width_overrides: &[(usize, f64)],
) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet
        .set_name(&labels.sheet_name)
        .context("Invalid sheet name")?;

    let title_fmt = Format::new()
        .set_bold()
        .set_font_size(14)
        .set_font_color("#FFFFFF")
        .set_background_color(ACCENT)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    let header_fmt = Format::new()
        .set_bold()
        .set_font_color("#FFFFFF")
        .set_background_color(ACCENT);

    // Body format matrix: (banded?, percent?) -> Format.
    let plain = Format::new();
    let banded = Format::new().set_background_color(ZEBRA);
    let plain_pct = Format::new().set_num_format(PERCENT_FORMAT);
    let banded_pct = Format::new()
        .set_background_color(ZEBRA)
        .set_num_format(PERCENT_FORMAT);

    let width = table.width();
    let last_col = width.saturating_sub(1) as u16;
    let shown_title = if title.trim().is_empty() {
        labels.default_title.as_str()
    } else {
        title
    };

    // Title band across the full header width.
    if width > 1 {
        sheet.merge_range(0, 0, 0, last_col, shown_title, &title_fmt)?;
    } else {
        sheet.write_string_with_format(0, 0, shown_title, &title_fmt)?;
    }

    for (col, header) in table.headers().iter().enumerate() {
        sheet.write_string_with_format(1, col as u16, header, &header_fmt)?;
    }

    let percent = percent_columns(table);

    for (i, row) in table.rows().iter().enumerate() {
        let sheet_row = (i + 2) as u32;
        let band = i % 2 == 1;
        for (col, cell) in row.iter().enumerate() {
            let fmt = match (band, percent[col]) {
                (false, false) => &plain,
                (true, false) => &banded,
                (false, true) => &plain_pct,
                (true, true) => &banded_pct,
            };
            match cell {
                Cell::Number(n) => {
                    sheet.write_number_with_format(sheet_row, col as u16, *n, fmt)?;
                }
                Cell::Text(t) => {
                    sheet.write_string_with_format(sheet_row, col as u16, t, fmt)?;
                }
                Cell::Empty => {
                    sheet.write_blank(sheet_row, col as u16, fmt)?;
                }
            }
        }
    }

    // Column widths: manual overrides win, the rest auto-fit.
    for col in 0..width {
        let fixed = width_overrides
            .iter()
            .find(|(c, _)| *c == col)
            .map(|(_, w)| *w);
        let w = match fixed {
            Some(w) => w,
            None => auto_width(table, col, percent[col]),
        };
        sheet.set_column_width(col as u16, w)?;
    }

    // Auto-filter spans the header row and all data rows.
    let last_row = (table.row_count() + 1) as u32;
    sheet.autofilter(1, 0, last_row, last_col)?;

    workbook
        .save_to_buffer()
        .context("Failed to serialize workbook")
}

/// Longest string representation in the column, plus padding, clamped.
fn auto_width(table: &Table, col: usize, percent: bool) -> f64 {
    let mut longest = table.headers()[col].chars().count();
    for row in table.rows() {
        let s = crate::report::display_value(&row[col], percent);
        longest = longest.max(s.chars().count());
    }
    (longest as f64 + WIDTH_PADDING).clamp(MIN_WIDTH, MAX_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_auto_from_rs, Data, Reader};
    use std::io::Cursor;

    fn sample() -> Table {
        Table::new(
            vec!["Name".into(), "Email".into(), "Percent".into()],
            vec![
                vec![
                    Cell::Text("Anna".into()),
                    Cell::Text("a@x".into()),
                    Cell::Number(0.5),
                ],
                vec![
                    Cell::Text("Ben".into()),
                    Cell::Text("b@x".into()),
                    Cell::Number(0.8),
                ],
            ],
        )
    }

    #[test]
    fn test_export_round_trips_headers_and_values() {
        let labels = ReportLabels::default();
        let bytes = export_xlsx(&sample(), "Module 1", &labels, &[]).unwrap();

        let mut wb = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        let names = wb.sheet_names();
        assert_eq!(names[0], labels.sheet_name);
        let range = wb.worksheet_range(&names[0]).unwrap();

        // Row 0 title, row 1 headers, rows 2.. data.
        assert_eq!(
            range.get_value((0, 0)),
            Some(&Data::String("Module 1".into()))
        );
        assert_eq!(range.get_value((1, 0)), Some(&Data::String("Name".into())));
        assert_eq!(
            range.get_value((1, 2)),
            Some(&Data::String("Percent".into()))
        );
        assert_eq!(range.get_value((2, 0)), Some(&Data::String("Anna".into())));
        // Percent formatting is display-only; the stored value is unchanged.
        assert_eq!(range.get_value((2, 2)), Some(&Data::Float(0.5)));
        assert_eq!(range.get_value((3, 2)), Some(&Data::Float(0.8)));
    }

    #[test]
    fn test_export_single_column_table() {
        // merge_range needs two cells; a one-column table must still export.
        let table = Table::new(
            vec!["Email".into()],
            vec![vec![Cell::Text("a@x".into())]],
        );
        let bytes = export_xlsx(&table, "T", &ReportLabels::default(), &[]).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn test_export_blank_title_uses_default() {
        let labels = ReportLabels::default();
        let bytes = export_xlsx(&sample(), "  ", &labels, &[]).unwrap();
        let mut wb = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        let names = wb.sheet_names();
        let range = wb.worksheet_range(&names[0]).unwrap();
        assert_eq!(
            range.get_value((0, 0)),
            Some(&Data::String(labels.default_title.clone()))
        );
    }
}
