//! Paginated PDF table reports, portrait and landscape.
//!
//! One renderer parameterized by orientation: the two variants differ only
//! in page size and width-allocation constants. The table is drawn from
//! lopdf content streams using the core Helvetica faces; a system TrueType
//! face supplies advance metrics for wrapping, centering, and truncation.
//! If no system font can be loaded the whole export fails with a
//! diagnostic rather than producing a garbled layout.

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use anyhow::{Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

use crate::report::{display_value, percent_columns, ReportLabels};
use crate::table::Table;

/// Page orientation; both use A4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

const A4_SHORT: f32 = 595.28;
const A4_LONG: f32 = 841.89;

impl Orientation {
    pub fn page_size(self) -> (f32, f32) {
        match self {
            Orientation::Portrait => (A4_SHORT, A4_LONG),
            Orientation::Landscape => (A4_LONG, A4_SHORT),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }
}

/// Width-allocation and typography constants, tuned per orientation.
#[derive(Debug, Clone)]
pub struct PdfLayout {
    pub margin: f32,
    /// Fixed width of the first column (long names, left/top aligned).
    pub first_col_width: f32,
    /// Fixed width of long-content columns (assignment/email-like).
    pub long_col_width: f32,
    /// Fixed width of short numeric columns (points/percent/max).
    pub numeric_col_width: f32,
    /// Minimum width each remaining column must receive.
    pub min_flex_width: f32,
    /// Cells longer than this many characters wrap into flowed lines.
    pub wrap_threshold: usize,
    pub title_size: f32,
    pub header_size: f32,
    pub body_size: f32,
    pub footer_size: f32,
    pub long_keywords: Vec<String>,
    pub numeric_keywords: Vec<String>,
}

impl PdfLayout {
    pub fn for_orientation(orientation: Orientation) -> PdfLayout {
        let base = PdfLayout {
            margin: 36.0,
            first_col_width: 110.0,
            long_col_width: 130.0,
            numeric_col_width: 46.0,
            min_flex_width: 28.0,
            wrap_threshold: 40,
            title_size: 14.0,
            header_size: 9.0,
            body_size: 8.5,
            footer_size: 8.0,
            long_keywords: vec!["assignment".to_string(), "email".to_string()],
            numeric_keywords: vec![
                "point".to_string(),
                "percent".to_string(),
                "max".to_string(),
            ],
        };
        match orientation {
            Orientation::Portrait => base,
            Orientation::Landscape => PdfLayout {
                first_col_width: 150.0,
                long_col_width: 180.0,
                numeric_col_width: 55.0,
                ..base
            },
        }
    }

    pub fn usable_width(&self, orientation: Orientation) -> f32 {
        orientation.page_size().0 - 2.0 * self.margin
    }
}

/// How a column is sized and aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnClass {
    /// First column: wide, left-aligned, top-aligned, wraps.
    First,
    /// Long free-text columns: wide, left/top, wraps.
    LongContent,
    /// Short numeric columns: narrow fixed width, centered.
    ShortNumeric,
    /// Everything else: splits the leftover width evenly, centered.
    Flex,
}

impl ColumnClass {
    fn wraps(self) -> bool {
        matches!(self, ColumnClass::First | ColumnClass::LongContent)
    }

    fn centered(self) -> bool {
        matches!(self, ColumnClass::ShortNumeric | ColumnClass::Flex)
    }
}

/// Classify each header by the layout's keyword lists. The first column is
/// always `First` regardless of its header.
pub fn classify_columns(headers: &[String], layout: &PdfLayout) -> Vec<ColumnClass> {
    headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            if i == 0 {
                return ColumnClass::First;
            }
            let lower = header.to_lowercase();
            if layout.long_keywords.iter().any(|k| lower.contains(k)) {
                ColumnClass::LongContent
            } else if layout.numeric_keywords.iter().any(|k| lower.contains(k)) {
                ColumnClass::ShortNumeric
            } else {
                ColumnClass::Flex
            }
        })
        .collect()
}

/// Allocate column widths so that their sum equals the usable page width.
///
/// Classified columns take their fixed constants and the flex class absorbs
/// the leftover evenly. With no flex columns the fixed widths are scaled to
/// fill the page; if the fixed widths leave too little room for the flex
/// columns the allocation fails rather than going negative.
pub fn allocate_widths(
    classes: &[ColumnClass],
    layout: &PdfLayout,
    usable: f32,
) -> Result<Vec<f32>> {
    let mut widths: Vec<f32> = classes
        .iter()
        .map(|class| match class {
            ColumnClass::First => layout.first_col_width,
            ColumnClass::LongContent => layout.long_col_width,
            ColumnClass::ShortNumeric => layout.numeric_col_width,
            ColumnClass::Flex => 0.0,
        })
        .collect();

    let fixed_total: f32 = widths.iter().sum();
    let flex_count = classes
        .iter()
        .filter(|c| matches!(c, ColumnClass::Flex))
        .count();

    if flex_count > 0 {
        let leftover = usable - fixed_total;
        let needed = layout.min_flex_width * flex_count as f32;
        if leftover < needed {
            anyhow::bail!(
                "fixed column widths ({:.0}pt) leave {:.0}pt for {} remaining column(s); \
                 at least {:.0}pt required",
                fixed_total,
                leftover,
                flex_count,
                needed
            );
        }
        let each = leftover / flex_count as f32;
        for (w, class) in widths.iter_mut().zip(classes) {
            if matches!(class, ColumnClass::Flex) {
                *w = each;
            }
        }
    } else {
        if fixed_total <= 0.0 {
            anyhow::bail!("no columns to lay out");
        }
        let scale = usable / fixed_total;
        for w in &mut widths {
            *w *= scale;
        }
    }

    Ok(widths)
}

/// Load a system sans-serif face for text metrics, trying common paths.
pub fn load_report_font() -> Result<FontVec> {
    let candidates = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/System/Library/Fonts/Helvetica.ttc",
        "/Library/Fonts/Arial.ttf",
    ];
    for path in &candidates {
        if let Ok(data) = std::fs::read(path) {
            if let Ok(font) = FontVec::try_from_vec_and_index(data.clone(), 0) {
                log::debug!("loaded report font: {}", path);
                return Ok(font);
            }
            if let Ok(font) = FontVec::try_from_vec(data) {
                log::debug!("loaded report font: {}", path);
                return Ok(font);
            }
        }
    }
    anyhow::bail!("No usable system font found. Tried: {}", candidates.join(", "))
}

/// Measure the advance width of a string at a given size.
fn measure_text(font: &FontVec, text: &str, size: f32) -> f32 {
    let scaled = font.as_scaled(PxScale::from(size));
    text.chars()
        .map(|ch| scaled.h_advance(scaled.glyph_id(ch)))
        .sum()
}

/// Greedy word wrap to a pixel budget. Words longer than a full line are
/// hard-broken by characters so a single token can never overflow a cell.
fn wrap_text(font: &FontVec, text: &str, size: f32, max_width: f32) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    let push_word = |lines: &mut Vec<String>, current: &mut String, word: &str| {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if measure_text(font, &candidate, size) <= max_width {
            *current = candidate;
            return;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(current));
        }
        if measure_text(font, word, size) <= max_width {
            *current = word.to_string();
            return;
        }
        // Hard-break an oversized word.
        let mut piece = String::new();
        for ch in word.chars() {
            piece.push(ch);
            if measure_text(font, &piece, size) > max_width && piece.chars().count() > 1 {
                piece.pop();
                lines.push(piece.clone());
                piece.clear();
                piece.push(ch);
            }
        }
        *current = piece;
    };

    for word in text.split_whitespace() {
        push_word(&mut lines, &mut current, word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Shorten a single-line cell with an ellipsis when it exceeds its width.
fn truncate_to_width(font: &FontVec, text: &str, size: f32, max_width: f32) -> String {
    if measure_text(font, text, size) <= max_width {
        return text.to_string();
    }
    let ellipsis = '\u{2026}';
    let mut out = String::new();
    for ch in text.chars() {
        let mut candidate = out.clone();
        candidate.push(ch);
        candidate.push(ellipsis);
        if measure_text(font, &candidate, size) > max_width {
            break;
        }
        out.push(ch);
    }
    out.push(ellipsis);
    out
}

/// Encode text for the core fonts' WinAnsi encoding. Characters outside
/// Latin-1 (plus a few common punctuation marks) degrade to '?'.
fn encode_winansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\u{2026}' => 0x85, // ellipsis
            '\u{2022}' => 0x95, // bullet
            '\u{2013}' => 0x96, // en dash
            '\u{2014}' => 0x97, // em dash
            c if (c as u32) < 0x100 => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

// Palette shared with the xlsx exporter.
const ACCENT: (f32, f32, f32) = (0.267, 0.447, 0.769); // #4472C4
const ZEBRA: (f32, f32, f32) = (0.863, 0.902, 0.945); // #DCE6F1
const GRID: (f32, f32, f32) = (0.65, 0.65, 0.65);
const MUTED: (f32, f32, f32) = (0.45, 0.45, 0.45);
const WHITE: (f32, f32, f32) = (1.0, 1.0, 1.0);
const BLACK: (f32, f32, f32) = (0.1, 0.1, 0.1);

const CELL_PAD_X: f32 = 4.0;
const CELL_PAD_Y: f32 = 3.0;
const LINE_SPACING: f32 = 1.25;
const FOOTER_RESERVE: f32 = 22.0;

/// Content-stream builder for one page.
struct PageOps {
    ops: Vec<Operation>,
}

impl PageOps {
    fn new() -> PageOps {
        PageOps { ops: Vec::new() }
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: (f32, f32, f32)) {
        self.ops.push(Operation::new(
            "rg",
            vec![color.0.into(), color.1.into(), color.2.into()],
        ));
        self.ops.push(Operation::new(
            "re",
            vec![x.into(), y.into(), w.into(), h.into()],
        ));
        self.ops.push(Operation::new("f", vec![]));
    }

    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.ops.push(Operation::new(
            "RG",
            vec![GRID.0.into(), GRID.1.into(), GRID.2.into()],
        ));
        self.ops.push(Operation::new("w", vec![0.5f32.into()]));
        self.ops.push(Operation::new(
            "re",
            vec![x.into(), y.into(), w.into(), h.into()],
        ));
        self.ops.push(Operation::new("S", vec![]));
    }

    fn text(
        &mut self,
        font: &str,
        size: f32,
        color: (f32, f32, f32),
        x: f32,
        baseline: f32,
        content: &str,
    ) {
        self.ops.push(Operation::new("BT", vec![]));
        self.ops
            .push(Operation::new("Tf", vec![font.into(), size.into()]));
        self.ops.push(Operation::new(
            "rg",
            vec![color.0.into(), color.1.into(), color.2.into()],
        ));
        self.ops
            .push(Operation::new("Td", vec![x.into(), baseline.into()]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(
                encode_winansi(content),
                StringFormat::Literal,
            )],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }
}

/// One laid-out body row: per-column lines plus the computed row height.
struct LaidRow {
    cells: Vec<Vec<String>>,
    height: f32,
    zebra: bool,
}

/// Serialize a resolved table into a paginated PDF report.
pub fn export_pdf(
    table: &Table,
    title: &str,
    orientation: Orientation,
    labels: &ReportLabels,
) -> Result<Vec<u8>> {
    let layout = PdfLayout::for_orientation(orientation);
    export_pdf_with_layout(table, title, orientation, &layout, labels)
}

pub fn export_pdf_with_layout(
    table: &Table,
    title: &str,
    orientation: Orientation,
    layout: &PdfLayout,
    labels: &ReportLabels,
) -> Result<Vec<u8>> {
    let font = load_report_font().context("PDF export requires a system font")?;

    let (page_w, page_h) = orientation.page_size();
    let usable = layout.usable_width(orientation);
    let classes = classify_columns(table.headers(), layout);
    let widths = allocate_widths(&classes, layout, usable)
        .context("column width allocation failed")?;

    let percent = percent_columns(table);
    let body_line = layout.body_size * LINE_SPACING;
    let header_height = layout.header_size * LINE_SPACING + 2.0 * CELL_PAD_Y;

    // Lay out every row up front: wrapped lines + row heights.
    let mut laid: Vec<LaidRow> = Vec::with_capacity(table.row_count());
    for (i, row) in table.rows().iter().enumerate() {
        let mut cells: Vec<Vec<String>> = Vec::with_capacity(row.len());
        let mut max_lines = 1usize;
        for (col, cell) in row.iter().enumerate() {
            let text = display_value(cell, percent[col]);
            let inner = widths[col] - 2.0 * CELL_PAD_X;
            let lines = if classes[col].wraps() && text.chars().count() > layout.wrap_threshold {
                wrap_text(&font, &text, layout.body_size, inner)
            } else {
                vec![truncate_to_width(&font, &text, layout.body_size, inner)]
            };
            max_lines = max_lines.max(lines.len());
            cells.push(lines);
        }
        laid.push(LaidRow {
            cells,
            height: max_lines as f32 * body_line + 2.0 * CELL_PAD_Y,
            zebra: i % 2 == 1,
        });
    }

    let shown_title = if title.trim().is_empty() {
        labels.default_title.as_str()
    } else {
        title
    };
    // Overlong titles clip at the margins like any other cell.
    let shown_title = truncate_to_width(&font, shown_title, layout.title_size, usable);
    let footer = labels.footer_text(table.row_count());

    // Split rows into pages. The first page additionally holds the title.
    let title_block = layout.title_size * 2.0;
    let bottom_limit = layout.margin + FOOTER_RESERVE;
    let mut pages: Vec<Vec<usize>> = Vec::new();
    {
        let mut current: Vec<usize> = Vec::new();
        let mut y = page_h - layout.margin - title_block - header_height;
        for (idx, row) in laid.iter().enumerate() {
            if y - row.height < bottom_limit && !current.is_empty() {
                pages.push(std::mem::take(&mut current));
                y = page_h - layout.margin - header_height;
            }
            current.push(idx);
            y -= row.height;
        }
        pages.push(current);
    }

    // ── Assemble the document ──
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let x0 = layout.margin;
    let mut page_ids: Vec<lopdf::ObjectId> = Vec::new();

    for (page_idx, row_indices) in pages.iter().enumerate() {
        let mut ops = PageOps::new();
        let mut y_top = page_h - layout.margin;

        if page_idx == 0 {
            let tw = measure_text(&font, &shown_title, layout.title_size);
            let tx = x0 + (usable - tw).max(0.0) / 2.0;
            ops.text(
                "F2",
                layout.title_size,
                ACCENT,
                tx,
                y_top - layout.title_size,
                &shown_title,
            );
            y_top -= title_block;
        }

        // Header band, repeated on every page.
        ops.fill_rect(x0, y_top - header_height, usable, header_height, ACCENT);
        let mut x = x0;
        for (col, header) in table.headers().iter().enumerate() {
            let inner = widths[col] - 2.0 * CELL_PAD_X;
            let text = truncate_to_width(&font, header, layout.header_size, inner);
            let tx = if classes[col].centered() {
                let tw = measure_text(&font, &text, layout.header_size);
                x + (widths[col] - tw).max(0.0) / 2.0
            } else {
                x + CELL_PAD_X
            };
            ops.text(
                "F2",
                layout.header_size,
                WHITE,
                tx,
                y_top - CELL_PAD_Y - layout.header_size,
                &text,
            );
            ops.stroke_rect(x, y_top - header_height, widths[col], header_height);
            x += widths[col];
        }
        y_top -= header_height;

        // Body rows.
        for &row_idx in row_indices {
            let row = &laid[row_idx];
            let row_bottom = y_top - row.height;
            if row.zebra {
                ops.fill_rect(x0, row_bottom, usable, row.height, ZEBRA);
            }
            let mut x = x0;
            for (col, lines) in row.cells.iter().enumerate() {
                let wrapped = lines.len() > 1;
                // Wrapped cells are top-aligned; single-line cells center
                // vertically within the row.
                let first_baseline = if wrapped {
                    y_top - CELL_PAD_Y - layout.body_size
                } else {
                    y_top - (row.height - layout.body_size) / 2.0 - layout.body_size * 0.85
                };
                for (line_idx, line) in lines.iter().enumerate() {
                    if line.is_empty() {
                        continue;
                    }
                    let tx = if classes[col].centered() {
                        let tw = measure_text(&font, line, layout.body_size);
                        x + (widths[col] - tw).max(0.0) / 2.0
                    } else {
                        x + CELL_PAD_X
                    };
                    ops.text(
                        "F1",
                        layout.body_size,
                        BLACK,
                        tx,
                        first_baseline - line_idx as f32 * body_line,
                        line,
                    );
                }
                ops.stroke_rect(x, row_bottom, widths[col], row.height);
                x += widths[col];
            }
            y_top = row_bottom;
        }

        // Footer: row count + generation timestamp, centered, muted.
        let fw = measure_text(&font, &footer, layout.footer_size);
        let fx = x0 + (usable - fw).max(0.0) / 2.0;
        ops.text("F1", layout.footer_size, MUTED, fx, layout.margin * 0.5, &footer);

        let content = Content { operations: ops.ops };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().context("Failed to encode page content")?,
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();
    let count = page_ids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                page_w.into(),
                page_h.into(),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).context("Failed to write PDF")?;
    Ok(buffer)
}
