//! End-to-end test of the report pipeline against an in-memory workbook.
//!
//! Builds a real xlsx fixture with rust_xlsxwriter, runs it through the
//! session (extract, filter, duplicate resolution), writes the artifacts to
//! a temp directory, and reads the spreadsheet artifact back with calamine
//! to confirm the resolved data survived the round trip.
//!
//! The test exercises the main pipeline library module, ensuring that the
//! same code paths are tested as would be used in production.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use gradebook_toolkit::pdf_report::load_report_font;
use gradebook_toolkit::pipeline::{ExportOptions, Session, SessionConfig};
use gradebook_toolkit::resolve::ResolutionStatus;
use rust_xlsxwriter::Workbook;
use std::io::Cursor;

/// Reference dataset: three assignment rows where two share an email,
/// plus one survey row used to test category filtering.
const HEADERS: [&str; 6] = ["Name", "Assignments", "Email", "Points", "MaxPoints", "Percent"];
const ROWS: [(&str, &str, &str, f64, f64, f64); 4] = [
    ("A", "Module 1 - Homework", "a@x", 0.5, 1.0, 0.5),
    ("B", "Module 1 - Homework", "b@x", 0.8, 1.0, 0.8),
    ("A", "Module 1 - Homework", "a@x", 0.9, 1.0, 0.9),
    ("C", "Survey", "c@x", 1.0, 1.0, 1.0),
];

fn build_fixture_xlsx() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Course Results").unwrap();
    for (c, header) in HEADERS.iter().enumerate() {
        sheet.write_string(1, c as u16, *header).unwrap();
    }
    for (r, (name, assignment, email, points, max, percent)) in ROWS.iter().enumerate() {
        let r = (r + 2) as u32;
        sheet.write_string(r, 0, *name).unwrap();
        sheet.write_string(r, 1, *assignment).unwrap();
        sheet.write_string(r, 2, *email).unwrap();
        sheet.write_number(r, 3, *points).unwrap();
        sheet.write_number(r, 4, *max).unwrap();
        sheet.write_number(r, 5, *percent).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}

fn fixture_session() -> Session {
    let bytes = build_fixture_xlsx();
    Session::from_bytes(&bytes, "course", SessionConfig::default()).unwrap()
}

#[test]
fn test_extraction_from_real_workbook() {
    let session = fixture_session();
    assert_eq!(session.title(), "Course Results");
    assert_eq!(session.table().headers(), &HEADERS);
    assert_eq!(session.table().row_count(), 4);
}

#[test]
fn test_category_filter_identity_and_soundness() {
    let mut session = fixture_session();

    let categories = session.categories().unwrap();
    assert_eq!(categories, vec!["Module 1 - Homework", "Survey"]);

    // No selection: everything flows through.
    assert_eq!(session.filtered().row_count(), 4);

    session
        .select_categories(vec!["Module 1 - Homework".to_string()])
        .unwrap();
    assert_eq!(session.filtered().row_count(), 3);
    for row in session.filtered().rows() {
        assert_eq!(row[1].to_display(), "Module 1 - Homework");
    }

    // Back to no selection restores the full table.
    session.select_categories(Vec::new()).unwrap();
    assert_eq!(session.filtered().row_count(), 4);
}

#[test]
fn test_duplicate_resolution_scenario() {
    let mut session = fixture_session();
    session
        .select_categories(vec!["Module 1 - Homework".to_string()])
        .unwrap();

    // One group of two rows for a@x; b@x stays unique.
    assert_eq!(session.status(), ResolutionStatus::Pending { unresolved: 1 });
    let groups = session.duplicate_groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].key, "a@x");
    assert_eq!(groups[0].rows, vec![0, 2]);

    // Export gates on completion.
    assert!(session.resolved_table().is_err());

    session.choose("a@x", 0).unwrap();
    let resolved = session.resolved_table().unwrap();
    assert_eq!(resolved.row_count(), 2);
    assert_eq!(resolved.rows()[0][3].to_display(), "0.5");
    assert_eq!(resolved.rows()[1][0].to_display(), "B");

    // Re-choosing overwrites, it never appends. Rows keep their original
    // filtered order, so unique row B now precedes the chosen row.
    session.choose("a@x", 2).unwrap();
    let resolved = session.resolved_table().unwrap();
    assert_eq!(resolved.row_count(), 2);
    assert_eq!(resolved.rows()[0][0].to_display(), "B");
    assert_eq!(resolved.rows()[1][3].to_display(), "0.9");
}

#[test]
fn test_xlsx_artifact_round_trip() {
    let mut session = fixture_session();
    session
        .select_categories(vec!["Module 1 - Homework".to_string()])
        .unwrap();
    session.choose("a@x", 2).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let outcome = session
        .export_all(dir.path(), &ExportOptions { xlsx: true, pdf: false })
        .unwrap();
    assert!(outcome.is_complete(), "{}", outcome.summary());
    assert_eq!(outcome.written.len(), 1);
    let xlsx_path = &outcome.written[0];
    assert_eq!(
        xlsx_path.file_name().unwrap().to_string_lossy(),
        "course_Module_1.xlsx"
    );

    // Read the artifact back and verify layout and data.
    let bytes = std::fs::read(xlsx_path).unwrap();
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
    assert_eq!(workbook.sheet_names()[0], "Filtered Results");
    let range = workbook.worksheet_range("Filtered Results").unwrap();

    assert_eq!(
        range.get_value((0, 0)),
        Some(&Data::String("Course Results".to_string()))
    );
    for (c, header) in HEADERS.iter().enumerate() {
        assert_eq!(
            range.get_value((1, c as u32)),
            Some(&Data::String(header.to_string()))
        );
    }
    // Data rows keep original filtered order: b@x first, then the chosen
    // a@x row (0.9, filtered index 2).
    assert_eq!(range.get_value((2, 2)), Some(&Data::String("b@x".to_string())));
    assert_eq!(range.get_value((2, 3)), Some(&Data::Float(0.8)));
    assert_eq!(range.get_value((3, 2)), Some(&Data::String("a@x".to_string())));
    assert_eq!(range.get_value((3, 3)), Some(&Data::Float(0.9)));
    // No extra data rows.
    assert_eq!(range.end().map(|(r, _)| r), Some(3));
}

#[test]
fn test_pdf_artifacts_written() {
    if load_report_font().is_err() {
        eprintln!("skipping: no system font available");
        return;
    }
    let mut session = fixture_session();
    session.choose("a@x", 0).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let outcome = session
        .export_all(dir.path(), &ExportOptions { xlsx: false, pdf: true })
        .unwrap();
    assert!(outcome.is_complete(), "{}", outcome.summary());

    let names: Vec<String> = outcome
        .written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "course_unfiltered_portrait.pdf",
            "course_unfiltered_landscape.pdf"
        ]
    );
    for path in &outcome.written {
        let bytes = std::fs::read(path).unwrap();
        assert!(bytes.starts_with(b"%PDF"), "{} is not a PDF", path.display());
    }
}

#[test]
fn test_saved_choices_survive_a_new_session() {
    let mut session = fixture_session();
    session.choose("a@x", 2).unwrap();
    let state = session.resolution_state().unwrap();
    let json = serde_json::to_string(&state).unwrap();

    // A fresh session over the same workbook accepts the saved choices.
    let mut restored = fixture_session();
    let parsed = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.apply_resolution_state(&parsed).unwrap(), 1);
    assert_eq!(restored.status(), ResolutionStatus::Resolved);

    // Against a different filtered set the signature no longer matches.
    let mut filtered = fixture_session();
    filtered
        .select_categories(vec!["Module 1 - Homework".to_string()])
        .unwrap();
    assert!(filtered.apply_resolution_state(&parsed).is_err());
}
