//! End-to-end analysis of workbooks assembled in memory.
//!
//! Run with: cargo test --test analyze

mod common;

use common::{numeric_row, WorkbookBuilder};
use proptest::prelude::*;
use sheetscan::render::{to_json, JsonFormat};
use sheetscan::{
    analyze_bytes, analyze_bytes_with, AnalyzeOptions, CellRef, FormulaKind, PackageKind,
    PreviewLimits, SchemaVersion, ScanWarning, SheetStatus, SheetVisibility,
};

fn summary_and_cost_plan() -> Vec<u8> {
    WorkbookBuilder::new()
        .shared_strings(&["Project", "Budget"])
        .sheet(
            "Summary",
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
               <row r="2"><c r="A2" t="inlineStr"><is><t>Bridge</t></is></c><c r="B2"><v>1200</v></c></row>"#,
        )
        .sheet(
            "CostPlan",
            r#"<row r="1"><c r="C1"><v>1</v></c></row>
               <row r="2"><c r="C2"><v>2</v></c></row>
               <row r="3"><c r="C3"><v>3</v></c></row>
               <row r="4"><c r="C4"><f>SUM(C1:C3)</f><v>6</v></c></row>"#,
        )
        .build()
}

#[test]
fn test_two_sheet_workbook() {
    let report = analyze_bytes(&summary_and_cost_plan()).unwrap();

    assert_eq!(report.sheet_count, 2);
    assert_eq!(report.sheet_names, vec!["Summary", "CostPlan"]);
    assert_eq!(report.package_kind, PackageKind::Workbook);
    assert_eq!(report.schema, SchemaVersion::Transitional);
    assert_eq!(report.shared_string_count, 2);

    let summary = report.sheet("Summary").unwrap();
    assert_eq!(summary.header_row, vec!["Project", "Budget"]);
    assert_eq!(summary.sample_rows, vec![vec!["Bridge", "1200"]]);

    let cost = report.sheet("CostPlan").unwrap();
    assert_eq!(cost.max_row, 4);
    assert_eq!(cost.max_column, 3);
    assert_eq!(cost.dimensions.unwrap().to_string(), "C1:C4");
    assert_eq!(cost.formulas.len(), 1);
    assert_eq!(cost.formulas[0].coordinate, CellRef::parse("C4").unwrap());
    assert_eq!(cost.formulas[0].raw_formula_text, "=SUM(C1:C3)");
    assert_eq!(cost.formulas[0].kind, FormulaKind::Normal);

    assert!(report.is_clean());
}

#[test]
fn test_inventory_matches_details() {
    let report = analyze_bytes(&summary_and_cost_plan()).unwrap();
    assert_eq!(report.sheet_count, report.sheet_names.len());
    assert_eq!(report.sheet_count, report.sheets.len());
    let keys: Vec<&String> = report.sheets.keys().collect();
    let names: Vec<&String> = report.sheet_names.iter().collect();
    assert_eq!(keys, names);
}

#[test]
fn test_analysis_is_deterministic() {
    let data = summary_and_cost_plan();
    let first = analyze_bytes(&data).unwrap();
    let second = analyze_bytes(&data).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        to_json(&first, JsonFormat::Compact).unwrap(),
        to_json(&second, JsonFormat::Compact).unwrap()
    );
}

#[test]
fn test_sequential_and_pool_agree() {
    let mut builder = WorkbookBuilder::new();
    for s in 0..8 {
        let rows: String = (1..=30).map(|r| numeric_row(r, &[r as i64, s, r as i64 * s])).collect();
        builder = builder.sheet(&format!("Sheet{s}"), &rows);
    }
    let data = builder.build();

    let sequential = analyze_bytes_with(&data, &AnalyzeOptions::new().with_workers(1)).unwrap();
    let pooled = analyze_bytes_with(&data, &AnalyzeOptions::new().with_workers(4)).unwrap();
    assert_eq!(sequential, pooled);
    assert_eq!(pooled.sheet_names[7], "Sheet7");
}

#[test]
fn test_wide_sheet_preview_is_truncated() {
    let rows: String = (1..=3)
        .map(|r| numeric_row(r, &(1..=25).collect::<Vec<i64>>()))
        .collect();
    let data = WorkbookBuilder::new().sheet("Wide", &rows).build();

    let options = AnalyzeOptions::new().with_preview(PreviewLimits::new().with_max_columns(20));
    let report = analyze_bytes_with(&data, &options).unwrap();
    let wide = report.sheet("Wide").unwrap();

    assert_eq!(wide.max_column, 25);
    assert_eq!(wide.max_row, 3);
    assert_eq!(wide.header_row.len(), 20);
    assert_eq!(wide.sample_rows.len(), 2);
    assert!(wide.sample_rows.iter().all(|row| row.len() == 20));
    assert_eq!(wide.dimensions.unwrap().to_string(), "A1:Y3");
}

#[test]
fn test_manifest_without_sheets() {
    let report = analyze_bytes(&WorkbookBuilder::new().build()).unwrap();
    assert_eq!(report.sheet_count, 0);
    assert!(report.sheet_names.is_empty());
    assert!(report.sheets.is_empty());
}

#[test]
fn test_broken_string_reference_warns_per_cell() {
    let data = WorkbookBuilder::new()
        .shared_strings(&["a", "b", "c"])
        .sheet(
            "Data",
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>7</v></c></row>
               <row r="2"><c r="A2" t="s"><v>7</v></c><c r="B2" t="s"><v>2</v></c></row>"#,
        )
        .build();

    let report = analyze_bytes(&data).unwrap();
    let data_sheet = report.sheet("Data").unwrap();
    assert!(data_sheet.is_readable());
    assert_eq!(data_sheet.header_row, vec!["a", ""]);
    assert_eq!(data_sheet.sample_rows, vec![vec!["", "c"]]);

    let warnings: Vec<_> = report.warnings().collect();
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|(sheet, _)| *sheet == "Data"));
    assert_eq!(
        *warnings[0].1,
        ScanWarning::BrokenStringReference {
            cell: CellRef::new(1, 2),
            index: 7,
            table_len: 3,
        }
    );
    assert!(!report.is_clean());
}

#[test]
fn test_shared_string_index_without_table() {
    let data = WorkbookBuilder::new()
        .sheet("Data", r#"<row r="1"><c r="A1" t="s"><v>0</v></c></row>"#)
        .build();

    let report = analyze_bytes(&data).unwrap();
    assert_eq!(report.shared_string_count, 0);
    assert_eq!(report.warnings().count(), 1);
}

#[test]
fn test_malformed_shared_strings_degrade() {
    let data = WorkbookBuilder::new()
        .shared_strings_part(r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>Name</t></sst>"#)
        .sheet(
            "Data",
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>42</v></c></row>"#,
        )
        .sheet("Numbers", &numeric_row(1, &[1, 2]))
        .build();

    let report = analyze_bytes(&data).unwrap();
    assert_eq!(report.sheet_names, vec!["Data", "Numbers"]);
    assert_eq!(report.shared_string_count, 0);
    assert!(report.unreadable_sheets().is_empty());

    let data_sheet = report.sheet("Data").unwrap();
    assert_eq!(data_sheet.header_row, vec!["", "42"]);
    let warnings: Vec<_> = report.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        *warnings[0].1,
        ScanWarning::BrokenStringReference {
            cell: CellRef::new(1, 1),
            index: 0,
            table_len: 0,
        }
    );
    assert_eq!(report.sheet("Numbers").unwrap().max_column, 2);
}

#[test]
fn test_unreadable_sheets_keep_their_place() {
    let data = WorkbookBuilder::new()
        .sheet("First", &numeric_row(1, &[1]))
        .missing_sheet("Gone")
        .chartsheet("Chart")
        .sheet("Last", &numeric_row(1, &[2]))
        .build();

    let report = analyze_bytes(&data).unwrap();
    assert_eq!(report.sheet_names, vec!["First", "Gone", "Chart", "Last"]);
    assert_eq!(report.sheets.len(), 4);
    assert_eq!(report.unreadable_sheets(), vec!["Gone", "Chart"]);

    match &report.sheet("Chart").unwrap().status {
        SheetStatus::Unreadable { reason } => assert_eq!(reason, "not a worksheet (chartsheet)"),
        other => panic!("unexpected status {other:?}"),
    }
    let gone = report.sheet("Gone").unwrap();
    assert!(!gone.is_readable());
    assert_eq!(gone.max_row, 0);
    assert!(report.sheet("Last").unwrap().is_readable());
}

#[test]
fn test_malformed_sheet_is_unreadable_not_fatal() {
    let data = WorkbookBuilder::new()
        .sheet("Good", &numeric_row(1, &[1, 2]))
        .sheet("Bad", r#"<row r="1"><c r="A1"><v>1</v></row>"#)
        .build();

    let report = analyze_bytes(&data).unwrap();
    assert!(report.sheet("Good").unwrap().is_readable());
    assert_eq!(report.unreadable_sheets(), vec!["Bad"]);
}

#[test]
fn test_visibility_and_content_types() {
    let data = WorkbookBuilder::new()
        .sheet("Shown", &numeric_row(1, &[1]))
        .sheet_with_state("Tucked", "hidden", &numeric_row(1, &[2]))
        .sheet_with_state("Buried", "veryHidden", &numeric_row(1, &[3]))
        .without_content_types()
        .build();

    let report = analyze_bytes(&data).unwrap();
    assert_eq!(report.package_kind, PackageKind::Unknown);
    assert_eq!(report.sheet("Shown").unwrap().visibility, SheetVisibility::Visible);
    assert_eq!(report.sheet("Tucked").unwrap().visibility, SheetVisibility::Hidden);
    assert_eq!(report.sheet("Buried").unwrap().visibility, SheetVisibility::VeryHidden);
}

#[test]
fn test_strict_schema() {
    let data = WorkbookBuilder::new()
        .namespace("http://purl.oclc.org/ooxml/spreadsheetml/main")
        .sheet("Data", &numeric_row(1, &[1]))
        .build();

    let report = analyze_bytes(&data).unwrap();
    assert_eq!(report.schema, SchemaVersion::Strict);
}

#[test]
fn test_shared_formula_column() {
    let data = WorkbookBuilder::new()
        .sheet(
            "Calc",
            r#"<row r="1"><c r="A1"><v>1</v></c><c r="B1"><f t="shared" ref="B1:B3" si="0">A1*$D$1</f><v>1</v></c></row>
               <row r="2"><c r="A2"><v>2</v></c><c r="B2"><f t="shared" si="0"/><v>2</v></c></row>
               <row r="3"><c r="A3"><v>3</v></c><c r="B3"><f t="shared" si="0"/><v>3</v></c></row>"#,
        )
        .build();

    let report = analyze_bytes(&data).unwrap();
    let calc = report.sheet("Calc").unwrap();
    assert_eq!(report.formula_count(), 3);
    assert_eq!(
        calc.formula_at(CellRef::new(3, 2)).unwrap().raw_formula_text,
        "=A3*$D$1"
    );
}

#[test]
fn test_json_report_shape() {
    let report = analyze_bytes(&summary_and_cost_plan()).unwrap();
    let json = to_json(&report, JsonFormat::Pretty).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["workbookInfo"]["totalSheets"], 2);
    assert_eq!(
        value["sheetsAnalysis"]["CostPlan"]["formulas"][0]["rawFormulaText"],
        "=SUM(C1:C3)"
    );
    assert_eq!(value["sheetsAnalysis"]["Summary"]["headers"][1], "Budget");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn extent_ignores_preview_limits(
        rows in 1u32..12,
        cols in 1usize..30,
        max_columns in 0usize..25,
        sample_rows in 0usize..8,
    ) {
        let values: Vec<i64> = (1..=cols as i64).collect();
        let body: String = (1..=rows).map(|r| numeric_row(r, &values)).collect();
        let data = WorkbookBuilder::new().sheet("P", &body).build();

        let options = AnalyzeOptions::new().with_preview(
            PreviewLimits::new()
                .with_max_columns(max_columns)
                .with_sample_rows(sample_rows),
        );
        let report = analyze_bytes_with(&data, &options).unwrap();
        let sheet = report.sheet("P").unwrap();

        prop_assert_eq!(sheet.max_row, rows);
        prop_assert_eq!(sheet.max_column, cols as u32);
        prop_assert_eq!(sheet.header_row.len(), cols.min(max_columns));
        prop_assert_eq!(sheet.sample_rows.len(), (rows as usize - 1).min(sample_rows));
    }
}
