//! Plain text renderer implementation.

use crate::manifest::SheetVisibility;
use crate::report::{AnalysisReport, SheetStatus, WorksheetSummary};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::options::RenderOptions;

/// Convert a report to a human-readable summary.
pub fn to_text(report: &AnalysisReport, options: &RenderOptions) -> String {
    let mut output = String::new();

    output.push_str("Workbook\n");
    output.push_str(&format!(
        "  Sheets: {} ({}, {} schema)\n",
        report.sheet_count, report.package_kind, report.schema
    ));
    output.push_str(&format!("  Shared strings: {}\n", report.shared_string_count));

    for (i, name) in report.sheet_names.iter().enumerate() {
        let marker = match report.sheet(name).map(|s| s.visibility) {
            Some(SheetVisibility::Hidden) => " (hidden)",
            Some(SheetVisibility::VeryHidden) => " (very hidden)",
            _ => "",
        };
        output.push_str(&format!("  {:>3}. {}{}\n", i + 1, name, marker));
    }

    for sheet in report.sheets.values() {
        output.push('\n');
        render_sheet(&mut output, sheet, options);
    }

    output.trim_end().to_string()
}

fn render_sheet(output: &mut String, sheet: &WorksheetSummary, options: &RenderOptions) {
    output.push_str(&format!("Sheet: {}\n", sheet.sheet_name));

    if let SheetStatus::Unreadable { reason } = &sheet.status {
        output.push_str(&format!("  Unreadable: {reason}\n"));
        return;
    }

    match sheet.dimensions {
        Some(range) => output.push_str(&format!(
            "  Dimensions: {} ({} rows x {} columns)\n",
            range, sheet.max_row, sheet.max_column
        )),
        None => output.push_str("  Dimensions: empty\n"),
    }
    output.push_str(&format!(
        "  Cells: {} in {} rows\n",
        sheet.cell_count, sheet.row_count
    ));

    if options.include_preview && !sheet.header_row.is_empty() {
        output.push_str("  Preview:\n");
        output.push_str(&render_preview(sheet, options.max_cell_width));
    }

    if !sheet.formulas.is_empty() {
        output.push_str(&format!("  Formulas ({}):\n", sheet.formulas.len()));
        for formula in sheet.formulas.iter().take(options.max_formulas) {
            output.push_str(&format!(
                "    {:<8} {}\n",
                formula.coordinate.to_string(),
                formula.raw_formula_text
            ));
        }
        let hidden = sheet.formulas.len().saturating_sub(options.max_formulas);
        if hidden > 0 {
            output.push_str(&format!("    ... {hidden} more\n"));
        }
    }

    if options.include_warnings && !sheet.warnings.is_empty() {
        output.push_str(&format!("  Warnings ({}):\n", sheet.warnings.len()));
        for warning in &sheet.warnings {
            output.push_str(&format!("    {warning}\n"));
        }
    }
}

/// Render header and sample rows as an aligned grid.
fn render_preview(sheet: &WorksheetSummary, max_width: usize) -> String {
    let rows: Vec<Vec<String>> = std::iter::once(&sheet.header_row)
        .chain(sheet.sample_rows.iter())
        .map(|row| row.iter().map(|v| fit(v, max_width)).collect())
        .collect();

    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![1usize; col_count];
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.width());
        }
    }

    let mut output = String::new();
    for (row_idx, row) in rows.iter().enumerate() {
        output.push_str("    ");
        let cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| pad(row.get(i).map(String::as_str).unwrap_or(""), w))
            .collect();
        output.push_str(cells.join(" | ").trim_end());
        output.push('\n');

        if row_idx == 0 {
            let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
            output.push_str("    ");
            output.push_str(&rule.join("-+-"));
            output.push('\n');
        }
    }
    output
}

/// Flatten line breaks and cut a value to `max_width` terminal cells.
fn fit(value: &str, max_width: usize) -> String {
    let flat = value.replace(['\r', '\n', '\t'], " ");
    if flat.width() <= max_width {
        return flat;
    }

    let budget = max_width.saturating_sub(1);
    let mut used = 0;
    let mut out = String::new();
    for c in flat.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

fn pad(value: &str, width: usize) -> String {
    let fill = width.saturating_sub(value.width());
    format!("{value}{}", " ".repeat(fill))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellRange, CellRef};
    use crate::detect::PackageKind;
    use crate::formula::{FormulaKind, FormulaRecord};
    use crate::manifest::SchemaVersion;
    use crate::report::ScanWarning;
    use indexmap::IndexMap;

    fn report_with(sheet: WorksheetSummary) -> AnalysisReport {
        let mut sheets = IndexMap::new();
        let name = sheet.sheet_name.clone();
        sheets.insert(name.clone(), sheet);
        AnalysisReport {
            sheet_count: 1,
            sheet_names: vec![name],
            sheets,
            schema: SchemaVersion::Transitional,
            package_kind: PackageKind::Workbook,
            shared_string_count: 2,
        }
    }

    #[test]
    fn test_to_text_sheet_details() {
        let mut sheet = WorksheetSummary {
            sheet_name: "Data".to_string(),
            dimensions: Some(CellRange::new(CellRef::new(1, 1), CellRef::new(3, 2))),
            max_row: 3,
            max_column: 2,
            row_count: 3,
            cell_count: 6,
            header_row: vec!["Name".to_string(), "Qty".to_string()],
            sample_rows: vec![vec!["Bolt".to_string(), "4".to_string()]],
            ..Default::default()
        };
        sheet.formulas.push(FormulaRecord::new(
            CellRef::new(3, 2),
            "SUM(B2:B2)",
            FormulaKind::Normal,
        ));
        sheet.warnings.push(ScanWarning::BrokenStringReference {
            cell: CellRef::new(3, 1),
            index: 9,
            table_len: 2,
        });

        let text = to_text(&report_with(sheet), &RenderOptions::default());
        assert!(text.contains("Sheets: 1"));
        assert!(text.contains("Sheet: Data"));
        assert!(text.contains("Dimensions: A1:B3 (3 rows x 2 columns)"));
        assert!(text.contains("    Name | Qty\n"));
        assert!(text.contains("    Bolt | 4\n"));
        assert!(text.contains("B3       =SUM(B2:B2)"));
        assert!(text.contains("A3: shared string 9 out of range"));
    }

    #[test]
    fn test_to_text_unreadable() {
        let sheet = WorksheetSummary::unreadable("Chart1", "not a worksheet (chartsheet)");
        let text = to_text(&report_with(sheet), &RenderOptions::default());
        assert!(text.contains("Unreadable: not a worksheet (chartsheet)"));
        assert!(!text.contains("Dimensions"));
    }

    #[test]
    fn test_fit_uses_display_width() {
        assert_eq!(fit("short", 10), "short");
        assert_eq!(fit("a\nb", 10), "a b");
        assert_eq!(fit("abcdefgh", 5), "abcd…");
        // Wide characters take two cells each.
        assert_eq!(fit("日本語テキスト", 5), "日本…");
        assert_eq!(pad("日本", 6), "日本  ");
    }

    #[test]
    fn test_formula_list_is_capped() {
        let mut sheet = WorksheetSummary {
            sheet_name: "Calc".to_string(),
            max_row: 5,
            max_column: 1,
            ..Default::default()
        };
        for row in 1..=5 {
            sheet
                .formulas
                .push(FormulaRecord::new(CellRef::new(row, 1), "1+1", FormulaKind::Normal));
        }
        let opts = RenderOptions::default().with_max_formulas(2);
        let text = to_text(&report_with(sheet), &opts);
        assert!(text.contains("Formulas (5):"));
        assert!(text.contains("... 3 more"));
    }
}
