//! JSON renderer implementation.

use crate::error::Result;
use crate::formula::FormulaRecord;
use crate::report::{AnalysisReport, SheetStatus, WorksheetSummary};
use indexmap::IndexMap;
use serde::Serialize;

/// JSON output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JsonFormat {
    /// Compact single-line JSON
    Compact,
    /// Pretty-printed with 2-space indentation
    #[default]
    Pretty,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportDocument<'a> {
    workbook_info: WorkbookInfo<'a>,
    sheets_analysis: IndexMap<&'a str, SheetAnalysis<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkbookInfo<'a> {
    total_sheets: usize,
    sheet_names: &'a [String],
    schema: crate::manifest::SchemaVersion,
    package_kind: crate::detect::PackageKind,
    shared_strings: usize,
    unreadable_sheets: Vec<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SheetAnalysis<'a> {
    readable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
    visibility: crate::manifest::SheetVisibility,
    dimensions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    declared_dimension: Option<&'a str>,
    max_row: u32,
    max_column: u32,
    row_count: usize,
    cell_count: usize,
    headers: &'a [String],
    sample_data: &'a [Vec<String>],
    formulas: &'a [FormulaRecord],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

impl<'a> From<&'a WorksheetSummary> for SheetAnalysis<'a> {
    fn from(sheet: &'a WorksheetSummary) -> Self {
        let reason = match &sheet.status {
            SheetStatus::Scanned => None,
            SheetStatus::Unreadable { reason } => Some(reason.as_str()),
        };
        Self {
            readable: reason.is_none(),
            reason,
            visibility: sheet.visibility,
            dimensions: sheet.dimensions.map(|d| d.to_string()),
            declared_dimension: sheet.declared_dimension.as_deref(),
            max_row: sheet.max_row,
            max_column: sheet.max_column,
            row_count: sheet.row_count,
            cell_count: sheet.cell_count,
            headers: &sheet.header_row,
            sample_data: &sheet.sample_rows,
            formulas: &sheet.formulas,
            warnings: sheet.warnings.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Convert a report to JSON.
///
/// The document has two top-level objects: `workbookInfo` with the sheet
/// inventory and `sheetsAnalysis` keyed by sheet name, in manifest order.
pub fn to_json(report: &AnalysisReport, format: JsonFormat) -> Result<String> {
    let document = ReportDocument {
        workbook_info: WorkbookInfo {
            total_sheets: report.sheet_count,
            sheet_names: &report.sheet_names,
            schema: report.schema,
            package_kind: report.package_kind,
            shared_strings: report.shared_string_count,
            unreadable_sheets: report.unreadable_sheets(),
        },
        sheets_analysis: report
            .sheets
            .iter()
            .map(|(name, sheet)| (name.as_str(), SheetAnalysis::from(sheet)))
            .collect(),
    };

    let json = match format {
        JsonFormat::Compact => serde_json::to_string(&document)?,
        JsonFormat::Pretty => serde_json::to_string_pretty(&document)?,
    };
    Ok(json)
}

/// Convert a report to pretty-printed JSON.
pub fn to_json_default(report: &AnalysisReport) -> Result<String> {
    to_json(report, JsonFormat::Pretty)
}
