//! Report data model and the report assembler.
//!
//! Everything here is a plain value: built once by a parser or the
//! assembler, never mutated afterwards, and serializable on its own.

use crate::cell::{CellRange, CellRef};
use crate::detect::PackageKind;
use crate::formula::FormulaRecord;
use crate::manifest::{SchemaVersion, SheetDescriptor, SheetVisibility};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Whether a worksheet could be scanned.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SheetStatus {
    /// The worksheet part was read and scanned.
    #[default]
    Scanned,
    /// The part was missing, not a worksheet, or failed to parse.
    Unreadable {
        /// What went wrong
        reason: String,
    },
}

/// Sheet-local problem that did not stop the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ScanWarning {
    /// A shared-string cell pointed past the end of the table; its value
    /// was treated as empty.
    #[serde(rename_all = "camelCase")]
    BrokenStringReference {
        cell: CellRef,
        index: usize,
        table_len: usize,
    },
    /// A shared-string cell whose value is not an index at all.
    #[serde(rename_all = "camelCase")]
    InvalidStringIndex { cell: CellRef, raw: String },
    /// A shared-formula follower whose group anchor never appeared.
    #[serde(rename_all = "camelCase")]
    UnresolvedSharedFormula { cell: CellRef, group: String },
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanWarning::BrokenStringReference {
                cell,
                index,
                table_len,
            } => write!(
                f,
                "{cell}: shared string {index} out of range (table has {table_len})"
            ),
            ScanWarning::InvalidStringIndex { cell, raw } => {
                write!(f, "{cell}: '{raw}' is not a shared string index")
            }
            ScanWarning::UnresolvedSharedFormula { cell, group } => {
                write!(f, "{cell}: shared formula group {group} has no anchor")
            }
        }
    }
}

/// Structural summary of one worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetSummary {
    /// Sheet name from the manifest
    pub sheet_name: String,
    /// Scan outcome
    pub status: SheetStatus,
    /// Tab visibility from the manifest
    pub visibility: SheetVisibility,
    /// Bounding range of every cell seen, `None` for an empty sheet
    pub dimensions: Option<CellRange>,
    /// The sheet's own `<dimension ref>`, as written
    pub declared_dimension: Option<String>,
    /// Highest row index seen (0 when empty)
    pub max_row: u32,
    /// Highest column index seen (0 when empty)
    pub max_column: u32,
    /// Row elements holding at least one cell
    pub row_count: usize,
    /// Cell elements seen
    pub cell_count: usize,
    /// First row, bounded by the preview width
    pub header_row: Vec<String>,
    /// Rows following the header, bounded by the preview limits
    pub sample_rows: Vec<Vec<String>>,
    /// Every formula in the sheet, in document order
    pub formulas: Vec<FormulaRecord>,
    /// Sheet-local problems
    pub warnings: Vec<ScanWarning>,
}

impl WorksheetSummary {
    /// The sentinel summary for a sheet that could not be scanned.
    pub fn unreadable(sheet_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            status: SheetStatus::Unreadable {
                reason: reason.into(),
            },
            ..Default::default()
        }
    }

    /// Whether the sheet was scanned.
    pub fn is_readable(&self) -> bool {
        self.status == SheetStatus::Scanned
    }

    /// Formula at `cell`, if any.
    pub fn formula_at(&self, cell: CellRef) -> Option<&FormulaRecord> {
        self.formulas.iter().find(|f| f.coordinate == cell)
    }
}

/// The finished analysis of one workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Number of sheets in the manifest
    pub sheet_count: usize,
    /// Sheet names in manifest order
    pub sheet_names: Vec<String>,
    /// Per-sheet summaries, keyed and ordered like `sheet_names`
    pub sheets: IndexMap<String, WorksheetSummary>,
    /// Schema flavour of the manifest
    pub schema: SchemaVersion,
    /// Package flavour from the content types
    pub package_kind: PackageKind,
    /// Size of the shared string table
    pub shared_string_count: usize,
}

impl AnalysisReport {
    /// Summary for a sheet by name.
    pub fn sheet(&self, name: &str) -> Option<&WorksheetSummary> {
        self.sheets.get(name)
    }

    /// Every sheet-local warning, with the sheet it came from.
    pub fn warnings(&self) -> impl Iterator<Item = (&str, &ScanWarning)> {
        self.sheets
            .values()
            .flat_map(|s| s.warnings.iter().map(move |w| (s.sheet_name.as_str(), w)))
    }

    /// Names of sheets that could not be scanned.
    pub fn unreadable_sheets(&self) -> Vec<&str> {
        self.sheets
            .values()
            .filter(|s| !s.is_readable())
            .map(|s| s.sheet_name.as_str())
            .collect()
    }

    /// True when every sheet was scanned without warnings.
    pub fn is_clean(&self) -> bool {
        self.sheets
            .values()
            .all(|s| s.is_readable() && s.warnings.is_empty())
    }

    /// Total formulas across sheets.
    pub fn formula_count(&self) -> usize {
        self.sheets.values().map(|s| s.formulas.len()).sum()
    }
}

/// Workbook-level facts carried into the report unchanged.
#[derive(Debug, Clone, Copy)]
pub struct WorkbookFacts {
    /// Manifest schema flavour
    pub schema: SchemaVersion,
    /// Package flavour from the content types
    pub package_kind: PackageKind,
    /// Entries in the shared string table (0 when there is none)
    pub shared_string_count: usize,
}

/// Merge descriptors and scan results into a report.
///
/// Output order follows `descriptors`, whatever order the summaries were
/// produced in. A descriptor without a summary gets an unreadable sentinel
/// so the inventory and the details always agree. Summaries for names not
/// in `descriptors` are ignored.
pub fn assemble(
    descriptors: &[SheetDescriptor],
    mut summaries: HashMap<String, WorksheetSummary>,
    facts: WorkbookFacts,
) -> AnalysisReport {
    let mut sheets = IndexMap::with_capacity(descriptors.len());

    for descriptor in descriptors {
        let mut summary = summaries
            .remove(&descriptor.name)
            .unwrap_or_else(|| WorksheetSummary::unreadable(&descriptor.name, "worksheet was not scanned"));
        summary.sheet_name.clone_from(&descriptor.name);
        summary.visibility = descriptor.visibility;
        sheets.insert(descriptor.name.clone(), summary);
    }

    AnalysisReport {
        sheet_count: descriptors.len(),
        sheet_names: descriptors.iter().map(|d| d.name.clone()).collect(),
        sheets,
        schema: facts.schema,
        package_kind: facts.package_kind,
        shared_string_count: facts.shared_string_count,
    }
}
