//! # sheetscan
//!
//! Structural analysis of Excel workbooks (`.xlsx`, `.xlsm`, `.xltx`).
//!
//! This library opens a SpreadsheetML package, reads the workbook manifest
//! and the shared string table, and scans every worksheet for its extent,
//! a bounded header and sample preview, and its formulas. Nothing is
//! evaluated and nothing is written back.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sheetscan::analyze_file;
//!
//! let report = analyze_file("budget.xlsx")?;
//! for name in &report.sheet_names {
//!     let sheet = &report.sheets[name];
//!     println!("{}: {} x {}", name, sheet.max_row, sheet.max_column);
//! }
//! # Ok::<(), sheetscan::Error>(())
//! ```
//!
//! ## Tuning the scan
//!
//! ```no_run
//! use sheetscan::{Analyzer, AnalyzeOptions, PreviewLimits};
//!
//! let options = AnalyzeOptions::new()
//!     .with_preview(PreviewLimits::new().with_max_columns(8).with_sample_rows(3))
//!     .with_workers(2);
//!
//! let report = Analyzer::open("budget.xlsx", options)?.analyze()?;
//! println!("{}", sheetscan::render::to_json_default(&report)?);
//! # Ok::<(), sheetscan::Error>(())
//! ```
//!
//! ## Features
//!
//! - `parallel` (default): scan worksheets on a bounded rayon pool

pub mod analyzer;
pub mod cell;
pub mod container;
pub mod detect;
pub mod error;
pub mod formula;
pub mod manifest;
pub mod render;
pub mod report;
pub mod shared_strings;
pub mod worksheet;

// Re-exports
pub use analyzer::{AnalyzeOptions, Analyzer, CancellationToken};
pub use cell::{CellRange, CellRef};
pub use container::{Package, Relationship, Relationships};
pub use detect::{detect_package_kind, PackageKind};
pub use error::{Error, ErrorKind, Result};
pub use formula::{FormulaKind, FormulaRecord};
pub use manifest::{parse_manifest, Manifest, SchemaVersion, SheetDescriptor, SheetVisibility};
pub use report::{assemble, AnalysisReport, ScanWarning, SheetStatus, WorksheetSummary};
pub use shared_strings::SharedStringTable;
pub use worksheet::{scan_worksheet, CellKind, PreviewLimits};

use std::path::Path;

/// Analyze a workbook file with default options.
///
/// # Example
///
/// ```no_run
/// use sheetscan::analyze_file;
///
/// let report = analyze_file("budget.xlsx")?;
/// println!("Sheets: {}", report.sheet_count);
/// # Ok::<(), sheetscan::Error>(())
/// ```
pub fn analyze_file(path: impl AsRef<Path>) -> Result<AnalysisReport> {
    analyze_file_with(path, &AnalyzeOptions::default())
}

/// Analyze a workbook file with custom options.
pub fn analyze_file_with(path: impl AsRef<Path>, options: &AnalyzeOptions) -> Result<AnalysisReport> {
    Analyzer::open(path, options.clone())?.analyze()
}

/// Analyze a workbook held in memory.
pub fn analyze_bytes(data: &[u8]) -> Result<AnalysisReport> {
    analyze_bytes_with(data, &AnalyzeOptions::default())
}

/// Analyze a workbook held in memory with custom options.
pub fn analyze_bytes_with(data: &[u8], options: &AnalyzeOptions) -> Result<AnalysisReport> {
    Analyzer::from_bytes(data.to_vec(), options.clone())?.analyze()
}
