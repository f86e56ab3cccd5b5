//! Output rendering for analysis reports.
//!
//! Two renderers share one [`AnalysisReport`](crate::AnalysisReport):
//! a JSON document for machines and an aligned plain text summary for
//! people.
//!
//! # Example
//!
//! ```no_run
//! use sheetscan::{analyze_file, render::*};
//!
//! let report = analyze_file("budget.xlsx")?;
//!
//! // Render to JSON
//! let json = to_json(&report, JsonFormat::Pretty)?;
//!
//! // Render to plain text
//! let text = to_text(&report, &RenderOptions::default());
//! # Ok::<(), sheetscan::Error>(())
//! ```

mod json;
mod options;
mod text;

pub use json::{to_json, to_json_default, JsonFormat};
pub use options::RenderOptions;
pub use text::to_text;
