//! Workbook analysis: from an opened package to an [`AnalysisReport`].
//!
//! The flow is package relationships → manifest → shared strings →
//! one scan per worksheet → assembly. Archive and manifest failures abort;
//! a worksheet that cannot be read becomes an unreadable entry in the report.
//! A malformed shared string table is replaced by an empty one, so every
//! string cell then reports a broken reference.

use crate::container::{resolve_path, Package, Relationships};
use crate::detect::{detect_package_kind, PackageKind};
use crate::error::{Error, ErrorKind, Result};
use crate::manifest::{parse_manifest, Manifest, SheetDescriptor, DEFAULT_MANIFEST_PART};
use crate::report::{assemble, AnalysisReport, WorkbookFacts, WorksheetSummary};
use crate::shared_strings::{SharedStringTable, DEFAULT_SHARED_STRINGS_PART};
use crate::worksheet::{scan_worksheet, PreviewLimits};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Cooperative cancellation flag shared between a caller and an analysis.
///
/// Checked between worksheet scans, never in the middle of one.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options controlling an analysis.
///
/// # Example
///
/// ```
/// use sheetscan::{AnalyzeOptions, PreviewLimits};
///
/// let options = AnalyzeOptions::new()
///     .with_preview(PreviewLimits::new().with_max_columns(10))
///     .with_workers(4);
/// assert_eq!(options.preview.max_columns, 10);
/// ```
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Preview bounds for each worksheet
    pub preview: PreviewLimits,
    /// Worker threads for worksheet scans; 0 picks one per core, 1 scans
    /// sequentially on the calling thread
    pub workers: usize,
    /// Caller-held cancellation flag
    pub cancellation: Option<CancellationToken>,
    /// Point in time after which no further worksheet is scanned
    pub deadline: Option<Instant>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            preview: PreviewLimits::default(),
            workers: 0,
            cancellation: None,
            deadline: None,
        }
    }
}

impl AnalyzeOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preview limits.
    pub fn with_preview(mut self, preview: PreviewLimits) -> Self {
        self.preview = preview;
        self
    }

    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set a deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn check_cancelled(&self) -> Result<()> {
        let cancelled = self
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled);
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        if cancelled || expired {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// A worksheet scan to run: the descriptor and where its part lives.
#[derive(Debug, Clone)]
struct ScanJob<'m> {
    descriptor: &'m SheetDescriptor,
    part: std::result::Result<String, String>,
}

/// Analyzer bound to one opened package.
#[derive(Debug)]
pub struct Analyzer<R = BufReader<File>> {
    package: Package<R>,
    options: AnalyzeOptions,
}

impl Analyzer<BufReader<File>> {
    /// Open a workbook file.
    pub fn open(path: impl AsRef<Path>, options: AnalyzeOptions) -> Result<Self> {
        Ok(Self::new(Package::open(path)?, options))
    }
}

impl Analyzer<Cursor<Vec<u8>>> {
    /// Analyze an in-memory workbook.
    pub fn from_bytes(data: Vec<u8>, options: AnalyzeOptions) -> Result<Self> {
        Ok(Self::new(Package::from_bytes(data)?, options))
    }
}

impl<R: Read + Seek + Send> Analyzer<R> {
    /// Wrap an already opened package.
    pub fn new(package: Package<R>, options: AnalyzeOptions) -> Self {
        Self { package, options }
    }

    /// The underlying package.
    pub fn package(&self) -> &Package<R> {
        &self.package
    }

    /// Locate and parse the manifest.
    ///
    /// Returns the manifest together with the entry it was read from.
    pub fn manifest(&self) -> Result<(String, Manifest)> {
        let path = self.manifest_path()?;
        let xml = self
            .package
            .read_xml_opt(&path)?
            .ok_or_else(|| Error::MissingManifestEntry(path.clone()))?;
        let manifest = parse_manifest(&xml, &path)?;
        log::debug!("{path}: {} sheets declared", manifest.sheets.len());
        Ok((path, manifest))
    }

    /// Run the full analysis.
    pub fn analyze(&self) -> Result<AnalysisReport> {
        self.options.check_cancelled()?;

        let package_kind = detect_package_kind(&self.package).unwrap_or_else(|e| {
            log::warn!("content types unreadable, continuing: {e}");
            PackageKind::Unknown
        });

        let (manifest_path, manifest) = self.manifest()?;
        let rels = self.package.read_relationships(&manifest_path)?;

        let shared = match self.shared_strings(&manifest_path, &rels) {
            Ok(shared) => shared,
            Err(e) if e.kind() == ErrorKind::MalformedXml => {
                log::warn!("shared strings unreadable, string cells will show as broken: {e}");
                SharedStringTable::default()
            }
            Err(e) => return Err(e),
        };

        let jobs: Vec<ScanJob<'_>> = manifest
            .sheets
            .iter()
            .map(|descriptor| ScanJob {
                descriptor,
                part: worksheet_part(&manifest_path, &rels, descriptor),
            })
            .collect();

        let summaries = self.run_jobs(&jobs, &shared)?;

        Ok(assemble(
            &manifest.sheets,
            summaries,
            WorkbookFacts {
                schema: manifest.schema,
                package_kind,
                shared_string_count: shared.len(),
            },
        ))
    }

    fn manifest_path(&self) -> Result<String> {
        let package_rels = self.package.read_relationships("")?;
        let declared = package_rels
            .iter()
            .find(|r| r.kind() == "officeDocument" && !r.external)
            .map(|r| resolve_path("", &r.target));

        Ok(match declared {
            Some(path) if self.package.contains(&path) => path,
            Some(path) => {
                log::warn!("package points at missing manifest {path}, trying {DEFAULT_MANIFEST_PART}");
                DEFAULT_MANIFEST_PART.to_string()
            }
            None => DEFAULT_MANIFEST_PART.to_string(),
        })
    }

    fn shared_strings(
        &self,
        manifest_path: &str,
        rels: &Relationships,
    ) -> Result<SharedStringTable> {
        let path = rels
            .find_kind("sharedStrings")
            .map(|r| resolve_path(manifest_path, &r.target))
            .filter(|p| self.package.contains(p))
            .unwrap_or_else(|| DEFAULT_SHARED_STRINGS_PART.to_string());

        let xml = self.package.read_xml_opt(&path)?;
        SharedStringTable::parse_opt(xml.as_deref(), &path)
    }

    fn run_jobs(
        &self,
        jobs: &[ScanJob<'_>],
        shared: &SharedStringTable,
    ) -> Result<HashMap<String, WorksheetSummary>> {
        #[cfg(feature = "parallel")]
        if self.options.workers != 1 && jobs.len() > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.workers)
                .build()
            {
                Ok(pool) => {
                    use rayon::prelude::*;
                    return pool.install(|| {
                        jobs.par_iter()
                            .map(|job| self.scan_job(job, shared))
                            .collect::<Result<Vec<_>>>()
                            .map(|v| v.into_iter().collect())
                    });
                }
                Err(e) => log::warn!("worker pool unavailable, scanning sequentially: {e}"),
            }
        }

        jobs.iter().map(|job| self.scan_job(job, shared)).collect()
    }

    /// Scan one sheet. Only cancellation is returned as an error; every
    /// other failure becomes the sheet's unreadable sentinel.
    fn scan_job(
        &self,
        job: &ScanJob<'_>,
        shared: &SharedStringTable,
    ) -> Result<(String, WorksheetSummary)> {
        self.options.check_cancelled()?;

        let name = job.descriptor.name.clone();
        let outcome = job
            .part
            .clone()
            .map_err(|reason| Error::WorksheetUnreadable {
                sheet: name.clone(),
                reason,
            })
            .and_then(|part| {
                let xml = self.package.read_xml(&part)?;
                scan_worksheet(&xml, &name, &part, shared, &self.options.preview)
            });

        let summary = match outcome {
            Ok(summary) => summary,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(Error::WorksheetUnreadable { reason, .. }) => unreadable(&name, reason),
            Err(other) => unreadable(&name, other.to_string()),
        };

        Ok((name, summary))
    }
}

fn unreadable(name: &str, reason: String) -> WorksheetSummary {
    log::warn!("worksheet '{name}' is unreadable: {reason}");
    WorksheetSummary::unreadable(name, reason)
}

/// Resolve the worksheet part behind a descriptor, or say why it has none.
fn worksheet_part(
    manifest_path: &str,
    rels: &Relationships,
    descriptor: &SheetDescriptor,
) -> std::result::Result<String, String> {
    if descriptor.relationship_id.is_empty() {
        return Err("sheet has no relationship id".to_string());
    }
    let rel = rels
        .get(&descriptor.relationship_id)
        .ok_or_else(|| format!("relationship '{}' not found", descriptor.relationship_id))?;
    if rel.external {
        return Err(format!("relationship '{}' points outside the package", rel.id));
    }
    if rel.kind() != "worksheet" {
        return Err(format!("not a worksheet ({})", rel.kind()));
    }
    Ok(resolve_path(manifest_path, &rel.target))
}
