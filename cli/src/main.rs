//! sheetscan CLI - structural reports for Excel workbooks
//!
//! A command-line tool that prints the sheet inventory, extents, previews and
//! formulas of an XLSX file as plain text or JSON.

use clap::{Parser, ValueEnum};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use sheetscan::render::{JsonFormat, RenderOptions};
use sheetscan::{AnalysisReport, AnalyzeOptions, ErrorKind, PreviewLimits};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Structural analysis of Excel workbooks
#[derive(Parser)]
#[command(
    name = "sheetscan",
    author = "iyulab",
    version,
    about = "Summarize the structure of an Excel workbook",
    long_about = "sheetscan - structural analysis of Excel workbooks.\n\n\
                  Lists every sheet with its extent, a header and sample preview, \
                  and its formulas, as plain text or JSON. Nothing is evaluated."
)]
struct Cli {
    /// Input workbook path
    input: PathBuf,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Output compact JSON (no indentation)
    #[arg(long)]
    compact: bool,

    /// Widest preview, in columns
    #[arg(long, default_value = "20")]
    max_columns: usize,

    /// Sample rows shown after the header row
    #[arg(long, default_value = "5")]
    sample_rows: usize,

    /// Worker threads for sheet scans (0 = one per core)
    #[arg(short, long, default_value = "0")]
    jobs: usize,

    /// Log part resolution and scan progress
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors, hide the spinner
    #[arg(short, long)]
    quiet: bool,
}

/// Report format
#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Structured JSON document
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(&cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(exit_code(e.kind()));
    }
}

fn run(cli: &Cli) -> sheetscan::Result<()> {
    let pb = (!cli.quiet).then(|| create_spinner("Analyzing workbook..."));

    let options = AnalyzeOptions::new()
        .with_preview(
            PreviewLimits::new()
                .with_max_columns(cli.max_columns)
                .with_sample_rows(cli.sample_rows),
        )
        .with_workers(cli.jobs);

    let result = sheetscan::analyze_file_with(&cli.input, &options);
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }
    let report = result?;

    let content = match cli.format {
        OutputFormat::Text => sheetscan::render::to_text(&report, &RenderOptions::default()),
        OutputFormat::Json => {
            let format = if cli.compact {
                JsonFormat::Compact
            } else {
                JsonFormat::Pretty
            };
            sheetscan::render::to_json(&report, format)?
        }
    };

    write_output(cli.output.as_ref(), &content)?;

    if let Some(path) = &cli.output {
        println!(
            "{} Analyzed {} sheet(s): {}",
            "✓".green().bold(),
            report.sheet_count,
            path.display()
        );
    }
    if !cli.quiet {
        report_partial_success(&report);
    }

    Ok(())
}

/// Note unreadable sheets and cell warnings on stderr.
fn report_partial_success(report: &AnalysisReport) {
    let unreadable = report.unreadable_sheets();
    let warnings = report.warnings().count();
    if unreadable.is_empty() && warnings == 0 {
        return;
    }

    let mut parts = Vec::new();
    if !unreadable.is_empty() {
        parts.push(format!(
            "{} unreadable sheet(s): {}",
            unreadable.len(),
            unreadable.join(", ")
        ));
    }
    if warnings > 0 {
        parts.push(format!("{warnings} cell warning(s)"));
    }
    eprintln!("{}: {}", "Warning".yellow().bold(), parts.join("; "));
}

/// Distinct process exit code per error kind.
fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::NotFound => 2,
        ErrorKind::InvalidArchive => 3,
        ErrorKind::MissingManifestEntry => 4,
        ErrorKind::MalformedXml => 5,
        ErrorKind::UnsupportedSchema => 6,
        ErrorKind::Cancelled => 7,
        _ => 1,
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn write_output(path: Option<&PathBuf>, content: &str) -> io::Result<()> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", content)?;
        }
    }
    Ok(())
}
