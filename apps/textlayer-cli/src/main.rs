//! textlayer binary
//!
//! `rebuild` turns a PDF into a text-only PDF with the same pages;
//! `merge` joins a directory of PDFs into one.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pdfjoin_core::{merge_directory, MergeOptions};
use textlayer_core::{OcrFailurePolicy, RebuildConfig, RebuildReport, ReconstructError, Rebuilder};

#[derive(Parser, Debug)]
#[command(name = "textlayer")]
#[command(version, about = "Rebuild searchable text-only PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log progress (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild a PDF's text layer into a new text-only PDF
    Rebuild(RebuildArgs),
    /// Merge every PDF in a directory, in natural file-name order
    Merge(MergeArgs),
}

#[derive(Args, Debug)]
struct RebuildArgs {
    #[arg(default_value = "input.pdf")]
    input: PathBuf,

    #[arg(default_value = "output_textonly.pdf")]
    output: PathBuf,

    /// Run OCR on pages without extractable text
    #[arg(long)]
    ocr: bool,

    /// Tesseract language specifier
    #[arg(long)]
    lang: Option<String>,

    /// Rasterization resolution for OCR
    #[arg(long)]
    dpi: Option<u32>,

    /// Drop OCR words below this confidence (0-100)
    #[arg(long)]
    min_confidence: Option<i32>,

    /// What an OCR failure on one page does to the run
    #[arg(long, value_enum)]
    on_ocr_error: Option<OnOcrError>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the output even when no text was found
    #[arg(long)]
    allow_empty: bool,

    /// Print the page report as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct MergeArgs {
    dir: PathBuf,

    #[arg(default_value = "merged.pdf")]
    output: PathBuf,

    /// Include PDFs in subdirectories
    #[arg(long)]
    recursive: bool,

    /// Do not add an outline entry per file
    #[arg(long)]
    no_bookmarks: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OnOcrError {
    Skip,
    Abort,
}

impl From<OnOcrError> for OcrFailurePolicy {
    fn from(value: OnOcrError) -> Self {
        match value {
            OnOcrError::Skip => OcrFailurePolicy::Skip,
            OnOcrError::Abort => OcrFailurePolicy::Abort,
        }
    }
}

impl RebuildArgs {
    /// Configuration file (or defaults) with command-line overrides applied
    fn to_config(&self) -> Result<RebuildConfig> {
        let mut config = match &self.config {
            Some(path) => RebuildConfig::from_file(path)?,
            None => RebuildConfig::default(),
        };
        if self.ocr {
            config.ocr.enabled = true;
        }
        if let Some(lang) = &self.lang {
            config.ocr.language = lang.clone();
        }
        if let Some(dpi) = self.dpi {
            config.ocr.dpi = dpi;
        }
        if let Some(min_confidence) = self.min_confidence {
            config.ocr.min_confidence = min_confidence;
        }
        if let Some(policy) = self.on_ocr_error {
            config.ocr.on_failure = policy.into();
        }
        if self.allow_empty {
            config.output.allow_empty = true;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match &cli.command {
        Command::Rebuild(args) => rebuild(args),
        Command::Merge(args) => merge(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[error] {:#}", e);
            if let Some(ReconstructError::NothingExtracted { .. }) = e.downcast_ref() {
                eprintln!("{}", EMPTY_HINT);
            }
            ExitCode::FAILURE
        }
    }
}

const EMPTY_HINT: &str = "These pages have no usable text layer (no ToUnicode map, \
outlined glyphs or a pure image). Try --ocr, or adjust --lang / --dpi.";

fn rebuild(args: &RebuildArgs) -> Result<()> {
    let config = args.to_config()?;
    let report = Rebuilder::new(config)
        .rebuild_file(&args.input, &args.output)
        .with_context(|| format!("rebuilding {}", args.input.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    print_rebuild_report(&report, args);
    Ok(())
}

fn print_rebuild_report(report: &RebuildReport, args: &RebuildArgs) {
    for page in &report.pages {
        if let Some(error) = &page.ocr_error {
            eprintln!("[WARN] page {}: {}", page.number, error);
        }
    }
    if !report.empty_pages.is_empty() {
        eprintln!(
            "[WARN] no text on {} page(s): {}",
            report.empty_pages.len(),
            report.empty_pages
        );
        eprintln!("{}", EMPTY_HINT);
    }
    if args.json {
        return;
    }
    let output = report.output.as_ref().unwrap_or(&args.output);
    println!(
        "[ok] wrote {} ({} pages, {} chars)",
        output.display(),
        report.pages.len(),
        report.total_chars
    );
}

fn merge(args: &MergeArgs) -> Result<()> {
    let options = MergeOptions {
        recursive: args.recursive,
        bookmarks: !args.no_bookmarks,
    };
    let report = merge_directory(&args.dir, &args.output, &options)?;

    for file in &report.added {
        println!("[add] {} (+{} pages)", file.stem, file.pages);
    }
    for file in &report.skipped {
        println!("[skip] {}: {}", file.name, file.reason);
    }
    println!("[ok] Wrote: {}", report.output.display());
    Ok(())
}
