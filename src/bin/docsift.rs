//! CLI binary for docsift.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConvertConfig` / `ExtractConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docsift::{
    convert_dir, extract_dir, process_dir, BatchOptions, BatchProgress, ConvertConfig, Converter,
    ExtractConfig, Extractor, FileStatus, Schema,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar for the whole batch, one log line per file.
struct CliBatchProgress {
    bar: ProgressBar,
}

impl CliBatchProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:40.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Arc::new(Self { bar })
    }
}

impl BatchProgress for CliBatchProgress {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_file_start(&self, path: &Path, _index: usize, _total: usize) {
        self.bar.set_message(path.display().to_string());
    }

    fn on_file_done(&self, path: &Path, status: &FileStatus) {
        let line = match status {
            FileStatus::Converted | FileStatus::Extracted => {
                format!("  {} {}  {}", green("✓"), path.display(), dim(&status.to_string()))
            }
            FileStatus::Skipped => {
                format!("  {} {}  {}", dim("·"), path.display(), dim("skipped"))
            }
            FileStatus::Error(msg) => {
                format!("  {} {}  {}", red("✗"), path.display(), red(&clip(msg, 99)))
            }
        };
        self.bar.println(line);
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, produced: usize, skipped: usize, errored: usize) {
        self.bar.finish_and_clear();
        let mark = if errored == 0 { green("✔") } else { red("✘") };
        eprintln!(
            "{mark} {} produced, {} skipped, {} errored",
            bold(&produced.to_string()),
            skipped,
            errored
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one document to Markdown (stdout)
  docsift convert report.docx

  # Convert and write the .md sidecar beside the source
  docsift convert scan.pdf --save

  # Extract fields from a markdown file using a schema definition
  docsift extract report.md --schema fields.json

  # Cross-document extraction: one combined call over several files
  docsift extract a.md b.md c.md --schema fields.json

  # Convert every PDF and image under a directory (skipping existing .md)
  docsift batch-convert ./applications

  # Extract from every .md under a directory
  docsift batch-extract ./applications --schema fields.json

  # Full pipeline: convert, then extract
  docsift run ./applications --schema fields.json

SCHEMA DEFINITION FORMAT (flat JSON object, field name → description):
  {
    "project_id": "Applicant ID in format 'ORD2000111'. Location: top right",
    "funding_requested": "Total funding amount requested. Location: budget section"
  }

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY     API key for the extraction model
  DOCSIFT_MODEL      Override the extraction model ID
  DOCSIFT_RENDER_URL Base URL of the PDF/image rendering service
  RUST_LOG           Tracing filter (e.g. docsift=debug)
"#;

/// Convert documents to Markdown and extract evidence-tracked structured data.
#[derive(Parser, Debug)]
#[command(
    name = "docsift",
    version,
    about = "Convert documents to Markdown and extract evidence-tracked structured data",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCSIFT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCSIFT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one document to Markdown.
    Convert {
        /// Document to convert.
        input: PathBuf,

        /// Write the `<stem>.md` sidecar instead of printing to stdout.
        #[arg(long)]
        save: bool,

        #[command(flatten)]
        convert: ConvertArgs,
    },

    /// Extract structured data from one or more Markdown files.
    Extract {
        /// Markdown files; several inputs become one combined extraction.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Schema definition JSON (flat field → description object).
        #[arg(long)]
        schema: PathBuf,

        /// Do not write the `<stem>.json` sidecar.
        #[arg(long)]
        no_save: bool,

        #[command(flatten)]
        extract: ExtractArgs,
    },

    /// Convert every matching document under a directory.
    BatchConvert {
        directory: PathBuf,

        /// Source extensions without dots, e.g. --types pdf,docx,html.
        /// Default: the render-only set (pdf + images).
        #[arg(long, value_delimiter = ',')]
        types: Option<Vec<String>>,

        #[command(flatten)]
        batch: BatchArgs,

        #[command(flatten)]
        convert: ConvertArgs,
    },

    /// Extract from every Markdown file under a directory.
    BatchExtract {
        directory: PathBuf,

        /// Schema definition JSON.
        #[arg(long)]
        schema: PathBuf,

        #[command(flatten)]
        batch: BatchArgs,

        #[command(flatten)]
        extract: ExtractArgs,
    },

    /// Full pipeline over a directory: convert, then extract.
    Run {
        directory: PathBuf,

        /// Schema definition JSON.
        #[arg(long)]
        schema: PathBuf,

        /// Source extensions for the conversion stage.
        #[arg(long, value_delimiter = ',')]
        types: Option<Vec<String>>,

        #[command(flatten)]
        batch: BatchArgs,

        #[command(flatten)]
        convert: ConvertArgs,

        #[command(flatten)]
        extract: ExtractArgs,
    },
}

#[derive(clap::Args, Debug)]
struct ConvertArgs {
    /// Force the rendering backend for every input.
    #[arg(long)]
    force_render: bool,

    /// Base URL of the rendering service.
    #[arg(long, env = "DOCSIFT_RENDER_URL", default_value = "http://localhost:8765")]
    render_url: String,

    /// Pandoc executable.
    #[arg(long, env = "DOCSIFT_PANDOC", default_value = "pandoc")]
    pandoc: String,
}

#[derive(clap::Args, Debug)]
struct ExtractArgs {
    /// Extraction model ID.
    #[arg(long, env = "DOCSIFT_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// Base URL of an OpenAI-compatible API.
    #[arg(long, env = "DOCSIFT_BASE_URL", default_value = "https://api.openai.com/v1")]
    base_url: String,

    /// Retry budget per extraction call.
    #[arg(long, default_value_t = 2)]
    max_retries: u32,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 120)]
    api_timeout: u64,
}

#[derive(clap::Args, Debug)]
struct BatchArgs {
    /// Reprocess files even when the target sidecar already exists.
    #[arg(long)]
    no_skip_existing: bool,

    /// Do not recurse into subdirectories.
    #[arg(long)]
    no_recursive: bool,

    /// Disable the progress bar.
    #[arg(long, env = "DOCSIFT_NO_PROGRESS")]
    no_progress: bool,
}

impl ConvertArgs {
    fn into_converter(self) -> Result<Converter> {
        let config = ConvertConfig::builder()
            .force_render(self.force_render)
            .render_url(self.render_url)
            .pandoc_path(self.pandoc)
            .build()?;
        Ok(Converter::from_config(&config)?)
    }
}

impl ExtractArgs {
    fn into_extractor(self) -> Result<Extractor> {
        let config = ExtractConfig::builder()
            .model(self.model)
            .base_url(self.base_url)
            .max_retries(self.max_retries)
            .api_timeout_secs(self.api_timeout)
            .build()?;
        Ok(Extractor::from_config(config)?)
    }
}

impl BatchArgs {
    fn into_options(self, quiet: bool) -> BatchOptions {
        let mut options = BatchOptions::new()
            .skip_existing(!self.no_skip_existing)
            .recursive(!self.no_recursive);
        if !quiet && !self.no_progress {
            options = options.progress(CliBatchProgress::new());
        }
        options
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Convert {
            input,
            save,
            convert,
        } => {
            let converter = convert.into_converter()?;
            if save {
                let target = converter.convert_to_file(&input).await?;
                if !cli.quiet {
                    eprintln!("{} wrote {}", green("✔"), target.display());
                }
            } else {
                let markdown = converter.convert(&input).await?;
                print!("{markdown}");
            }
        }

        Command::Extract {
            inputs,
            schema,
            no_save,
            extract,
        } => {
            let schema = Schema::from_json_file(&schema, None)?;
            let extractor = extract.into_extractor()?;
            let record = if inputs.len() == 1 {
                extractor.extract_file(&inputs[0], &schema, !no_save).await?
            } else {
                extractor.extract_files(&inputs, &schema, !no_save).await?
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&record.to_sidecar_json())
                    .context("serialising extraction result")?
            );
        }

        Command::BatchConvert {
            directory,
            types,
            batch,
            convert,
        } => {
            let converter = convert.into_converter()?;
            let mut options = batch.into_options(cli.quiet);
            if let Some(types) = types {
                options = options.file_types(types);
            }
            let report = convert_dir(&converter, &directory, &options).await?;
            print_report(&report, cli.quiet);
        }

        Command::BatchExtract {
            directory,
            schema,
            batch,
            extract,
        } => {
            let schema = Schema::from_json_file(&schema, None)?;
            let extractor = extract.into_extractor()?;
            let options = batch.into_options(cli.quiet);
            let report = extract_dir(&extractor, &directory, &schema, &options).await?;
            print_report(&report, cli.quiet);
        }

        Command::Run {
            directory,
            schema,
            types,
            batch,
            convert,
            extract,
        } => {
            let schema = Schema::from_json_file(&schema, None)?;
            let converter = convert.into_converter()?;
            let extractor = extract.into_extractor()?;
            let mut options = batch.into_options(cli.quiet);
            if let Some(types) = types {
                options = options.file_types(types);
            }
            let (conversion, extraction) =
                process_dir(&converter, &extractor, &directory, &schema, &options).await?;
            if !cli.quiet {
                eprintln!("{} conversion: {conversion}", bold("stage 1"));
                eprintln!("{} extraction: {extraction}", bold("stage 2"));
            }
        }
    }

    Ok(())
}

/// Shorten `msg` to at most `max_chars` characters, appending an ellipsis.
/// Cuts on a char boundary so multibyte error text cannot panic the slice.
fn clip(msg: &str, max_chars: usize) -> String {
    match msg.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\u{2026}", &msg[..idx]),
        None => msg.to_string(),
    }
}

fn print_report(report: &docsift::BatchReport, quiet: bool) {
    if quiet {
        return;
    }
    for (path, status) in report.iter() {
        if let FileStatus::Error(_) = status {
            eprintln!("{} {}: {}", red("✗"), path, status);
        }
    }
    eprintln!("{report}");
}
