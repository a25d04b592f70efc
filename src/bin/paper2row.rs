//! CLI binary for paper2row.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use paper2row::{
    process, ExtractionField, MemorySink, PipelineConfig, PipelineProgressCallback,
    ProgressCallback, RecordSink, Stage,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar over the eight
/// extraction fields plus per-stage log lines using [indicatif]. Works
/// correctly when fields complete out-of-order (concurrent mode).
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Per-field wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<ExtractionField, Instant>>,
    /// Count of fields that degraded.
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set when the extract stage starts

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once the field total is known.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>2}/{len} fields  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        match stage {
            Stage::Ingest => {
                self.bar.set_prefix("Ingesting");
                self.bar.set_message("reading document text");
            }
            Stage::Extract => {}
            Stage::Store => {
                self.bar.set_prefix("Storing");
                self.bar.set_message("inserting row");
            }
        }
    }

    fn on_stage_complete(&self, stage: Stage) {
        self.bar
            .println(format!("{} {} stage complete", green("✓"), stage));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("{} {} stage failed: {}", red("✗"), stage, red(&msg)));
    }

    fn on_field_start(&self, field: ExtractionField, index: usize, total: usize) {
        if index == 1 {
            self.activate_bar(total);
        }
        self.start_times
            .lock()
            .unwrap()
            .insert(field, Instant::now());
        self.bar.set_message(field.to_string());
    }

    fn on_field_complete(&self, field: ExtractionField, _total: usize, value_len: usize) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&field)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} {:<16}  {:<10}  {}",
            green("✓"),
            field.to_string(),
            dim(&format!("{value_len:>5} chars")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_field_error(&self, field: ExtractionField, _total: usize, error: &str) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&field)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<16}  {}  {}",
            red("✗"),
            field.to_string(),
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _run_id: &str, all_stages_succeeded: bool) {
        let degraded = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if all_stages_succeeded && degraded == 0 {
            eprintln!("{} paper extracted and stored", green("✔"));
        } else if all_stages_succeeded {
            eprintln!(
                "{} paper stored with {} degraded field(s)",
                cyan("⚠"),
                bold(&degraded.to_string())
            );
        } else {
            eprintln!("{} run finished with stage failures", red("✘"));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a paper and store it in BigQuery
  paper2row paper.pdf --project my-proj --dataset papers --table extracted \
      --token "$(gcloud auth print-access-token)"

  # Dry run: extract only, print the record as JSON, store nothing
  paper2row paper.pdf --dry-run

  # Use a specific model
  paper2row --model gpt-4.1 --provider openai paper.pdf --dry-run

  # Concurrent field queries
  paper2row -c 4 paper.pdf --dry-run

  # Full machine-readable run report
  paper2row --json paper.pdf --dry-run > report.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  PAPER2ROW_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  PAPER2ROW_MODEL         Override model ID

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Extract:         paper2row paper.pdf --dry-run
"#;

/// Extract scientific-paper fields into an analytical table row.
#[derive(Parser, Debug)]
#[command(
    name = "paper2row",
    version,
    about = "Extract bibliographic and semantic fields from paper PDFs via LLM",
    long_about = "Extract title, authors, publication date, abstract, key findings, \
methodology, summary, and keywords from a scientific-paper PDF using a language model, \
and store the result as one row of a BigQuery table. Supports OpenAI, Anthropic, \
Google Gemini, and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: String,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "PAPER2ROW_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "PAPER2ROW_LLM_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// BigQuery project ID.
    #[arg(long, env = "PAPER2ROW_PROJECT")]
    project: Option<String>,

    /// BigQuery dataset ID.
    #[arg(long, env = "PAPER2ROW_DATASET")]
    dataset: Option<String>,

    /// BigQuery table ID.
    #[arg(long, env = "PAPER2ROW_TABLE")]
    table: Option<String>,

    /// BigQuery OAuth bearer token (e.g. from `gcloud auth print-access-token`).
    #[arg(long, env = "PAPER2ROW_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Number of concurrent field queries.
    #[arg(short, long, env = "PAPER2ROW_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Max LLM output tokens per field.
    #[arg(long, env = "PAPER2ROW_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PAPER2ROW_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Stop at the first failed stage instead of continuing with a
    /// degraded record.
    #[arg(long, env = "PAPER2ROW_FAIL_FAST")]
    fail_fast: bool,

    /// Extract only: collect the row in memory and print it, store nothing.
    #[arg(long)]
    dry_run: bool,

    /// Output the structured run report as JSON instead of a summary.
    #[arg(long, env = "PAPER2ROW_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PAPER2ROW_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAPER2ROW_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAPER2ROW_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let dry_run_sink = if cli.dry_run {
        Some(Arc::new(MemorySink::new()))
    } else {
        None
    };
    let config = build_config(&cli, progress_cb, dry_run_sink.clone())?;

    // ── Run pipeline ─────────────────────────────────────────────────────
    let output = process(&cli.input, &config)
        .await
        .context("Pipeline setup failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if let Some(record) = &output.record {
        // The record goes to stdout so it can be piped; progress and
        // summaries went to stderr.
        let json = serde_json::to_string_pretty(record).context("Failed to serialise record")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(json.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
    }

    // Summary (the callback already printed the final green/red tick).
    if !cli.quiet && !show_progress && !cli.json {
        eprintln!(
            "Run {} finished in {}ms ({} degraded field(s))",
            output.run_id, output.stats.total_duration_ms, output.stats.degraded_fields
        );
        for report in &output.stages {
            if !report.succeeded() {
                eprintln!("  {} stage failed", report.stage);
            }
        }
    }

    if !output.all_stages_succeeded() {
        std::process::exit(1);
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    dry_run_sink: Option<Arc<MemorySink>>,
) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .concurrency(cli.concurrency)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .continue_on_stage_failure(!cli.fail_fast);

    if let Some(model) = &cli.model {
        builder = builder.model(model);
    }
    if let Some(provider) = &cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(sink) = dry_run_sink {
        builder = builder.sink(sink as Arc<dyn RecordSink>);
    } else {
        let project = cli
            .project
            .clone()
            .context("--project is required (or use --dry-run)")?;
        let dataset = cli
            .dataset
            .clone()
            .context("--dataset is required (or use --dry-run)")?;
        let table = cli
            .table
            .clone()
            .context("--table is required (or use --dry-run)")?;
        let token = cli
            .token
            .clone()
            .context("--token is required (or use --dry-run)")?;
        builder = builder
            .project_id(project)
            .dataset_id(dataset)
            .table_id(table)
            .sink_token(token);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
