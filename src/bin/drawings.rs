//! CLI binary for edgequake-drawings.
//!
//! Maps CLI flags to `AnalyzerConfig`, drives the controller tick by tick
//! and renders every `TickOutcome`: results on stdout, banners on stderr,
//! or one JSON object per tick with `--json`.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_drawings::run::resolve_provider;
use edgequake_drawings::{
    inspect, open_upload, AnalysisProgressCallback, AnalysisResult, AnalyzerConfig, Banner,
    Controller, DrawingLabel, Phase, ProgressCallback, SessionState, TickOutcome, VisionAnalyzer,
    DRAWING_CAP,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while extracting, then a bar over
/// the capped batch with one log line per drawing.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<DrawingLabel, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER_TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Extracting drawings…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, cap: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:30.green/238}] {pos}/{len} drawings  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER_TICKS);

        self.bar.set_length(cap as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Analysing");
    }

    fn elapsed(&self, label: DrawingLabel) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&label))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_extraction_complete(&self, total: usize, cap: usize) {
        if cap == 0 {
            self.bar.finish_and_clear();
            return;
        }
        self.activate_bar(cap);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Analysing {cap} of {total} drawings…"))
        ));
    }

    fn on_drawing_start(&self, index: usize, _cap: usize, label: DrawingLabel) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(label, Instant::now());
        }
        self.bar.set_position(index as u64);
        self.bar.set_message(label.to_string());
    }

    fn on_drawing_complete(&self, index: usize, cap: usize, label: DrawingLabel, analysis_len: usize) {
        let secs = self.elapsed(label);
        self.bar.println(format!(
            "  {} {:>2}/{:<2} {:<24} {}  {}",
            green("✓"),
            index + 1,
            cap,
            label.to_string(),
            dim(&format!("{analysis_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.set_position(index as u64 + 1);
    }

    fn on_drawing_error(&self, index: usize, cap: usize, label: DrawingLabel, error: String) {
        let secs = self.elapsed(label);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error
        };
        self.bar.println(format!(
            "  {} {:>2}/{:<2} {:<24} {}  {}",
            red("✗"),
            index + 1,
            cap,
            label.to_string(),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
    }

    fn on_batch_complete(&self, _analyzed: usize, _total: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse the first five drawings of a drawing set
  drawings assembly.pdf

  # Analyse a PDF straight from a URL
  drawings https://example.com/plans/site-layout.pdf

  # List the drawings without analysing them (no API key needed)
  drawings --inspect-only assembly.pdf

  # One JSON object per tick, for scripting
  drawings --json assembly.pdf > ticks.ndjson

  # Use a specific provider and model
  drawings --provider openai --model gpt-4.1 assembly.pdf

SESSION:
  At most 5 drawings are analysed per run, in document order (page by page,
  in the order each page stores its images). When a drawing fails, the run
  stops there and asks whether to retry it; answer "n" to end the session
  with the results so far.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default model gemini-2.0-flash)
  OPENAI_API_KEY          OpenAI API key (default model gpt-4.1-mini)
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override the log filter (e.g. edgequake_drawings=debug)
"#;

/// Analyse the engineering drawings embedded in a PDF with Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "drawings",
    version,
    about = "Analyse the engineering drawings embedded in a PDF with Vision LLMs",
    long_about = "Extract the raster drawings embedded in a PDF (local file or URL) and have a \
Vision Language Model describe each one: drawing type and purpose, dimensions, components, \
technical specifications and critical features. Supports Gemini, OpenAI, Anthropic, Ollama and \
any provider edgequake-llm knows.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// LLM model ID (e.g. gemini-2.0-flash, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set."
    )]
    provider: Option<String>,

    /// Max LLM output tokens per drawing.
    #[arg(long, env = "DRAWINGS_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DRAWINGS_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Per-drawing LLM call timeout in seconds.
    #[arg(long, env = "DRAWINGS_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DRAWINGS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print one JSON object per tick instead of text.
    #[arg(long, env = "DRAWINGS_JSON")]
    json: bool,

    /// List the drawings only, no analysis.
    #[arg(long)]
    inspect_only: bool,

    /// Never ask to retry a failed drawing; end the session instead.
    #[arg(long, env = "DRAWINGS_NO_PROMPT")]
    no_prompt: bool,

    /// Disable progress bar.
    #[arg(long, env = "DRAWINGS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DRAWINGS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, env = "DRAWINGS_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the per-drawing feedback, so INFO logs are
    // suppressed while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
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

    // ── Resolve input ────────────────────────────────────────────────────
    let upload = open_upload(&cli.input, cli.download_timeout)
        .await
        .context("Failed to open input")?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let extraction = inspect(&upload.bytes)
            .await
            .context("Failed to inspect PDF")?;
        let labels: Vec<DrawingLabel> = extraction.drawings.iter().map(|d| d.label()).collect();

        if cli.json {
            let value = serde_json::json!({
                "file": upload.name,
                "total": labels.len(),
                "labels": labels,
                "formats": extraction.drawings.iter().map(|d| d.format).collect::<Vec<_>>(),
                "warnings": extraction.warnings,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&value).context("Failed to serialize drawing list")?
            );
        } else {
            println!("File:      {}", upload.name);
            println!("Drawings:  {}", labels.len());
            for (i, record) in extraction.drawings.iter().enumerate() {
                let marker = if i < DRAWING_CAP { "*" } else { " " };
                println!(
                    "  {marker} {:<24} {:?}, {} bytes",
                    record.label().to_string(),
                    record.format,
                    record.image_bytes.len()
                );
            }
            for warning in &extraction.warnings {
                eprintln!("{} {}", yellow("⚠"), warning);
            }
            if labels.len() > DRAWING_CAP {
                println!("(* = analysed in a session; the first {DRAWING_CAP} drawings)");
            }
        }
        return Ok(());
    }

    // ── Build config + controller ────────────────────────────────────────
    let progress = if show_progress {
        Some(CliProgressCallback::new())
    } else {
        None
    };
    let config = build_config(
        &cli,
        progress.clone().map(|cb| cb as ProgressCallback),
    )?;

    let provider = resolve_provider(&config).context("No LLM provider available")?;
    let controller = Controller::new(VisionAnalyzer::new(provider, &config))
        .with_progress(config.progress_callback.clone());

    // ── Drive the session ────────────────────────────────────────────────
    let mut presenter = Presenter {
        json: cli.json,
        quiet: cli.quiet,
        bar: progress.as_ref().map(|cb| cb.bar.clone()),
        shown: 0,
    };
    let may_prompt = !cli.no_prompt && !cli.json && io::stdin().is_terminal();

    let mut state = SessionState::new();
    let mut outcome = match controller.extract(&mut state, &upload.bytes).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(cb) = &progress {
                cb.bar.finish_and_clear();
            }
            return Err(e).context(format!("Failed to extract drawings from {}", upload.name));
        }
    };

    loop {
        presenter.render(&outcome)?;

        if outcome.should_continue() {
            outcome = controller.tick(&mut state, &upload.bytes).await;
            continue;
        }

        let retry = match state.next_drawing() {
            Some(next) if may_prompt && state.phase() == Phase::Analyzing => {
                presenter.suspend(|| ask_retry(next.label()))?
            }
            _ => false,
        };
        if !retry {
            break;
        }
        outcome = controller.tick(&mut state, &upload.bytes).await;
    }

    if let Some(cb) = &progress {
        cb.bar.finish_and_clear();
    }
    if !cli.quiet && !cli.json {
        eprintln!(
            "{}",
            dim(&format!(
                "{}/{} drawings analysed ({} found)",
                state.cursor(),
                state.cap(),
                state.total()
            ))
        );
    }

    // A declined retry is a normal end: the error banner was already shown.
    Ok(())
}

/// Map CLI args to `AnalyzerConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalyzerConfig> {
    let mut builder = AnalyzerConfig::builder()
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Ask on the terminal whether to retry the failed drawing. Default: yes.
fn ask_retry(label: DrawingLabel) -> Result<bool> {
    let mut stderr = io::stderr();
    write!(stderr, "{} Retry {}? [Y/n] ", cyan("?"), bold(&label.to_string()))
        .context("Failed to write prompt")?;
    stderr.flush().ok();

    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("Failed to read answer")?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer.is_empty() || answer == "y" || answer == "yes")
}

// ── Render surface ───────────────────────────────────────────────────────────

/// Renders tick outcomes. Each outcome carries every result so far; only
/// the ones not yet shown are printed.
struct Presenter {
    json: bool,
    quiet: bool,
    bar: Option<ProgressBar>,
    shown: usize,
}

impl Presenter {
    fn render(&mut self, outcome: &TickOutcome) -> Result<()> {
        if self.json {
            let line = serde_json::to_string(outcome).context("Failed to serialise tick")?;
            println!("{line}");
            return Ok(());
        }

        let fresh: Vec<&Arc<AnalysisResult>> = outcome.results.iter().skip(self.shown).collect();
        self.shown = outcome.results.len();

        self.suspend(|| -> Result<()> {
            if let Some(summary) = &outcome.summary {
                if !self.quiet && !summary.labels.is_empty() {
                    eprintln!("{}", bold("Drawings in this document:"));
                    for (i, label) in summary.labels.iter().enumerate() {
                        eprintln!("  {:>3}. {}", i + 1, label);
                    }
                }
            }

            let stdout = io::stdout();
            let mut handle = stdout.lock();
            for result in fresh {
                write_result(&mut handle, result).context("Failed to write to stdout")?;
            }
            drop(handle);

            for banner in &outcome.banners {
                if self.quiet && !banner.is_error() {
                    continue;
                }
                eprintln!("{}", format_banner(banner));
            }
            Ok(())
        })
    }

    /// Run `f` with the progress bar hidden so its output is not torn.
    fn suspend<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.bar {
            Some(bar) => bar.suspend(f),
            None => f(),
        }
    }
}

fn write_result(out: &mut impl Write, result: &AnalysisResult) -> io::Result<()> {
    writeln!(
        out,
        "## {}  ({}×{} px)",
        result.label(),
        result.image.width(),
        result.image.height()
    )?;
    writeln!(out)?;
    out.write_all(result.analysis.as_bytes())?;
    if !result.analysis.ends_with('\n') {
        writeln!(out)?;
    }
    writeln!(out)
}

fn format_banner(banner: &Banner) -> String {
    match banner {
        Banner::Success(m) => format!("{} {}", green("✔"), m),
        Banner::Info(m) => format!("{} {}", cyan("ℹ"), m),
        Banner::Warning(m) => format!("{} {}", yellow("⚠"), m),
        Banner::Error(m) => format!("{} {}", red("✘"), red(m)),
    }
}
