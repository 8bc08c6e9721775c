//! CLI binary for notes2docx.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and reports the result.

use anyhow::{Context, Result};
use clap::Parser;
use notes2docx::{
    convert_to_file, ConversionConfig, ConversionProgressCallback, DocumentOptions, Engine,
    ProgressCallback, Stage, TranscriptionMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
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

/// Spinner showing the running stage, with one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(stage.label());
        self.bar.set_message(match stage {
            Stage::Transcribe => "waiting for the model…",
            _ => "",
        });
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<20} {}",
            green("✓"),
            stage.label(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        // First line only; the full message is printed by main.
        let first = error.lines().next().unwrap_or_default();
        self.bar.println(format!("  {} {:<20} {}", red("✗"), stage.label(), red(first)));
        self.bar.finish_and_clear();
    }

    // The summary line is printed by main.
    fn on_conversion_complete(&self, _block_count: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Photo of a notebook page, Groq (default engine)
  notes2docx page.jpg

  # Choose the output file
  notes2docx page.jpg -o redox.docx

  # Gemini, keep unclear words exactly as written
  notes2docx --engine gemini --mode strict page.png -o page.docx

  # Image from a URL, also keep the cleaned transcription
  notes2docx https://example.org/notes.png --markdown notes.md

  # Content only: no title, engine line or reference photo
  notes2docx --plain page.jpg

  # Machine-readable result (blocks + stats) on stdout
  notes2docx --json page.jpg > result.json

ENGINES:
  Engine   Default model                                   Key variable
  ──────   ──────────────────────────────────────────────  ──────────────
  groq     meta-llama/llama-4-maverick-17b-128e-instruct   GROQ_API_KEY
  gemini   gemini-2.0-flash                                GEMINI_API_KEY

ENVIRONMENT VARIABLES:
  GROQ_API_KEY            Groq API key
  GEMINI_API_KEY          Google Gemini API key
  NOTES2DOCX_*            Any flag, e.g. NOTES2DOCX_ENGINE=gemini
  RUST_LOG                Override log filter (e.g. notes2docx=debug)

SETUP:
  1. Set API key:     export GROQ_API_KEY=gsk_...
  2. Convert:         notes2docx page.jpg
"#;

/// Convert photos of handwritten chemistry notes into Word documents.
#[derive(Parser, Debug)]
#[command(
    name = "notes2docx",
    version,
    about = "Convert photos of handwritten chemistry notes into Word documents",
    long_about = "Send a PNG or JPEG photo of handwritten chemistry notes to a hosted vision \
model (Groq or Google Gemini), then turn the transcription into a .docx with headings, \
bullet lists and diagram placeholders. Formulas and equations are kept verbatim.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PNG/JPEG path or HTTP/HTTPS URL.
    input: String,

    /// Output .docx path.
    #[arg(
        short,
        long,
        env = "NOTES2DOCX_OUTPUT",
        default_value = "chemistry_notes_structured.docx"
    )]
    output: PathBuf,

    /// Hosted model family.
    #[arg(long, env = "NOTES2DOCX_ENGINE", value_enum, default_value = "groq")]
    engine: EngineArg,

    /// Model ID (defaults to the engine's model).
    #[arg(long, env = "NOTES2DOCX_MODEL")]
    model: Option<String>,

    /// strict: unclear text kept as written; relaxed: standard terms may be corrected.
    #[arg(long, env = "NOTES2DOCX_MODE", value_enum, default_value = "relaxed")]
    mode: ModeArg,

    /// Groq API key.
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    groq_api_key: Option<String>,

    /// Google Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Override the engine's endpoint base URL.
    #[arg(long, env = "NOTES2DOCX_BASE_URL")]
    base_url: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "NOTES2DOCX_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max output tokens for the transcription.
    #[arg(long, env = "NOTES2DOCX_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Model call timeout in seconds.
    #[arg(long, env = "NOTES2DOCX_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds (URL inputs).
    #[arg(long, env = "NOTES2DOCX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Longest image edge sent to the model, in pixels.
    #[arg(long, env = "NOTES2DOCX_MAX_DIMENSION", default_value_t = 2000,
          value_parser = clap::value_parser!(u32).range(64..=8192))]
    max_dimension: u32,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "NOTES2DOCX_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Do not append the original photo to the document.
    #[arg(long, env = "NOTES2DOCX_NO_REFERENCE_IMAGE")]
    no_reference_image: bool,

    /// Content only: no title, engine line or reference photo.
    #[arg(long, env = "NOTES2DOCX_PLAIN")]
    plain: bool,

    /// Also write the cleaned transcription to this file.
    #[arg(long, env = "NOTES2DOCX_MARKDOWN")]
    markdown: Option<PathBuf>,

    /// Print the result (blocks + stats) as JSON on stdout.
    #[arg(long, env = "NOTES2DOCX_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "NOTES2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "NOTES2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "NOTES2DOCX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    Groq,
    Gemini,
}

impl From<EngineArg> for Engine {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::Groq => Engine::Groq,
            EngineArg::Gemini => Engine::Gemini,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Relaxed,
    Strict,
}

impl From<ModeArg> for TranscriptionMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Relaxed => TranscriptionMode::Relaxed,
            ModeArg::Strict => TranscriptionMode::Strict,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO logs; --verbose always gets DEBUG.
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
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert_to_file(&cli.input, &cli.output, &config)
        .await
        .context("Conversion failed")?;

    if let Some(ref path) = cli.markdown {
        tokio::fs::write(path, format!("{}\n", output.transcription))
            .await
            .with_context(|| format!("Failed to write transcription to {}", path.display()))?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {} blocks  {}ms  →  {}",
            green("✔"),
            stats.block_count,
            stats.total_duration_ms,
            bold(&cli.output.display().to_string()),
        );
        eprintln!(
            "   {} ({})  {} tokens in  /  {} tokens out",
            stats.engine,
            stats.model,
            dim(&stats.input_tokens.to_string()),
            dim(&stats.output_tokens.to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let engine = Engine::from(cli.engine);

    let mut builder = ConversionConfig::builder()
        .engine(engine)
        .mode(cli.mode.into())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .max_dimension(cli.max_dimension)
        .document(document_options(cli));

    // A missing key is reported by the library as a configuration error.
    let key = match engine {
        Engine::Groq => cli.groq_api_key.as_deref(),
        Engine::Gemini => cli.gemini_api_key.as_deref(),
    };
    if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
        builder = builder.api_key(key.trim());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn document_options(cli: &Cli) -> DocumentOptions {
    if cli.plain {
        return DocumentOptions::plain();
    }
    DocumentOptions {
        embed_reference_image: !cli.no_reference_image,
        ..DocumentOptions::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn spinner_finishes_on_completion() {
        let cb = CliProgressCallback::new();
        cb.on_stage_start(Stage::Build);
        cb.on_conversion_complete(4);
        assert!(cb.bar.is_finished());
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["notes2docx", "page.jpg"]).unwrap();
        assert_eq!(cli.output, PathBuf::from("chemistry_notes_structured.docx"));
        assert!(matches!(cli.engine, EngineArg::Groq));
        assert_eq!(cli.max_dimension, 2000);
    }

    #[test]
    fn plain_disables_all_decorations() {
        let cli = Cli::try_parse_from(["notes2docx", "--plain", "page.jpg"]).unwrap();
        assert_eq!(document_options(&cli), DocumentOptions::plain());
    }

    #[test]
    fn no_reference_image_keeps_title() {
        let cli = Cli::try_parse_from(["notes2docx", "--no-reference-image", "page.jpg"]).unwrap();
        let opts = document_options(&cli);
        assert!(opts.title.is_some());
        assert!(!opts.embed_reference_image);
    }

    #[test]
    fn tiny_max_dimension_rejected() {
        assert!(Cli::try_parse_from(["notes2docx", "--max-dimension", "8", "page.jpg"]).is_err());
    }
}
