//! Conversion entry points.
//!
//! Every entry point runs the same pipeline:
//!
//! ```text
//! credential check → intake → encode → transcribe → cleanup + map → build
//! ```
//!
//! The model client is resolved first, so a missing API key fails before
//! anything is read or downloaded. Any error ends the run; no partial
//! document is produced.

use crate::config::ConversionConfig;
use crate::error::NotesError;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::cleanup::clean_transcription;
use crate::pipeline::docx::DocxBuilder;
use crate::pipeline::encode::encode_image;
use crate::pipeline::input::{self, SourceImage};
use crate::pipeline::mapper::map_blocks;
use crate::pipeline::transcribe::transcribe_image;
use crate::progress::{ProgressCallback, Stage};
use crate::provider::{create_vision_model, VisionModel};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Convert an image file or URL into a Word document.
///
/// # Arguments
/// * `input`  — local path or HTTP/HTTPS URL of a PNG or JPEG
/// * `config` — conversion configuration
///
/// # Example
/// ```rust,no_run
/// use notes2docx::{convert, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConversionConfig::builder()
///     .api_key(std::env::var("GROQ_API_KEY")?)
///     .build()?;
/// let output = convert("notes.jpg", &config).await?;
/// std::fs::write("notes.docx", &output.docx)?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// Configuration errors come first (no I/O has happened yet), then input,
/// request and document errors in pipeline order. See [`NotesError::class`].
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, NotesError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    let model = create_vision_model(config)?;
    let tracker = Tracker::new(config.progress_callback.as_ref());

    let started = tracker.start(Stage::Intake);
    let source = tracker.finish(
        Stage::Intake,
        started,
        input::resolve_input(input_str, config.download_timeout_secs).await,
    )?;

    run(model.as_ref(), source, config, &tracker, total_start).await
}

/// Convert image bytes held in memory.
///
/// `name` is only used in messages and logs.
pub async fn convert_from_bytes(
    bytes: impl Into<Vec<u8>>,
    name: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, NotesError> {
    let total_start = Instant::now();
    let model = create_vision_model(config)?;
    let tracker = Tracker::new(config.progress_callback.as_ref());

    let started = tracker.start(Stage::Intake);
    let source = tracker.finish(
        Stage::Intake,
        started,
        SourceImage::from_bytes(bytes.into(), name),
    )?;

    run(model.as_ref(), source, config, &tracker, total_start).await
}

/// Convert an already validated [`SourceImage`].
pub async fn convert_image(
    source: SourceImage,
    config: &ConversionConfig,
) -> Result<ConversionOutput, NotesError> {
    let total_start = Instant::now();
    let model = create_vision_model(config)?;
    let tracker = Tracker::new(config.progress_callback.as_ref());
    run(model.as_ref(), source, config, &tracker, total_start).await
}

/// Convert and write the document to `output_path`.
///
/// The file is written to `<output>.docx.tmp` and renamed into place, so the
/// target either holds a complete document or is left untouched.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, NotesError> {
    let output = convert(input_str, config).await?;
    let path = output_path.as_ref();
    write_atomic(path, &output.docx).await?;
    info!("Wrote {} ({} bytes)", path.display(), output.docx.len());
    Ok(output)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally; do not call it from
/// inside an async context.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, NotesError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| NotesError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(
    model: &dyn VisionModel,
    source: SourceImage,
    config: &ConversionConfig,
    tracker: &Tracker<'_>,
    total_start: Instant,
) -> Result<ConversionOutput, NotesError> {
    info!(
        "Image '{}': {:?} {}x{}, {} bytes",
        source.name(),
        source.format(),
        source.width(),
        source.height(),
        source.bytes().len()
    );

    // ── Encode ───────────────────────────────────────────────────────────
    let started = tracker.start(Stage::Encode);
    let encoded = tracker.finish(
        Stage::Encode,
        started,
        encode_image(&source, config.max_dimension, config.max_encoded_bytes),
    )?;

    // ── Transcribe ───────────────────────────────────────────────────────
    let started = tracker.start(Stage::Transcribe);
    let transcription = tracker.finish(
        Stage::Transcribe,
        started,
        transcribe_image(model, &encoded, config).await,
    )?;
    let transcribe_duration_ms = started.elapsed().as_millis() as u64;

    // ── Cleanup + map ────────────────────────────────────────────────────
    let started = tracker.start(Stage::Map);
    let cleaned = clean_transcription(&transcription.text);
    let mapped = if cleaned.trim().is_empty() {
        Err(NotesError::EmptyResponse {
            engine: model.name().to_string(),
        })
    } else {
        Ok(map_blocks(&cleaned, &config.mapper_policy))
    };
    let blocks = tracker.finish(Stage::Map, started, mapped)?;
    debug!(
        "Mapped {} lines into {} blocks",
        cleaned.lines().count(),
        blocks.len()
    );

    // ── Build ────────────────────────────────────────────────────────────
    let started = tracker.start(Stage::Build);
    let mut builder = DocxBuilder::new();
    if let Some(ref title) = config.document.title {
        builder = builder.title(title);
    }
    if config.document.engine_line {
        builder = builder.engine_line(model.name());
    }
    if config.document.embed_reference_image {
        builder = builder.reference_image(&source);
    }
    let docx = tracker.finish(Stage::Build, started, builder.build(&blocks))?;

    let stats = ConversionStats {
        engine: model.name().to_string(),
        model: model.model().to_string(),
        image_width: source.width(),
        image_height: source.height(),
        sent_width: encoded.width,
        sent_height: encoded.height,
        input_tokens: transcription.input_tokens,
        output_tokens: transcription.output_tokens,
        block_count: blocks.len(),
        docx_bytes: docx.len(),
        transcribe_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {} blocks, {} bytes, {}ms total",
        stats.block_count, stats.docx_bytes, stats.total_duration_ms
    );
    if let Some(cb) = tracker.callback {
        cb.on_conversion_complete(blocks.len());
    }

    Ok(ConversionOutput {
        transcription: cleaned,
        blocks,
        docx,
        stats,
    })
}

/// Forwards stage boundaries to the optional progress callback.
struct Tracker<'a> {
    callback: Option<&'a ProgressCallback>,
}

impl<'a> Tracker<'a> {
    fn new(callback: Option<&'a ProgressCallback>) -> Self {
        Self { callback }
    }

    fn start(&self, stage: Stage) -> Instant {
        debug!("Stage start: {}", stage.label());
        if let Some(cb) = self.callback {
            cb.on_stage_start(stage);
        }
        Instant::now()
    }

    fn finish<T>(
        &self,
        stage: Stage,
        started: Instant,
        result: Result<T, NotesError>,
    ) -> Result<T, NotesError> {
        if let Some(cb) = self.callback {
            match &result {
                Ok(_) => cb.on_stage_complete(stage, started.elapsed().as_millis() as u64),
                Err(e) => cb.on_stage_error(stage, &e.to_string()),
            }
        }
        result
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), NotesError> {
    let write_err = |e| NotesError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("docx.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}
