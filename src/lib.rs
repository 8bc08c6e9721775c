//! # notes2docx
//!
//! Turn a photo of handwritten chemistry notes into a structured Word
//! document using a hosted vision-language model.
//!
//! Handwriting recognition is delegated entirely to the model. This crate
//! does the plumbing around it: reading the image, one bounded API call,
//! cleaning the answer, classifying it into headings, paragraphs, list items
//! and diagram placeholders, and writing those as a `.docx` package.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image (path / URL / bytes)
//!  │
//!  ├─ 1. Input       sniff PNG/JPEG, read dimensions
//!  ├─ 2. Encode      downscale to max_dimension, base64 data URI
//!  ├─ 3. Transcribe  one call to Groq or Gemini, bounded by api_timeout_secs
//!  ├─ 4. Cleanup     fences, CRLF, invisible characters, image links
//!  ├─ 5. Map         ordered line rules → StructuralBlock
//!  └─ 6. Build       OOXML package (styles, numbering, reference photo)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notes2docx::{convert_to_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .api_key(std::env::var("GROQ_API_KEY")?)
//!         .build()?;
//!     let output = convert_to_file("notes.jpg", "notes.docx", &config).await?;
//!     eprintln!("{} blocks, {} output tokens",
//!         output.stats.block_count,
//!         output.stats.output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! The library never reads API keys from the environment; pass them to the
//! builder. The `notes2docx` binary reads `GROQ_API_KEY` / `GEMINI_API_KEY`.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `notes2docx` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! notes2docx = { version = "0.1", default-features = false }
//! ```
//!
//! ## Engines
//!
//! | Engine | Default model | Key |
//! |--------|---------------|-----|
//! | `groq` | `meta-llama/llama-4-maverick-17b-128e-instruct` | `GROQ_API_KEY` |
//! | `gemini` | `gemini-2.0-flash` | `GEMINI_API_KEY` |
//!
//! Any other backend can be plugged in by implementing [`VisionModel`] and
//! passing it via [`ConversionConfigBuilder::vision_model`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, DocumentOptions, Engine, TranscriptionMode,
    DEFAULT_DOCUMENT_TITLE,
};
pub use convert::{convert, convert_from_bytes, convert_image, convert_sync, convert_to_file};
pub use error::{ErrorClass, NotesError};
pub use output::{ConversionOutput, ConversionStats};
pub use pipeline::docx::{DocxBuilder, DOCX_MIME_TYPE};
pub use pipeline::input::{ImageFormat, SourceImage};
pub use pipeline::mapper::{
    map_blocks, to_plain_text, HeadingLevel, LineRule, MapperPolicy, RuleAction, StructuralBlock,
};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use provider::{
    create_vision_model, GeminiVisionModel, GroqVisionModel, Transcription, TranscriptionRequest,
    VisionModel,
};
