//! Configuration types for image-to-docx conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The library never reads credentials
//! from the environment itself: the API key is passed in explicitly (the CLI
//! fills it from `GROQ_API_KEY` / `GEMINI_API_KEY`).

use crate::error::NotesError;
use crate::pipeline::mapper::MapperPolicy;
use crate::progress::ProgressCallback;
use crate::provider::VisionModel;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for one image-to-docx conversion.
///
/// # Example
/// ```rust
/// use notes2docx::{ConversionConfig, Engine, TranscriptionMode};
///
/// let config = ConversionConfig::builder()
///     .engine(Engine::Groq)
///     .api_key("gsk_test")
///     .mode(TranscriptionMode::Strict)
///     .build()
///     .unwrap();
/// assert_eq!(config.temperature, 0.2);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Hosted model family. Default: [`Engine::Groq`].
    pub engine: Engine,

    /// Model identifier. If None, uses [`Engine::default_model`].
    pub model: Option<String>,

    /// API key for the selected engine.
    pub api_key: Option<SecretString>,

    /// Override the endpoint base URL (proxies, tests).
    pub base_url: Option<String>,

    /// Pre-constructed model client. Takes precedence over `engine`/`api_key`.
    pub vision_model: Option<Arc<dyn VisionModel>>,

    /// Strict or relaxed transcription. Default: Relaxed.
    pub mode: TranscriptionMode,

    /// Custom system prompt. If None, uses the built-in chemistry prompt.
    pub system_prompt: Option<String>,

    /// Sampling temperature. Default: 0.2.
    ///
    /// Low values keep the model faithful to the handwriting.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4096.
    ///
    /// A dense notebook page rarely exceeds 2 000 output tokens; a lower cap
    /// truncates the transcription mid-line.
    pub max_tokens: usize,

    /// Timeout for the model call in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Longest image edge sent to the model, in pixels. Default: 2000.
    ///
    /// Phone photos are often 4000 px or more; the model sees no more detail
    /// above ~2000 px but the request body grows fourfold.
    pub max_dimension: u32,

    /// Upper bound on the encoded image size in bytes. Default: 4 MiB.
    pub max_encoded_bytes: usize,

    /// Decorations of the produced document.
    pub document: DocumentOptions,

    /// Line classification rules.
    pub mapper_policy: MapperPolicy,

    /// Stage progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            model: None,
            api_key: None,
            base_url: None,
            vision_model: None,
            mode: TranscriptionMode::default(),
            system_prompt: None,
            temperature: 0.2,
            max_tokens: 4096,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            max_dimension: 2000,
            max_encoded_bytes: 4 * 1024 * 1024,
            document: DocumentOptions::default(),
            mapper_policy: MapperPolicy::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("engine", &self.engine)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field(
                "vision_model",
                &self.vision_model.as_ref().map(|_| "<dyn VisionModel>"),
            )
            .field("mode", &self.mode)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_dimension", &self.max_dimension)
            .field("max_encoded_bytes", &self.max_encoded_bytes)
            .field("document", &self.document)
            .field("mapper_rules", &self.mapper_policy.rules().len())
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Model identifier that will be requested.
    pub fn resolved_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.engine.default_model())
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn engine(mut self, engine: Engine) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(SecretString::from(key.into()));
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn vision_model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.config.vision_model = Some(model);
        self
    }

    pub fn mode(mut self, mode: TranscriptionMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px;
        self
    }

    pub fn max_encoded_bytes(mut self, bytes: usize) -> Self {
        self.config.max_encoded_bytes = bytes;
        self
    }

    pub fn document(mut self, options: DocumentOptions) -> Self {
        self.config.document = options;
        self
    }

    pub fn mapper_policy(mut self, policy: MapperPolicy) -> Self {
        self.config.mapper_policy = policy;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// A missing API key is not a build error: it is reported as
    /// [`NotesError::MissingCredential`] when the conversion starts, so a
    /// config carrying only a `vision_model` stays valid.
    pub fn build(self) -> Result<ConversionConfig, NotesError> {
        let c = &self.config;
        if c.max_dimension < 64 {
            return Err(NotesError::InvalidConfig(format!(
                "max dimension must be ≥ 64 px, got {}",
                c.max_dimension
            )));
        }
        if c.max_tokens == 0 {
            return Err(NotesError::InvalidConfig("max tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(NotesError::InvalidConfig("API timeout must be ≥ 1s".into()));
        }
        if c.max_encoded_bytes == 0 {
            return Err(NotesError::InvalidConfig(
                "max encoded bytes must be ≥ 1".into(),
            ));
        }
        if let Some(ref url) = c.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(NotesError::InvalidConfig(format!(
                    "base URL must be http(s), got '{url}'"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Hosted vision model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Groq's OpenAI-compatible endpoint. (default)
    #[default]
    Groq,
    /// Google Gemini `generateContent`.
    Gemini,
}

impl Engine {
    /// Lower-case engine name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Groq => "groq",
            Engine::Gemini => "gemini",
        }
    }

    /// Model requested when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Engine::Groq => "meta-llama/llama-4-maverick-17b-128e-instruct",
            Engine::Gemini => "gemini-2.0-flash",
        }
    }

    /// Environment variable the CLI reads the key from.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Engine::Groq => "GROQ_API_KEY",
            Engine::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Endpoint base URL used when none is configured.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Engine::Groq => "https://api.groq.com/openai/v1",
            Engine::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How literally the model should transcribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionMode {
    /// Minor spelling fixes for standard chemistry terms. (default)
    #[default]
    Relaxed,
    /// Unclear text is kept exactly as written.
    Strict,
}

/// Decorations wrapped around the transcribed content.
///
/// The defaults produce the full report layout: centred title, engine line,
/// separators and the original photo at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOptions {
    /// Centred level-1 title. None omits it.
    pub title: Option<String>,
    /// Print "OCR Engine: <ENGINE>" under the title.
    pub engine_line: bool,
    /// Append the source image under "Original Image (Reference)".
    pub embed_reference_image: bool,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            title: Some(DEFAULT_DOCUMENT_TITLE.to_string()),
            engine_line: true,
            embed_reference_image: true,
        }
    }
}

impl DocumentOptions {
    /// Transcribed content only, no title or reference image.
    pub fn plain() -> Self {
        Self {
            title: None,
            engine_line: false,
            embed_reference_image: false,
        }
    }
}

/// Title placed at the top of every decorated document.
pub const DEFAULT_DOCUMENT_TITLE: &str = "Chemistry Notes - OCR Extraction";
