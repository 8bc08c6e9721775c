//! Hosted vision models.
//!
//! The pipeline needs one capability from the outside world: "transcribe
//! this image with this prompt". That is all [`VisionModel`] exposes. Tests substitute a deterministic stub; the
//! shipped implementations talk to Groq and Gemini over HTTPS.

mod gemini;
mod groq;

pub use gemini::GeminiVisionModel;
pub use groq::GroqVisionModel;

use crate::config::{ConversionConfig, Engine};
use crate::error::NotesError;
use crate::pipeline::encode::EncodedImage;
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Prompt and sampling parameters for one transcription call.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionRequest {
    /// System instruction describing the extraction behaviour.
    pub system_prompt: String,
    /// User-turn text sent alongside the image.
    pub instruction: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Text returned by the model plus reported token usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transcription {
    pub text: String,
    /// Prompt tokens reported by the endpoint (0 when not reported).
    pub input_tokens: u64,
    /// Completion tokens reported by the endpoint (0 when not reported).
    pub output_tokens: u64,
}

/// A vision-capable language model reached over the network.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Issue exactly one request and return the model's text.
    ///
    /// Implementations do not retry and do not judge whether the text is
    /// usable; blank answers are rejected by the pipeline.
    async fn transcribe(
        &self,
        image: &EncodedImage,
        request: &TranscriptionRequest,
    ) -> Result<Transcription, NotesError>;

    /// Engine name used in logs and errors.
    fn name(&self) -> &str;

    /// Model identifier sent to the endpoint.
    fn model(&self) -> &str;
}

/// Resolve the model client for a conversion.
///
/// A pre-built [`ConversionConfig::vision_model`] is used as-is. Otherwise
/// the configured engine is instantiated with the explicit API key; a
/// missing or blank key fails here, before any request is made.
pub fn create_vision_model(config: &ConversionConfig) -> Result<Arc<dyn VisionModel>, NotesError> {
    if let Some(ref model) = config.vision_model {
        return Ok(Arc::clone(model));
    }

    let api_key = config
        .api_key
        .clone()
        .filter(|key| !key.expose_secret().trim().is_empty())
        .ok_or_else(|| NotesError::MissingCredential {
            engine: config.engine.to_string(),
            env_var: config.engine.api_key_env().to_string(),
        })?;

    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| config.engine.default_base_url().to_string());
    let model = config.resolved_model().to_string();
    let client = http_client(config.api_timeout_secs, config.engine)?;

    let timeout = config.api_timeout_secs;
    Ok(match config.engine {
        Engine::Groq => Arc::new(
            GroqVisionModel::new(client, base_url, api_key, model).with_timeout_secs(timeout),
        ),
        Engine::Gemini => Arc::new(
            GeminiVisionModel::new(client, base_url, api_key, model).with_timeout_secs(timeout),
        ),
    })
}

fn http_client(timeout_secs: u64, engine: Engine) -> Result<reqwest::Client, NotesError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("notes2docx/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| NotesError::RequestFailed {
            engine: engine.to_string(),
            reason: format!("could not build HTTP client: {e}"),
        })
}

/// Map a transport-level failure.
pub(crate) fn send_error(engine: &str, timeout_secs: u64, e: &reqwest::Error) -> NotesError {
    if e.is_timeout() {
        NotesError::RequestTimeout {
            engine: engine.to_string(),
            secs: timeout_secs,
        }
    } else {
        NotesError::RequestFailed {
            engine: engine.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Map a non-success HTTP status and its body.
pub(crate) fn status_error(
    engine: &str,
    status: reqwest::StatusCode,
    retry_after: Option<u64>,
    body: String,
) -> NotesError {
    match status.as_u16() {
        401 | 403 => NotesError::AuthFailed {
            engine: engine.to_string(),
            detail: body,
        },
        429 => NotesError::RateLimited {
            engine: engine.to_string(),
            retry_after_secs: retry_after,
        },
        code => NotesError::ApiError {
            engine: engine.to_string(),
            status: code,
            message: body,
        },
    }
}

/// Seconds from a `Retry-After` header, when present and numeric.
pub(crate) fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
