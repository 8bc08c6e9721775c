//! Model interaction: build the request and run one bounded call.
//!
//! The prompt text lives in [`crate::prompts`] and the wire formats in
//! [`crate::provider`]. This stage owns the two rules that hold for every
//! engine: the call is bounded by `api_timeout_secs`, and a blank answer is
//! an error rather than an empty document.

use crate::config::ConversionConfig;
use crate::error::NotesError;
use crate::pipeline::encode::EncodedImage;
use crate::prompts::{system_prompt, USER_INSTRUCTION};
use crate::provider::{Transcription, TranscriptionRequest, VisionModel};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Build the prompt and sampling parameters from the config.
pub fn build_request(config: &ConversionConfig) -> TranscriptionRequest {
    TranscriptionRequest {
        system_prompt: system_prompt(config.system_prompt.as_deref(), config.mode),
        instruction: USER_INSTRUCTION.to_string(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

/// Send `image` to `model` once and return its transcription.
///
/// # Errors
/// * [`NotesError::RequestTimeout`] — no answer within `api_timeout_secs`
/// * [`NotesError::EmptyResponse`] — the answer contains no visible text
/// * anything the model client itself returns
pub async fn transcribe_image(
    model: &dyn VisionModel,
    image: &EncodedImage,
    config: &ConversionConfig,
) -> Result<Transcription, NotesError> {
    let request = build_request(config);
    let start = Instant::now();

    info!("Transcribing with {} ({})", model.name(), model.model());

    let result = timeout(
        Duration::from_secs(config.api_timeout_secs),
        model.transcribe(image, &request),
    )
    .await
    .map_err(|_| {
        warn!(
            "{}: no response within {}s",
            model.name(),
            config.api_timeout_secs
        );
        NotesError::RequestTimeout {
            engine: model.name().to_string(),
            secs: config.api_timeout_secs,
        }
    })??;

    debug!(
        "{}: {} chars, {} input tokens, {} output tokens, {:?}",
        model.name(),
        result.text.len(),
        result.input_tokens,
        result.output_tokens,
        start.elapsed()
    );

    if result.text.trim().is_empty() {
        return Err(NotesError::EmptyResponse {
            engine: model.name().to_string(),
        });
    }

    Ok(result)
}
