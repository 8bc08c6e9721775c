//! Google Gemini `generateContent` endpoint.

use super::{retry_after, send_error, status_error, Transcription, TranscriptionRequest, VisionModel};
use crate::error::NotesError;
use crate::pipeline::encode::EncodedImage;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const ENGINE: &str = "gemini";

/// Vision model served by Gemini
/// (`POST {base_url}/models/{model}:generateContent`).
pub struct GeminiVisionModel {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    timeout_secs: u64,
}

impl GeminiVisionModel {
    pub fn new(client: Client, base_url: String, api_key: SecretString, model: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            timeout_secs: 60,
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    Inline {
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'static str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl VisionModel for GeminiVisionModel {
    async fn transcribe(
        &self,
        image: &EncodedImage,
        request: &TranscriptionRequest,
    ) -> Result<Transcription, NotesError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: &request.system_prompt,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![
                    Part::Text {
                        text: &request.instruction,
                    },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: image.mime_type(),
                            data: &image.data,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        debug!(
            "Gemini request: model={}, image {}x{} ({} bytes base64)",
            self.model,
            image.width,
            image.height,
            image.data.len()
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini request failed: {e}");
                send_error(ENGINE, self.timeout_secs, &e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry = retry_after(response.headers());
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Gemini API error ({status}): {error_text}");
            // Gemini reports a bad key as 400 API_KEY_INVALID.
            if status.as_u16() == 400 && error_text.contains("API_KEY_INVALID") {
                return Err(NotesError::AuthFailed {
                    engine: ENGINE.to_string(),
                    detail: error_text,
                });
            }
            return Err(status_error(ENGINE, status, retry, error_text));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                return send_error(ENGINE, self.timeout_secs, &e);
            }
            NotesError::InvalidResponse {
                engine: ENGINE.to_string(),
                detail: e.to_string(),
            }
        })?;

        let text = parsed.text();
        let (input_tokens, output_tokens) = parsed
            .usage_metadata
            .map(|u| (u.prompt_token_count, u.candidates_token_count))
            .unwrap_or((0, 0));

        debug!("Gemini usage: {input_tokens} in / {output_tokens} out");

        Ok(Transcription {
            text,
            input_tokens,
            output_tokens,
        })
    }

    fn name(&self) -> &str {
        ENGINE
    }

    fn model(&self) -> &str {
        &self.model
    }
}
