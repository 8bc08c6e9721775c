//! Groq's OpenAI-compatible chat completions endpoint.

use super::{retry_after, send_error, status_error, Transcription, TranscriptionRequest, VisionModel};
use crate::error::NotesError;
use crate::pipeline::encode::EncodedImage;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const ENGINE: &str = "groq";

/// Vision model served by Groq (`POST {base_url}/chat/completions`).
pub struct GroqVisionModel {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    timeout_secs: u64,
}

impl GroqVisionModel {
    pub fn new(client: Client, base_url: String, api_key: SecretString, model: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            timeout_secs: 60,
        }
    }

    /// Timeout reported in [`NotesError::RequestTimeout`]; the client
    /// itself enforces it.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_completion_tokens: usize,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[async_trait]
impl VisionModel for GroqVisionModel {
    async fn transcribe(
        &self,
        image: &EncodedImage,
        request: &TranscriptionRequest,
    ) -> Result<Transcription, NotesError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(&request.system_prompt),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: &request.instruction,
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image.data_uri(),
                            },
                        },
                    ]),
                },
            ],
            temperature: request.temperature,
            max_completion_tokens: request.max_tokens,
        };

        debug!(
            "Groq request: model={}, image {}x{} ({} bytes base64)",
            self.model,
            image.width,
            image.height,
            image.data.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Groq request failed: {e}");
                send_error(ENGINE, self.timeout_secs, &e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry = retry_after(response.headers());
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Groq API error ({status}): {error_text}");
            return Err(status_error(ENGINE, status, retry, error_text));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                return send_error(ENGINE, self.timeout_secs, &e);
            }
            NotesError::InvalidResponse {
                engine: ENGINE.to_string(),
                detail: e.to_string(),
            }
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        let (input_tokens, output_tokens) = parsed
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        debug!("Groq usage: {input_tokens} in / {output_tokens} out");

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
