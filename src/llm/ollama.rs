use serde::{Deserialize, Serialize};

use super::provider::{ChatInput, ChatOutput, LlmError, LlmProvider, LlmResult};
use crate::http::{HttpClient, HttpResponseData};

const MAX_ERROR_BODY_CHARS: usize = 400;

/// Client for the `/api/chat` endpoint of a local Ollama runtime.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    http: HttpClient,
    model: String,
    base_url: String,
}

impl OllamaProvider {
    pub fn new(http: HttpClient, model: String, base_url: String) -> Self {
        Self {
            http,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn build_request<'a>(&'a self, input: &'a ChatInput, stream: bool) -> OllamaChatRequest<'a> {
        OllamaChatRequest {
            model: &self.model,
            messages: input
                .messages
                .iter()
                .map(|message| OllamaMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
            stream,
        }
    }
}

impl LlmProvider for OllamaProvider {
    async fn chat(&self, input: ChatInput) -> LlmResult<ChatOutput> {
        let payload = self.build_request(&input, false);
        let resp = self
            .http
            .post_json(&self.endpoint(), &payload)
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;
        ensure_success(&resp)?;

        let parsed = serde_json::from_str::<OllamaChatResponse>(&resp.body)
            .map_err(|err| LlmError::Parse(err.to_string()))?;
        if let Some(error) = parsed.error {
            return Err(LlmError::Runtime(error));
        }

        let text = parsed
            .message
            .map(|message| message.content.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(ChatOutput { text })
    }

    async fn chat_streaming<F>(&self, input: ChatInput, mut on_chunk: F) -> LlmResult<ChatOutput>
    where
        F: FnMut(&str) + Send,
    {
        let payload = self.build_request(&input, true);
        let mut text = String::new();
        let mut stream_error: Option<LlmError> = None;

        let resp = self
            .http
            .post_json_streaming(&self.endpoint(), &payload, |line: &str| {
                if stream_error.is_some() {
                    return;
                }
                match serde_json::from_str::<OllamaChatResponse>(line) {
                    Ok(OllamaChatResponse {
                        error: Some(error), ..
                    }) => stream_error = Some(LlmError::Runtime(error)),
                    Ok(OllamaChatResponse {
                        message: Some(message),
                        ..
                    }) => {
                        if !message.content.is_empty() {
                            text.push_str(&message.content);
                            on_chunk(&message.content);
                        }
                    }
                    Ok(_) => {}
                    Err(err) => stream_error = Some(LlmError::Parse(err.to_string())),
                }
            })
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;
        ensure_success(&resp)?;

        if let Some(err) = stream_error {
            return Err(err);
        }
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(ChatOutput { text })
    }
}

fn ensure_success(resp: &HttpResponseData) -> LlmResult<()> {
    if resp.is_success() {
        return Ok(());
    }

    // Ollama reports failures as `{"error": "..."}`; fall back to the raw body.
    let body = serde_json::from_str::<OllamaChatResponse>(&resp.body)
        .ok()
        .and_then(|parsed| parsed.error)
        .unwrap_or_else(|| resp.body.clone());
    Err(LlmError::HttpStatus {
        status: resp.status,
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaResponseMessage>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: String,
}
