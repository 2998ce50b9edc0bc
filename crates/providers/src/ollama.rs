//! Native Ollama provider.
//!
//! Talks to Ollama's own API rather than its OpenAI shim:
//! - `POST /api/embeddings` with `{model, prompt}` returns `{embedding}`
//! - `POST /api/chat` streams newline-delimited JSON; each line carries a
//!   `message.content` fragment
//! - `GET /api/tags` is used as the health check

use crate::http::{build_client, check_status, transport_error};
use async_trait::async_trait;
use rolerag_core::error::ProviderError;
use rolerag_core::message::{Message, Role};
use rolerag_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// A provider backed by a local (or remote) Ollama server.
pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: Option<&str>, timeout_secs: u64) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: base_url
                .unwrap_or(DEFAULT_OLLAMA_URL)
                .trim_end_matches('/')
                .to_string(),
            client: build_client(timeout_secs)?,
        })
    }

    fn to_api_messages(messages: &[Message]) -> Vec<ChatMessage<'_>> {
        messages
            .iter()
            .map(|m| ChatMessage {
                role: match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                },
                content: &m.content,
            })
            .collect()
    }

    async fn embed_prompt(&self, model: &str, prompt: &str) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingsBody { model, prompt })
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status("ollama", response).await?;

        let parsed: EmbeddingsReply = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse embedding response: {e}")))?;

        parsed
            .embedding
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderError::MalformedResponse("Response carries no embedding".into()))
    }
}

/// Concatenate the `message.content` fragments of an NDJSON chat stream.
///
/// Blank lines are skipped. Any line that is not valid JSON fails the whole
/// response, as does an answer that is empty after trimming.
pub fn parse_ndjson_chat(body: &str) -> Result<(String, Option<String>), ProviderError> {
    let mut content = String::new();
    let mut model = None;

    for (line_no, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let chunk: ChatChunk = serde_json::from_str(line).map_err(|e| {
            ProviderError::MalformedResponse(format!("Invalid chat stream line {}: {e}", line_no + 1))
        })?;
        if let Some(error) = chunk.error {
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: error,
            });
        }
        if let Some(message) = chunk.message {
            content.push_str(&message.content);
        }
        if model.is_none() {
            model = chunk.model;
        }
    }

    let text = content.trim();
    if text.is_empty() {
        return Err(ProviderError::MalformedResponse("Model returned no content".into()));
    }
    Ok((text.to_string(), model))
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "stream": true,
            "options": { "temperature": request.temperature },
        });
        if let Some(max_tokens) = request.max_tokens {
            body["options"]["num_predict"] = serde_json::json!(max_tokens);
        }

        debug!(provider = "ollama", model = %request.model, "Sending chat request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status("ollama", response).await?;
        let raw = response.text().await.map_err(transport_error)?;
        trace!(bytes = raw.len(), "Received chat stream");

        let (text, model) = parse_ndjson_chat(&raw)?;
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model: model.unwrap_or(request.model),
        })
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        debug!(
            provider = "ollama",
            model = %request.model,
            count = request.inputs.len(),
            "Sending embedding request"
        );

        // The native endpoint takes one prompt per call.
        let mut embeddings = Vec::with_capacity(request.inputs.len());
        for input in &request.inputs {
            embeddings.push(self.embed_prompt(&request.model, input).await?);
        }

        Ok(EmbeddingResponse {
            embeddings,
            model: request.model,
        })
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;
        Ok(response.status().is_success())
    }
}

// --- Ollama API types ---

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct EmbeddingsBody<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsReply {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}
