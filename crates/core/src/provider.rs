//! Provider trait: the abstraction over model backends.
//!
//! A Provider turns text into embedding vectors and turns a conversation
//! into a completion. Both calls are the slow external I/O of a chat
//! request; neither is retried here.
//!
//! Implementations: Ollama native API, OpenAI-compatible endpoints.

use crate::error::ProviderError;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Configuration for a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "mistral", "gpt-4o-mini")
    pub model: String,

    /// The conversation messages, system framing first
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// An embedding request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// The model to use for embeddings (e.g., "nomic-embed-text").
    pub model: String,

    /// The texts to embed.
    pub inputs: Vec<String>,
}

/// An embedding response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The embedding vectors, one per input text, in input order.
    pub embeddings: Vec<Vec<f32>>,

    /// Which model was used.
    pub model: String,
}

/// The core Provider trait.
///
/// The pipeline calls `embed()` for the query and `complete()` for the
/// answer without knowing which backend serves them.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "ollama").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    ///
    /// Implementations must return `MalformedResponse` rather than an empty
    /// message when the backend produced no content.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Generate embeddings for the given texts.
    async fn embed(&self, request: EmbeddingRequest) -> std::result::Result<EmbeddingResponse, ProviderError>;

    /// Can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

/// Embed a single text, checking the provider returned exactly one vector.
pub async fn embed_one(
    provider: &dyn Provider,
    model: &str,
    text: &str,
) -> std::result::Result<Vec<f32>, ProviderError> {
    let response = provider
        .embed(EmbeddingRequest {
            model: model.to_string(),
            inputs: vec![text.to_string()],
        })
        .await?;

    let vector = response
        .embeddings
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse("No embedding in response".into()))?;

    if vector.is_empty() {
        return Err(ProviderError::MalformedResponse("Empty embedding vector".into()));
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedder {
        vectors: Vec<Vec<f32>>,
    }

    #[async_trait]
    impl Provider for FixedEmbedder {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("completion".into()))
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            Ok(EmbeddingResponse {
                embeddings: self.vectors.clone(),
                model: request.model,
            })
        }
    }

    #[test]
    fn provider_request_defaults() {
        let req: ProviderRequest =
            serde_json::from_str(r#"{"model":"mistral","messages":[]}"#).unwrap();
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.max_tokens.is_none());
    }

    #[tokio::test]
    async fn embed_one_returns_first_vector() {
        let provider = FixedEmbedder {
            vectors: vec![vec![0.1, 0.2]],
        };
        let v = embed_one(&provider, "nomic-embed-text", "leave policy").await.unwrap();
        assert_eq!(v, vec![0.1, 0.2]);
    }

    #[tokio::test]
    async fn embed_one_rejects_missing_vector() {
        let provider = FixedEmbedder { vectors: vec![] };
        let err = embed_one(&provider, "m", "x").await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));

        let provider = FixedEmbedder { vectors: vec![vec![]] };
        let err = embed_one(&provider, "m", "x").await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }
}
