//! Offline re-embedding of snapshot files.
//!
//! Reads a JSON array of objects, embeds the text field of every record
//! that has one, and stores the result under `vector`. Records with an
//! empty or missing text field are left untouched.

use rolerag_core::error::{Error, KnowledgeError};
use rolerag_core::provider::{Provider, embed_one};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

/// How often progress is logged, in processed records.
const PROGRESS_EVERY: usize = 10;

/// Progress is logged every `PROGRESS_EVERY` records and after the last one.
fn is_progress_point(index: usize, total: usize) -> bool {
    let done = index + 1;
    done % PROGRESS_EVERY == 0 || done == total
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReembedSummary {
    pub embedded: usize,
    pub skipped: usize,
}

/// Embed `field` of every record in place.
pub async fn reembed_records(
    provider: &dyn Provider,
    model: &str,
    records: &mut [Value],
    field: &str,
) -> Result<ReembedSummary, Error> {
    let total = records.len();
    let mut summary = ReembedSummary::default();

    for (index, record) in records.iter_mut().enumerate() {
        let Value::Object(fields) = record else {
            return Err(KnowledgeError::InvalidRecord {
                source_name: "reembed".into(),
                index,
                reason: "record is not an object".into(),
            }
            .into());
        };

        match fields.get(field).and_then(Value::as_str) {
            Some(text) if !text.trim().is_empty() => {
                let vector = embed_one(provider, model, text).await?;
                fields.insert("vector".into(), Value::from(vector));
                summary.embedded += 1;
            }
            _ => {
                warn!(index, field, "Skipping record without text");
                summary.skipped += 1;
            }
        }

        if is_progress_point(index, total) {
            info!(done = index + 1, total, "Re-embedding progress");
        }
    }

    Ok(summary)
}

/// Re-embed `input` and write the result to `output`.
pub async fn reembed_file(
    provider: &dyn Provider,
    model: &str,
    input: &Path,
    output: &Path,
    field: &str,
) -> Result<ReembedSummary, Error> {
    let raw = tokio::fs::read_to_string(input)
        .await
        .map_err(|source| KnowledgeError::Io {
            path: input.to_path_buf(),
            source,
        })?;
    let mut records: Vec<Value> =
        serde_json::from_str(&raw).map_err(|e| KnowledgeError::Parse {
            source_name: input.display().to_string(),
            reason: e.to_string(),
        })?;

    let summary = reembed_records(provider, model, &mut records, field).await?;

    let rendered = serde_json::to_string_pretty(&records)?;
    tokio::fs::write(output, rendered)
        .await
        .map_err(|source| KnowledgeError::Io {
            path: output.to_path_buf(),
            source,
        })?;

    info!(
        embedded = summary.embedded,
        skipped = summary.skipped,
        output = %output.display(),
        "Re-embedding complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rolerag_core::error::ProviderError;
    use rolerag_core::provider::{EmbeddingRequest, EmbeddingResponse, ProviderRequest, ProviderResponse};
    use serde_json::json;

    /// Embeds a text as `[len, 1]`.
    struct LengthEmbedder;

    #[async_trait]
    impl Provider for LengthEmbedder {
        fn name(&self) -> &str {
            "length"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("embedding only".into()))
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            Ok(EmbeddingResponse {
                embeddings: request
                    .inputs
                    .iter()
                    .map(|t| vec![t.len() as f32, 1.0])
                    .collect(),
                model: request.model,
            })
        }
    }

    #[tokio::test]
    async fn embeds_only_records_with_text() {
        let mut records = vec![
            json!({"question": "abc", "answer": "x"}),
            json!({"question": "  "}),
            json!({"answer": "no question"}),
        ];

        let summary = reembed_records(&LengthEmbedder, "embed", &mut records, "question")
            .await
            .unwrap();

        assert_eq!(summary, ReembedSummary { embedded: 1, skipped: 2 });
        assert_eq!(records[0]["vector"], json!([3.0, 1.0]));
        assert_eq!(records[0]["answer"], "x");
        assert!(records[1].get("vector").is_none());
        assert!(records[2].get("vector").is_none());
    }

    #[test]
    fn progress_counts_processed_records_and_the_last_one() {
        let points: Vec<usize> = (0..23).filter(|&i| is_progress_point(i, 23)).collect();
        assert_eq!(points, vec![9, 19, 22]);
        assert!(is_progress_point(0, 1));
        assert!(!is_progress_point(0, 2));
    }

    #[tokio::test]
    async fn replaces_stale_vectors() {
        let mut records = vec![json!({"text": "ab", "vector": [9.0]})];
        reembed_records(&LengthEmbedder, "embed", &mut records, "text")
            .await
            .unwrap();
        assert_eq!(records[0]["vector"], json!([2.0, 1.0]));
    }

    #[tokio::test]
    async fn non_object_record_fails() {
        let mut records = vec![json!("just a string")];
        let err = reembed_records(&LengthEmbedder, "embed", &mut records, "text")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Knowledge(KnowledgeError::InvalidRecord { index: 0, .. })));
    }

    #[tokio::test]
    async fn file_round_trip_loads_as_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("faq.json");
        let output = dir.path().join("faq_embedded.json");
        std::fs::write(
            &input,
            r#"[{"question": "How many leaves?", "answer": "18"}, {"question": ""}]"#,
        )
        .unwrap();

        let summary = reembed_file(&LengthEmbedder, "embed", &input, &output, "question")
            .await
            .unwrap();
        assert_eq!(summary.embedded, 1);

        let records = crate::record::load_records(&output, "question").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vector, vec![16.0, 1.0]);
        assert_eq!(records[0].field("answer"), Some("18"));
    }

    #[tokio::test]
    async fn missing_input_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = reembed_file(
            &LengthEmbedder,
            "embed",
            &dir.path().join("absent.json"),
            &dir.path().join("out.json"),
            "text",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Knowledge(KnowledgeError::Io { .. })));
    }
}
