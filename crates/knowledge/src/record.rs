//! Embedding records and the snapshot file loader.
//!
//! A snapshot file is a JSON array of objects. Each object carries a text
//! field (its name depends on the corpus) and a `vector` (or `embedding`)
//! field. Everything else is kept as metadata.

use rolerag_core::error::KnowledgeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// A (text, vector) pair loaded from a snapshot file. Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub source_id: String,
    pub text: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl EmbeddingRecord {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
            vector,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// A string-valued metadata field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.metadata.get(name).and_then(Value::as_str)
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Read and parse a snapshot file.
pub async fn load_records(
    path: &Path,
    text_field: &str,
) -> Result<Vec<EmbeddingRecord>, KnowledgeError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| KnowledgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_records(&path.display().to_string(), &raw, text_field)
}

/// Parse a snapshot document.
///
/// Records without a vector are skipped. Everything else must be well
/// formed: non-empty text, an all-numeric vector, and one dimension across
/// the whole document. The first bad record fails the whole source.
pub fn parse_records(
    source_name: &str,
    raw: &str,
    text_field: &str,
) -> Result<Vec<EmbeddingRecord>, KnowledgeError> {
    let items: Vec<Value> = serde_json::from_str(raw).map_err(|e| KnowledgeError::Parse {
        source_name: source_name.to_string(),
        reason: e.to_string(),
    })?;

    let invalid = |index: usize, reason: &str| KnowledgeError::InvalidRecord {
        source_name: source_name.to_string(),
        index,
        reason: reason.to_string(),
    };

    let mut records = Vec::with_capacity(items.len());
    let mut expected_dim: Option<usize> = None;
    let mut skipped = 0usize;

    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(mut fields) = item else {
            return Err(invalid(index, "record is not an object"));
        };

        let vector = match fields.remove("vector").or_else(|| fields.remove("embedding")) {
            None | Some(Value::Null) => {
                skipped += 1;
                continue;
            }
            Some(Value::Array(values)) => values
                .iter()
                .map(|v| v.as_f64().map(|f| f as f32))
                .collect::<Option<Vec<f32>>>()
                .ok_or_else(|| invalid(index, "vector contains a non-numeric value"))?,
            Some(_) => return Err(invalid(index, "vector is not an array")),
        };
        if vector.is_empty() {
            return Err(invalid(index, "vector is empty"));
        }

        match expected_dim {
            None => expected_dim = Some(vector.len()),
            Some(expected) if expected != vector.len() => {
                return Err(KnowledgeError::DimensionMismatch {
                    source_name: source_name.to_string(),
                    index,
                    expected,
                    found: vector.len(),
                });
            }
            Some(_) => {}
        }

        let text = match fields.remove(text_field) {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            _ => return Err(invalid(index, &format!("missing or empty `{text_field}`"))),
        };

        let source_id = match fields.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => format!("{source_name}#{index}"),
        };

        records.push(EmbeddingRecord {
            source_id,
            text,
            vector,
            metadata: fields,
        });
    }

    debug!(source = source_name, loaded = records.len(), skipped, "Parsed embedding snapshot");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records_and_keeps_metadata() {
        let raw = r#"[
            {"id": 7, "text": "Casual leave is 12 days.", "vector": [0.1, 0.2], "source": "leave.pdf"},
            {"text": "Notice period is 60 days.", "embedding": [0.3, 0.4]}
        ]"#;
        let records = parse_records("policies", raw, "text").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source_id, "7");
        assert_eq!(records[0].field("source"), Some("leave.pdf"));
        assert!(!records[0].metadata.contains_key("vector"));
        assert!(!records[0].metadata.contains_key("text"));
        assert_eq!(records[1].source_id, "policies#1");
        assert_eq!(records[1].vector, vec![0.3, 0.4]);
    }

    #[test]
    fn records_without_vector_are_skipped() {
        let raw = r#"[
            {"question": "How do I apply for leave?", "answer": "Use Leave Register."},
            {"question": "When is payday?", "answer": "Last working day.", "vector": [1.0, 0.0]},
            {"question": "Pending?", "vector": null}
        ]"#;
        let records = parse_records("faq", raw, "question").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "When is payday?");
        assert_eq!(records[0].field("answer"), Some("Last working day."));
    }

    #[test]
    fn empty_text_is_an_error() {
        let raw = r#"[{"text": "  ", "vector": [1.0]}]"#;
        let err = parse_records("policies", raw, "text").unwrap_err();
        assert!(matches!(err, KnowledgeError::InvalidRecord { index: 0, .. }));
    }

    #[test]
    fn non_numeric_vector_is_an_error() {
        let raw = r#"[{"text": "a", "vector": [1.0, "x"]}]"#;
        assert!(matches!(
            parse_records("policies", raw, "text"),
            Err(KnowledgeError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn dimension_mismatch_is_a_load_error() {
        let raw = r#"[
            {"text": "a", "vector": [1.0, 0.0, 0.0]},
            {"text": "b", "vector": [1.0, 0.0]}
        ]"#;
        let err = parse_records("policies", raw, "text").unwrap_err();
        assert!(matches!(
            err,
            KnowledgeError::DimensionMismatch { index: 1, expected: 3, found: 2, .. }
        ));
    }

    #[test]
    fn top_level_must_be_an_array() {
        assert!(matches!(
            parse_records("policies", r#"{"text": "a"}"#, "text"),
            Err(KnowledgeError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy_vectors.json");
        std::fs::write(&path, r#"[{"text": "Leave policy", "vector": [0.5, 0.5]}]"#).unwrap();
        let records = load_records(&path, "text").await.unwrap();
        assert_eq!(records.len(), 1);

        let missing = load_records(&dir.path().join("nope.json"), "text").await;
        assert!(matches!(missing, Err(KnowledgeError::Io { .. })));
    }
}
