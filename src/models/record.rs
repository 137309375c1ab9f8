//! Input items, API results and the documents persisted for them.

use mongodb::bson::DateTime;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Value of the `source` field on every stored document.
pub const DOCUMENT_SOURCE: &str = "embed-store";

/// One trimmed, non-empty unit of input text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextItem {
    /// Position in the collected input sequence.
    pub index: usize,
    pub text: String,
}

impl TextItem {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    pub item: TextItem,
    pub vector: Vec<f32>,
    pub model: String,
}

/// Token accounting reported by the responses endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: i64,
    #[serde(default)]
    pub output_tokens: i64,
    #[serde(default)]
    pub total_tokens: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseResult {
    pub item: TextItem,
    pub text: String,
    pub model: String,
    pub response_id: Option<String>,
    /// Unix seconds, as reported by the endpoint.
    pub created_at: Option<i64>,
    pub usage: Option<TokenUsage>,
}

/// Document written to the embeddings collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub text: String,
    pub embedding: Vec<f32>,
    pub model: String,
    pub created_at: DateTime,
    pub index: i64,
    pub source: String,
}

impl EmbeddingRecord {
    pub fn new(id: ObjectId, result: &EmbeddingResult) -> Self {
        Self {
            id,
            text: result.item.text.clone(),
            embedding: result.vector.clone(),
            model: result.model.clone(),
            created_at: DateTime::now(),
            index: result.item.index as i64,
            source: DOCUMENT_SOURCE.to_string(),
        }
    }
}

/// Document written to the result collection. Shares its `_id` with the
/// embedding document of the same item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub text: String,
    pub response: String,
    pub model: String,
    pub created_at: DateTime,
    pub index: i64,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub usage: Option<TokenUsage>,
}

impl ResponseRecord {
    pub fn new(id: ObjectId, result: &ResponseResult) -> Self {
        let created_at = result
            .created_at
            .map(|secs| DateTime::from_millis(secs.saturating_mul(1000)))
            .unwrap_or_else(DateTime::now);

        Self {
            id,
            text: result.item.text.clone(),
            response: result.text.clone(),
            model: result.model.clone(),
            created_at,
            index: result.item.index as i64,
            source: DOCUMENT_SOURCE.to_string(),
            response_id: result.response_id.clone(),
            usage: result.usage,
        }
    }
}
