use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::source::Source;
use crate::error::MetadataError;

/// A caller-supplied document. The id is optional and generated on upsert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

/// Structured metadata attached to a document and copied onto each chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Chunk metadata: the parent's metadata plus a back-reference to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunkMetadata {
    #[serde(flatten)]
    pub document: DocumentMetadata,
    pub document_id: String,
}

/// A bounded piece of a document, the unit that is embedded and searched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub text: String,
    pub chunk_index: u32,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    pub metadata: DocumentChunkMetadata,
}

/// A chunk returned from a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunkWithScore {
    pub id: String,
    pub text: String,
    pub metadata: DocumentChunkMetadata,
    pub score: f32,
}

impl Document {
    pub fn new(text: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            id: None,
            text: text.into(),
            metadata,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Random, globally unique document id.
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// The explicit id if one was given and is not blank.
    pub fn explicit_id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }
}

impl DocumentMetadata {
    pub fn with_source(source: Source) -> Self {
        Self {
            source: Some(source),
            ..Default::default()
        }
    }

    /// Parse and validate a JSON metadata payload.
    pub fn parse_json(raw: &str) -> Result<Self, MetadataError> {
        let metadata: Self = serde_json::from_str(raw)?;
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn validate(&self) -> Result<(), MetadataError> {
        if let Some(ref created_at) = self.created_at {
            parse_timestamp("created_at", created_at)?;
        }
        Ok(())
    }

    /// `created_at` as a Unix timestamp, if present and parseable.
    pub fn created_at_timestamp(&self) -> Option<i64> {
        self.created_at
            .as_deref()
            .and_then(|value| parse_timestamp("created_at", value).ok())
    }
}

impl DocumentChunk {
    /// Deterministic chunk id: the parent id with the chunk ordinal appended.
    pub fn generate_id(document_id: &str, chunk_index: u32) -> String {
        format!("{}_{}", document_id, chunk_index)
    }

    /// Stable UUID for backends that only accept UUID point ids.
    pub fn point_uuid(chunk_id: &str) -> uuid::Uuid {
        uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, chunk_id.as_bytes())
    }

    pub fn new(
        document_id: &str,
        metadata: &DocumentMetadata,
        text: String,
        chunk_index: u32,
    ) -> Self {
        Self {
            id: Self::generate_id(document_id, chunk_index),
            text,
            chunk_index,
            embedding: Vec::new(),
            metadata: DocumentChunkMetadata {
                document: metadata.clone(),
                document_id: document_id.to_string(),
            },
        }
    }
}

/// Parse an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC)
/// into Unix seconds.
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<i64, MetadataError> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc).timestamp());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        && let Some(dt) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(dt.and_utc().timestamp());
    }
    Err(MetadataError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_generate_id() {
        let id = DocumentChunk::generate_id("abc123", 5);
        assert_eq!(id, "abc123_5");
        assert_eq!(id, DocumentChunk::generate_id("abc123", 5));
        assert_ne!(id, DocumentChunk::generate_id("abc123", 6));
    }

    #[test]
    fn test_point_uuid_is_stable() {
        let a = DocumentChunk::point_uuid("doc_0");
        assert_eq!(a, DocumentChunk::point_uuid("doc_0"));
        assert_ne!(a, DocumentChunk::point_uuid("doc_1"));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(Document::generate_id(), Document::generate_id());
    }

    #[test]
    fn test_explicit_id_ignores_blank() {
        let doc = Document::new("text", DocumentMetadata::default());
        assert_eq!(doc.explicit_id(), None);
        assert_eq!(doc.clone().with_id("  ").explicit_id(), None);
        assert_eq!(doc.with_id("doc-1").explicit_id(), Some("doc-1"));
    }

    #[test]
    fn test_chunk_inherits_metadata() {
        let metadata = DocumentMetadata {
            source: Some(Source::Email),
            author: Some("alex".to_string()),
            ..Default::default()
        };
        let chunk = DocumentChunk::new("doc", &metadata, "hello".to_string(), 2);
        assert_eq!(chunk.id, "doc_2");
        assert_eq!(chunk.metadata.document, metadata);
        assert_eq!(chunk.metadata.document_id, "doc");
    }

    #[test]
    fn test_parse_metadata_json() {
        let metadata =
            DocumentMetadata::parse_json(r#"{"source":"file","created_at":"2023-04-01"}"#)
                .unwrap();
        assert_eq!(metadata.source, Some(Source::File));
        assert_eq!(metadata.created_at_timestamp(), Some(1_680_307_200));
    }

    #[test]
    fn test_parse_metadata_rejects_malformed() {
        assert!(matches!(
            DocumentMetadata::parse_json("not json"),
            Err(MetadataError::Malformed(_))
        ));
        assert!(matches!(
            DocumentMetadata::parse_json(r#"{"source":"fax"}"#),
            Err(MetadataError::Malformed(_))
        ));
        assert!(matches!(
            DocumentMetadata::parse_json(r#"{"created_at":"last tuesday"}"#),
            Err(MetadataError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("d", "1970-01-02").unwrap(), 86_400);
        assert_eq!(parse_timestamp("d", "1970-01-01T00:01:00Z").unwrap(), 60);
        assert_eq!(parse_timestamp("d", "1970-01-01T01:00:00+01:00").unwrap(), 0);
        assert!(parse_timestamp("d", "01/02/1970").is_err());
    }

    #[test]
    fn test_chunk_metadata_serializes_flat() {
        let chunk_metadata = DocumentChunkMetadata {
            document: DocumentMetadata::with_source(Source::Chat),
            document_id: "d1".to_string(),
        };
        let value = serde_json::to_value(&chunk_metadata).unwrap();
        assert_eq!(value["source"], "chat");
        assert_eq!(value["document_id"], "d1");
    }
}
