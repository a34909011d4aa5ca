//! Error types for the document retrieval service.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors raised while parsing or validating document metadata and filters.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("malformed metadata payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid date in field '{field}': {value}")]
    InvalidDate { field: &'static str, value: String },

    #[error("invalid date range: start_date {start} is after end_date {end}")]
    InvalidRange { start: String, end: String },
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding provider: {0}")]
    ConnectionError(String),

    #[error("embedding provider returned status {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding provider is not configured: {0}")]
    NotConfigured(String),

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            // Rate limiting and server-side failures are transient; auth and
            // bad-input rejections are not.
            EmbeddingError::ServerError { status, .. } => *status == 429 || *status >= 500,
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_) | EmbeddingError::NotConfigured(_) => false,
        }
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to vector store: {0}")]
    ConnectionError(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("search error: {0}")]
    SearchError(String),

    #[error("delete error: {0}")]
    DeleteError(String),

    #[error("PostgreSQL error: {0}")]
    PostgresError(String),

    #[error("pgvector extension error: {0}")]
    PgVectorExtensionError(String),
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            VectorStoreError::ConnectionError(_) => true,
            VectorStoreError::PgVectorExtensionError(_) => false,
            VectorStoreError::CollectionError(msg)
            | VectorStoreError::UpsertError(msg)
            | VectorStoreError::SearchError(msg)
            | VectorStoreError::DeleteError(msg)
            | VectorStoreError::PostgresError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("timed out")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("unavailable")
                    || msg_lower.contains("too many")
            }
        }
    }
}

/// Errors related to chat completion requests.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion provider returned status {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("completion request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid completion response: {0}")]
    InvalidResponse(String),

    #[error("completion provider is not configured: {0}")]
    NotConfigured(String),
}

impl Retryable for CompletionError {
    fn is_retryable(&self) -> bool {
        match self {
            CompletionError::ServerError { status, .. } => *status == 429 || *status >= 500,
            CompletionError::RequestError(e) => e.is_timeout() || e.is_connect(),
            CompletionError::InvalidResponse(_) | CompletionError::NotConfigured(_) => false,
        }
    }
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors surfaced by the document-level datastore operations.
///
/// Each kind stays distinguishable so callers can map them to their own
/// responses (bad request, upstream failure, ...).
#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(#[from] MetadataError),

    #[error("embedding provider error: {0}")]
    EmbeddingProvider(#[from] EmbeddingError),

    #[error("backend error: {0}")]
    Backend(#[from] VectorStoreError),

    #[error("unsupported filter for {backend} backend: {message}")]
    UnsupportedFilter { backend: String, message: String },

    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

/// Errors from answering a chat message.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Datastore(#[from] DatastoreError),

    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_error_classification() {
        let rate_limited = EmbeddingError::ServerError {
            status: 429,
            message: "slow down".to_string(),
        };
        let unavailable = EmbeddingError::ServerError {
            status: 503,
            message: "unavailable".to_string(),
        };
        let unauthorized = EmbeddingError::ServerError {
            status: 401,
            message: "bad key".to_string(),
        };
        let bad_input = EmbeddingError::ServerError {
            status: 400,
            message: "too long".to_string(),
        };

        assert!(rate_limited.is_retryable());
        assert!(unavailable.is_retryable());
        assert!(EmbeddingError::Timeout.is_retryable());
        assert!(!unauthorized.is_retryable());
        assert!(!bad_input.is_retryable());
        assert!(!EmbeddingError::InvalidResponse("x".to_string()).is_retryable());
    }

    #[test]
    fn test_vector_store_error_classification() {
        assert!(VectorStoreError::ConnectionError("refused".to_string()).is_retryable());
        assert!(VectorStoreError::SearchError("request timed out".to_string()).is_retryable());
        assert!(!VectorStoreError::UpsertError("dimension mismatch".to_string()).is_retryable());
        assert!(
            !VectorStoreError::PgVectorExtensionError("missing".to_string()).is_retryable()
        );
    }

    #[test]
    fn test_datastore_error_kinds_are_distinct() {
        let err: DatastoreError = VectorStoreError::DeleteError("boom".to_string()).into();
        assert!(matches!(err, DatastoreError::Backend(_)));

        let err: DatastoreError = EmbeddingError::Timeout.into();
        assert!(matches!(err, DatastoreError::EmbeddingProvider(_)));
    }
}
