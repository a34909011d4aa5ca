//! Vector store abstraction layer.
//!
//! This module provides a trait-based abstraction over the vector store backends
//! (in-memory, Qdrant, PostgreSQL/pgvector). The backend is chosen once from
//! configuration.

mod memory;
mod pgvector;
mod qdrant;

pub use memory::MemoryBackend;
pub use pgvector::PgVectorBackend;
pub use qdrant::QdrantBackend;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::{
    DateRange, DocumentChunk, DocumentChunkWithScore, DocumentMetadataFilter, FilterField,
    VectorDriver, VectorStoreConfig,
};

/// Collection/table information
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub points_count: u64,
}

/// Abstract trait for vector store operations.
///
/// Backends store chunks keyed by chunk id, tagged with their parent
/// `document_id` and the parent's metadata.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Get the collection/table name.
    fn collection(&self) -> &str;

    /// Metadata fields this backend can translate into native filters.
    fn filterable_fields(&self) -> &[FilterField] {
        &FilterField::ALL
    }

    /// Check if the vector store is healthy and accessible.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Get information about the current collection/table.
    /// Returns None if the collection doesn't exist.
    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError>;

    /// Create the collection/table if it doesn't exist.
    async fn create_collection(&self) -> Result<(), VectorStoreError>;

    /// Insert or replace chunks. Every chunk must carry its embedding.
    ///
    /// All chunks of one call are written in a single backend request.
    async fn upsert_chunks(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError>;

    /// Return up to `top_k` chunks most similar to `embedding`, best first.
    async fn search(
        &self,
        embedding: Vec<f32>,
        top_k: usize,
        filter: Option<&DocumentMetadataFilter>,
    ) -> Result<Vec<DocumentChunkWithScore>, VectorStoreError>;

    /// Delete every chunk belonging to the given documents. Unknown ids are ignored.
    async fn delete_by_document_ids(&self, document_ids: &[String])
    -> Result<(), VectorStoreError>;

    /// Delete every chunk matching `filter`. An empty filter deletes nothing.
    async fn delete_by_filter(&self, filter: &DocumentMetadataFilter)
    -> Result<(), VectorStoreError>;

    /// Remove all chunks from the collection.
    async fn delete_all(&self) -> Result<(), VectorStoreError>;

    /// Release connections held by the backend.
    async fn close(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }
}

/// Create the backend selected by `config.driver`.
///
/// `dimension` is the embedding width used when creating collections.
pub async fn create_backend(
    config: &VectorStoreConfig,
    dimension: u64,
) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    match config.driver {
        VectorDriver::Memory => Ok(Arc::new(MemoryBackend::new(
            &config.collection,
            dimension as usize,
        ))),
        VectorDriver::Qdrant => {
            let backend = QdrantBackend::new(config, dimension)?;
            Ok(Arc::new(backend))
        }
        VectorDriver::PostgreSQL => {
            let backend = PgVectorBackend::new(config, dimension).await?;
            Ok(Arc::new(backend))
        }
    }
}

/// Resolve the `created_at` bounds of a filter for a backend query.
fn date_bounds(filter: &DocumentMetadataFilter) -> Result<DateRange, VectorStoreError> {
    filter
        .date_range()
        .map_err(|e| VectorStoreError::SearchError(e.to_string()))
}
