//! In-process vector store using cosine similarity.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{CollectionInfo, VectorStore, date_bounds};
use crate::error::VectorStoreError;
use crate::models::{
    DateRange, DocumentChunk, DocumentChunkMetadata, DocumentChunkWithScore,
    DocumentMetadataFilter,
};

/// Chunks kept in a `HashMap` behind a `tokio::sync::RwLock`.
///
/// Contents live as long as the process. Suited to tests, demos and
/// single-process use.
#[derive(Debug)]
pub struct MemoryBackend {
    collection: String,
    dimension: usize,
    chunks: RwLock<HashMap<String, DocumentChunk>>,
}

impl MemoryBackend {
    pub fn new(collection: impl Into<String>, dimension: usize) -> Self {
        Self {
            collection: collection.into(),
            dimension,
            chunks: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }
}

/// Cosine similarity; 0.0 when either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Whether chunk metadata satisfies every constraint of `filter`.
pub(crate) fn matches_filter(
    metadata: &DocumentChunkMetadata,
    filter: &DocumentMetadataFilter,
    dates: &DateRange,
) -> bool {
    fn eq(expected: &Option<String>, actual: &Option<String>) -> bool {
        expected.as_ref().is_none_or(|e| actual.as_ref() == Some(e))
    }

    let doc = &metadata.document;

    filter
        .document_id
        .as_ref()
        .is_none_or(|id| *id == metadata.document_id)
        && filter.source.is_none_or(|s| doc.source == Some(s))
        && eq(&filter.source_id, &doc.source_id)
        && eq(&filter.author, &doc.author)
        && (dates.is_unbounded()
            || doc
                .created_at_timestamp()
                .is_some_and(|ts| dates.contains(ts)))
}

#[async_trait]
impl VectorStore for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Ok(true)
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        Ok(Some(CollectionInfo {
            points_count: self.len().await as u64,
        }))
    }

    async fn create_collection(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn upsert_chunks(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError> {
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != self.dimension) {
            return Err(VectorStoreError::UpsertError(format!(
                "chunk {} has {} dimensions, expected {}",
                bad.id,
                bad.embedding.len(),
                self.dimension
            )));
        }

        let mut store = self.chunks.write().await;
        for chunk in chunks {
            store.insert(chunk.id.clone(), chunk);
        }
        Ok(())
    }

    async fn search(
        &self,
        embedding: Vec<f32>,
        top_k: usize,
        filter: Option<&DocumentMetadataFilter>,
    ) -> Result<Vec<DocumentChunkWithScore>, VectorStoreError> {
        let dates = filter.map(date_bounds).transpose()?.unwrap_or_default();
        let store = self.chunks.read().await;

        let mut scored: Vec<DocumentChunkWithScore> = store
            .values()
            .filter(|chunk| filter.is_none_or(|f| matches_filter(&chunk.metadata, f, &dates)))
            .map(|chunk| DocumentChunkWithScore {
                id: chunk.id.clone(),
                text: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
                score: cosine_similarity(&chunk.embedding, &embedding),
            })
            .collect();

        // Ties broken by id so results do not depend on map iteration order.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete_by_document_ids(
        &self,
        document_ids: &[String],
    ) -> Result<(), VectorStoreError> {
        if document_ids.is_empty() {
            return Ok(());
        }

        let mut store = self.chunks.write().await;
        let before = store.len();
        store.retain(|_, chunk| !document_ids.contains(&chunk.metadata.document_id));
        debug!(removed = before - store.len(), "deleted chunks by document id");
        Ok(())
    }

    async fn delete_by_filter(
        &self,
        filter: &DocumentMetadataFilter,
    ) -> Result<(), VectorStoreError> {
        if filter.is_empty() {
            return Ok(());
        }

        let dates = date_bounds(filter)?;
        let mut store = self.chunks.write().await;
        store.retain(|_, chunk| !matches_filter(&chunk.metadata, filter, &dates));
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), VectorStoreError> {
        self.chunks.write().await.clear();
        Ok(())
    }
}
