mod chat;
mod config;
mod delete;
mod filter;
mod query;
mod status;
mod upsert;
mod upsert_file;

pub use chat::ChatArgs;
pub use config::ConfigCommand;
pub use delete::DeleteArgs;
pub use filter::FilterArgs;
pub use query::QueryArgs;
pub use upsert::UpsertArgs;
pub use upsert_file::UpsertFileArgs;

pub use chat::handle_chat;
pub use config::handle_config;
pub use delete::handle_delete;
pub use query::handle_query;
pub use status::handle_status;
pub use upsert::handle_upsert;
pub use upsert_file::handle_upsert_file;

use tracing::warn;

use crate::services::DataStore;

/// Close `datastore` after an operation.
///
/// The operation's error wins; a teardown failure is only logged then.
pub(crate) async fn finish<T, E>(datastore: &DataStore, result: Result<T, E>) -> anyhow::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    match (result, datastore.teardown().await) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(teardown)) => Err(teardown.into()),
        (Err(e), Ok(())) => Err(e.into()),
        (Err(e), Err(teardown)) => {
            warn!(error = %teardown, "datastore teardown failed");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{DatastoreError, VectorStoreError};
    use crate::models::{DocumentChunk, DocumentChunkWithScore, DocumentMetadataFilter};
    use crate::services::embedding::testing::{HashEmbeddingProvider, TEST_DIMENSION, fast_retry};
    use crate::services::vector_store::{CollectionInfo, MemoryBackend, VectorStore};
    use crate::services::{Embedder, TextChunker};

    /// Memory backend whose `close` always fails.
    struct StickyBackend {
        inner: MemoryBackend,
    }

    #[async_trait]
    impl VectorStore for StickyBackend {
        fn name(&self) -> &'static str {
            "sticky"
        }

        fn collection(&self) -> &str {
            self.inner.collection()
        }

        async fn health_check(&self) -> Result<bool, VectorStoreError> {
            self.inner.health_check().await
        }

        async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
            self.inner.collection_info().await
        }

        async fn create_collection(&self) -> Result<(), VectorStoreError> {
            self.inner.create_collection().await
        }

        async fn upsert_chunks(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError> {
            self.inner.upsert_chunks(chunks).await
        }

        async fn search(
            &self,
            embedding: Vec<f32>,
            top_k: usize,
            filter: Option<&DocumentMetadataFilter>,
        ) -> Result<Vec<DocumentChunkWithScore>, VectorStoreError> {
            self.inner.search(embedding, top_k, filter).await
        }

        async fn delete_by_document_ids(
            &self,
            document_ids: &[String],
        ) -> Result<(), VectorStoreError> {
            self.inner.delete_by_document_ids(document_ids).await
        }

        async fn delete_by_filter(
            &self,
            filter: &DocumentMetadataFilter,
        ) -> Result<(), VectorStoreError> {
            self.inner.delete_by_filter(filter).await
        }

        async fn delete_all(&self) -> Result<(), VectorStoreError> {
            self.inner.delete_all().await
        }

        async fn close(&self) -> Result<(), VectorStoreError> {
            Err(VectorStoreError::ConnectionError("pool already closed".to_string()))
        }
    }

    fn datastore(close_fails: bool) -> DataStore {
        let inner = MemoryBackend::new("test", TEST_DIMENSION);
        let backend: Arc<dyn VectorStore> = if close_fails {
            Arc::new(StickyBackend { inner })
        } else {
            Arc::new(inner)
        };
        let embedder = Embedder::new(Arc::new(HashEmbeddingProvider::new()), 8, fast_retry());
        DataStore::new(backend, embedder, TextChunker::with_defaults())
    }

    #[tokio::test]
    async fn test_operation_error_survives_teardown_failure() {
        let store = datastore(true);
        let result = store.delete(None, None, false).await;

        let err = finish(&store, result).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DatastoreError>(),
            Some(DatastoreError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_teardown_failure_reported_after_success() {
        let store = datastore(true);
        let result = store.delete(None, None, true).await;

        let err = finish(&store, result).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DatastoreError>(),
            Some(DatastoreError::Backend(VectorStoreError::ConnectionError(_)))
        ));
    }

    #[tokio::test]
    async fn test_finish_passes_value_through() {
        let store = datastore(false);
        let result = store.delete(None, None, true).await;
        assert!(finish(&store, result).await.unwrap());
    }
}
