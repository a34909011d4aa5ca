//! Document pipeline: chunk, embed and persist documents, then search or delete them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info};

use crate::error::DatastoreError;
use crate::models::{Config, Document, DocumentMetadataFilter, Query, QueryResult};
use crate::services::chunker::TextChunker;
use crate::services::embedding::Embedder;
use crate::services::vector_store::{VectorStore, create_backend};
use crate::utils::RetryPolicy;

/// Per-document-id async locks.
///
/// Serialises upserts and id-based deletes of the same document so a
/// delete-then-insert sequence never interleaves with another one.
#[derive(Debug, Default)]
pub(crate) struct DocumentLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Holds one document lock; the map entry is dropped once nobody else wants it.
pub(crate) struct DocumentGuard<'a> {
    locks: &'a DocumentLocks,
    id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl DocumentLocks {
    pub(crate) async fn lock(&self, id: &str) -> DocumentGuard<'_> {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(id.to_string()).or_default().clone()
        };
        let guard = mutex.lock_owned().await;
        DocumentGuard {
            locks: self,
            id: id.to_string(),
            guard: Some(guard),
        }
    }

    /// Lock several documents in sorted order so concurrent callers cannot deadlock.
    pub(crate) async fn lock_all(&self, ids: &[String]) -> Vec<DocumentGuard<'_>> {
        let mut sorted: Vec<&String> = ids.iter().collect();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for id in sorted {
            guards.push(self.lock(id).await);
        }
        guards
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Drop for DocumentGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self
            .locks
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if map
            .get(&self.id)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            map.remove(&self.id);
        }
    }
}

/// Orchestrates the chunker, the embedder and one vector store backend.
///
/// Cheap to share behind an `Arc`; every operation takes `&self`.
pub struct DataStore {
    backend: Arc<dyn VectorStore>,
    embedder: Embedder,
    chunker: TextChunker,
    retry: RetryPolicy,
    operation_timeout: Option<Duration>,
    locks: DocumentLocks,
}

impl DataStore {
    /// Assemble a datastore from explicit components.
    pub fn new(backend: Arc<dyn VectorStore>, embedder: Embedder, chunker: TextChunker) -> Self {
        Self {
            backend,
            embedder,
            chunker,
            retry: RetryPolicy::default(),
            operation_timeout: None,
            locks: DocumentLocks::default(),
        }
    }

    /// Retry policy applied to backend calls.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Bound every operation by `timeout`; exceeding it yields `Cancelled`.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Build the datastore described by `config` and make sure the collection exists.
    pub async fn init(config: &Config) -> Result<Self, DatastoreError> {
        let embedder = Embedder::from_config(config)?;
        let backend = create_backend(&config.vector_store, embedder.dimension() as u64).await?;
        backend.create_collection().await?;

        info!(
            backend = backend.name(),
            collection = backend.collection(),
            model = embedder.model(),
            "datastore ready"
        );

        Ok(Self::new(backend, embedder, TextChunker::new(&config.chunking))
            .with_retry(RetryPolicy::from_config(&config.retry))
            .with_operation_timeout(config.operation_timeout_secs.map(Duration::from_secs)))
    }

    /// Release backend resources.
    pub async fn teardown(&self) -> Result<(), DatastoreError> {
        self.backend.close().await?;
        debug!(backend = self.backend.name(), "datastore closed");
        Ok(())
    }

    /// Store `documents`, replacing any chunks previously stored under the same ids.
    ///
    /// Returns the document ids in input order, generating ids where none
    /// was given. A failure stops the call; documents before it stay stored.
    pub async fn upsert(&self, documents: Vec<Document>) -> Result<Vec<String>, DatastoreError> {
        self.bounded("upsert", async {
            let mut ids = Vec::with_capacity(documents.len());
            for document in &documents {
                ids.push(self.upsert_document(document).await?);
            }
            Ok(ids)
        })
        .await
    }

    async fn upsert_document(&self, document: &Document) -> Result<String, DatastoreError> {
        document.metadata.validate()?;

        let id = document
            .explicit_id()
            .map(str::to_string)
            .unwrap_or_else(Document::generate_id);

        let _guard = self.locks.lock(&id).await;

        let stale = [id.clone()];
        self.retry
            .run("delete_by_document_ids", || {
                self.backend.delete_by_document_ids(&stale)
            })
            .await
            .inspect_err(|e| error!(document.id = %id, error = %e, "failed to clear previous chunks"))?;

        let mut chunks = self.chunker.chunk(&id, document);
        if chunks.is_empty() {
            info!(document.id = %id, chunk_count = 0, "upserted document (empty)");
            return Ok(id);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed(&texts)
            .await
            .inspect_err(|e| error!(document.id = %id, error = %e, "embedding failed during upsert"))?;

        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }

        let chunk_count = chunks.len();
        self.retry
            .run("upsert_chunks", || self.backend.upsert_chunks(chunks.clone()))
            .await
            .inspect_err(|e| error!(document.id = %id, error = %e, "backend upsert failed"))?;

        info!(document.id = %id, chunk_count, "upserted document");
        Ok(id)
    }

    /// Answer each query with its `top_k` most similar chunks, best first.
    pub async fn query(&self, queries: Vec<Query>) -> Result<Vec<QueryResult>, DatastoreError> {
        self.bounded("query", async {
            if queries.is_empty() {
                return Ok(Vec::new());
            }

            for query in &queries {
                if query.query.trim().is_empty() {
                    return Err(DatastoreError::InvalidRequest(
                        "query text must not be empty".to_string(),
                    ));
                }
                if query.top_k == 0 {
                    return Err(DatastoreError::InvalidRequest(
                        "top_k must be at least 1".to_string(),
                    ));
                }
                if let Some(ref filter) = query.filter {
                    self.check_filter(filter)?;
                }
            }

            let texts: Vec<String> = queries.iter().map(|q| q.query.clone()).collect();
            let embeddings = self
                .embedder
                .embed(&texts)
                .await
                .inspect_err(|e| error!(error = %e, "embedding failed during query"))?;

            let mut results = Vec::with_capacity(queries.len());
            for (query, embedding) in queries.into_iter().zip(embeddings) {
                let filter = query.filter.as_ref().filter(|f| !f.is_empty());
                let mut chunks = self
                    .retry
                    .run("search", || {
                        self.backend.search(embedding.clone(), query.top_k, filter)
                    })
                    .await
                    .inspect_err(|e| error!(error = %e, "vector store search failed"))?;

                // Stable, so equal scores keep the backend's order.
                chunks.sort_by(|a, b| b.score.total_cmp(&a.score));
                chunks.truncate(query.top_k);

                debug!(results = chunks.len(), top_k = query.top_k, "query answered");
                results.push(QueryResult::new(query.query, chunks));
            }

            Ok(results)
        })
        .await
    }

    /// Delete by document ids, by metadata filter, or everything.
    ///
    /// `delete_all` takes precedence. Otherwise the union of the id and
    /// filter matches is removed. Nothing to delete by is an `InvalidRequest`.
    pub async fn delete(
        &self,
        ids: Option<&[String]>,
        filter: Option<&DocumentMetadataFilter>,
        delete_all: bool,
    ) -> Result<bool, DatastoreError> {
        self.bounded("delete", async {
            if delete_all {
                self.retry
                    .run("delete_all", || self.backend.delete_all())
                    .await?;
                info!(backend = self.backend.name(), "deleted all documents");
                return Ok(true);
            }

            let ids = ids.filter(|ids| !ids.is_empty());
            let filter = filter.filter(|f| !f.is_empty());
            if ids.is_none() && filter.is_none() {
                return Err(DatastoreError::InvalidRequest(
                    "one of ids, filter or delete_all must be provided".to_string(),
                ));
            }
            if let Some(filter) = filter {
                self.check_filter(filter)?;
            }

            if let Some(ids) = ids {
                let _guards = self.locks.lock_all(ids).await;
                self.retry
                    .run("delete_by_document_ids", || {
                        self.backend.delete_by_document_ids(ids)
                    })
                    .await?;
                info!(count = ids.len(), "deleted documents by id");
            }

            if let Some(filter) = filter {
                self.retry
                    .run("delete_by_filter", || self.backend.delete_by_filter(filter))
                    .await?;
                info!(fields = ?filter.fields(), "deleted documents by filter");
            }

            Ok(true)
        })
        .await
    }

    /// Validate a filter and make sure the backend can evaluate every field it uses.
    fn check_filter(&self, filter: &DocumentMetadataFilter) -> Result<(), DatastoreError> {
        filter.validate()?;

        let supported = self.backend.filterable_fields();
        if let Some(field) = filter.fields().into_iter().find(|f| !supported.contains(f)) {
            return Err(DatastoreError::UnsupportedFilter {
                backend: self.backend.name().to_string(),
                message: format!("cannot filter on '{}'", field),
            });
        }
        Ok(())
    }

    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T, DatastoreError>
    where
        F: Future<Output = Result<T, DatastoreError>>,
    {
        match self.operation_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                error!(operation, timeout_ms = limit.as_millis() as u64, "operation timed out");
                DatastoreError::Cancelled(format!("{} timed out after {:?}", operation, limit))
            })?,
            None => fut.await,
        }
    }
}
