//! Qdrant vector store backend implementation.

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct, Range,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use std::collections::HashMap;
use tracing::debug;

use super::{CollectionInfo, VectorStore, date_bounds};
use crate::error::VectorStoreError;
use crate::models::{
    DocumentChunk, DocumentChunkMetadata, DocumentChunkWithScore, DocumentMetadata,
    DocumentMetadataFilter, VectorStoreConfig,
};

/// Qdrant vector store backend.
///
/// Point ids are UUIDs derived from chunk ids; the chunk id itself is kept in
/// the payload.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    embedding_dim: u64,
}

impl QdrantBackend {
    pub fn new(config: &VectorStoreConfig, embedding_dim: u64) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            embedding_dim,
        })
    }

    /// Translate a metadata filter into a Qdrant `must` filter.
    fn build_filter(filter: &DocumentMetadataFilter) -> Result<Option<Filter>, VectorStoreError> {
        let mut must: Vec<Condition> = Vec::new();

        if let Some(ref document_id) = filter.document_id {
            must.push(Condition::matches("document_id", document_id.clone()));
        }
        if let Some(source) = filter.source {
            must.push(Condition::matches("source", source.to_string()));
        }
        if let Some(ref source_id) = filter.source_id {
            must.push(Condition::matches("source_id", source_id.clone()));
        }
        if let Some(ref author) = filter.author {
            must.push(Condition::matches("author", author.clone()));
        }

        let dates = date_bounds(filter)?;
        if !dates.is_unbounded() {
            must.push(Condition::range(
                "created_at_ts",
                Range {
                    gte: dates.start.map(|s| s as f64),
                    lte: dates.end.map(|e| e as f64),
                    ..Default::default()
                },
            ));
        }

        if must.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Filter::must(must)))
        }
    }

    fn build_payload(chunk: &DocumentChunk) -> HashMap<String, Value> {
        let doc = &chunk.metadata.document;
        let mut payload: HashMap<String, Value> = HashMap::new();

        payload.insert("id".to_string(), chunk.id.clone().into());
        payload.insert(
            "document_id".to_string(),
            chunk.metadata.document_id.clone().into(),
        );
        payload.insert(
            "chunk_index".to_string(),
            i64::from(chunk.chunk_index).into(),
        );
        payload.insert("text".to_string(), chunk.text.clone().into());

        if let Some(source) = doc.source {
            payload.insert("source".to_string(), source.to_string().into());
        }
        let optional = [
            ("source_id", &doc.source_id),
            ("url", &doc.url),
            ("created_at", &doc.created_at),
            ("author", &doc.author),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                payload.insert(key.to_string(), value.clone().into());
            }
        }
        if let Some(ts) = doc.created_at_timestamp() {
            payload.insert("created_at_ts".to_string(), ts.into());
        }

        payload
    }

    fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
        payload.get(key).and_then(|v| match &v.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
    }

    fn chunk_from_payload(payload: &HashMap<String, Value>, score: f32) -> DocumentChunkWithScore {
        let get = |key: &str| Self::payload_string(payload, key);

        DocumentChunkWithScore {
            id: get("id").unwrap_or_default(),
            text: get("text").unwrap_or_default(),
            metadata: DocumentChunkMetadata {
                document: DocumentMetadata {
                    source: get("source").and_then(|s| s.parse().ok()),
                    source_id: get("source_id"),
                    url: get("url"),
                    created_at: get("created_at"),
                    author: get("author"),
                },
                document_id: get("document_id").unwrap_or_default(),
            },
            score,
        }
    }

    async fn delete_matching(&self, filter: Filter) -> Result<(), VectorStoreError> {
        let delete = DeletePointsBuilder::new(&self.collection)
            .points(filter)
            .wait(true);

        self.client
            .delete_points(delete)
            .await
            .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantBackend {
    fn name(&self) -> &'static str {
        "qdrant"
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;
        if !exists {
            return Ok(None);
        }

        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        Ok(Some(CollectionInfo {
            points_count: info.result.map_or(0, |r| r.points_count.unwrap_or(0)),
        }))
    }

    async fn create_collection(&self) -> Result<(), VectorStoreError> {
        if self.collection_info().await?.is_some() {
            return Ok(());
        }

        let create_collection = CreateCollectionBuilder::new(&self.collection).vectors_config(
            VectorParamsBuilder::new(self.embedding_dim, Distance::Cosine),
        );

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        debug!(collection = %self.collection, dimension = self.embedding_dim, "created collection");
        Ok(())
    }

    async fn upsert_chunks(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = chunks
            .into_iter()
            .map(|chunk| {
                let payload = Self::build_payload(&chunk);
                let point_id = DocumentChunk::point_uuid(&chunk.id).to_string();
                PointStruct::new(point_id, chunk.embedding, payload)
            })
            .collect();

        let upsert = UpsertPointsBuilder::new(&self.collection, points).wait(true);

        self.client
            .upsert_points(upsert)
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        Ok(())
    }

    async fn search(
        &self,
        embedding: Vec<f32>,
        top_k: usize,
        filter: Option<&DocumentMetadataFilter>,
    ) -> Result<Vec<DocumentChunkWithScore>, VectorStoreError> {
        let mut search_builder =
            SearchPointsBuilder::new(&self.collection, embedding, top_k as u64).with_payload(true);

        if let Some(f) = filter.map(Self::build_filter).transpose()?.flatten() {
            search_builder = search_builder.filter(f);
        }

        let results = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        Ok(results
            .result
            .into_iter()
            .map(|point| Self::chunk_from_payload(&point.payload, point.score))
            .collect())
    }

    async fn delete_by_document_ids(
        &self,
        document_ids: &[String],
    ) -> Result<(), VectorStoreError> {
        if document_ids.is_empty() {
            return Ok(());
        }

        let conditions: Vec<Condition> = document_ids
            .iter()
            .map(|id| Condition::matches("document_id", id.clone()))
            .collect();

        self.delete_matching(Filter::should(conditions)).await
    }

    async fn delete_by_filter(
        &self,
        filter: &DocumentMetadataFilter,
    ) -> Result<(), VectorStoreError> {
        match Self::build_filter(filter)? {
            Some(f) => self.delete_matching(f).await,
            None => Ok(()),
        }
    }

    async fn delete_all(&self) -> Result<(), VectorStoreError> {
        if self.collection_info().await?.is_none() {
            return Ok(());
        }

        self.client
            .delete_collection(&self.collection)
            .await
            .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;

        self.create_collection().await
    }
}
