use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};
use std::time::Duration;
use tracing::debug;

use super::{CollectionInfo, VectorStore, date_bounds};
use crate::error::VectorStoreError;
use crate::models::{
    DocumentChunk, DocumentChunkMetadata, DocumentChunkWithScore, DocumentMetadata,
    DocumentMetadataFilter, VectorStoreConfig,
};

/// A bind value for a generated WHERE clause.
#[derive(Debug, Clone, PartialEq)]
enum SqlParam {
    Text(String),
    BigInt(i64),
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Text(s) => query.bind(s),
            SqlParam::BigInt(n) => query.bind(*n),
        };
    }
    query
}

pub struct PgVectorBackend {
    pool: PgPool,
    table_name: String,
    collection: String,
    embedding_dim: u64,
}

impl PgVectorBackend {
    pub async fn new(
        config: &VectorStoreConfig,
        embedding_dim: u64,
    ) -> Result<Self, VectorStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.pool_acquire_timeout.into()))
            .connect(&config.url)
            .await
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        let backend = Self {
            pool,
            table_name: config.qualified_table_name(),
            collection: config.collection.clone(),
            embedding_dim,
        };

        backend.check_pgvector_extension().await?;

        if let Some(ref schema) = config.schema {
            backend.ensure_schema(schema).await?;
        }

        Ok(backend)
    }

    async fn check_pgvector_extension(&self) -> Result<(), VectorStoreError> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;

        if result.is_none() {
            return Err(VectorStoreError::PgVectorExtensionError(
                "pgvector extension is not installed. Run: CREATE EXTENSION vector;".to_string(),
            ));
        }

        Ok(())
    }

    async fn ensure_schema(&self, schema: &str) -> Result<(), VectorStoreError> {
        let query = format!("CREATE SCHEMA IF NOT EXISTS {}", schema);
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;
        Ok(())
    }

    /// Build `col = $n AND ...` for `filter`, numbering parameters from `first_param`.
    fn where_clause(
        filter: &DocumentMetadataFilter,
        first_param: usize,
    ) -> Result<(Vec<String>, Vec<SqlParam>), VectorStoreError> {
        let mut parts = Vec::new();
        let mut params = Vec::new();

        let equalities = [
            ("document_id", filter.document_id.clone()),
            ("source", filter.source.map(|s| s.to_string())),
            ("source_id", filter.source_id.clone()),
            ("author", filter.author.clone()),
        ];
        for (column, value) in equalities {
            if let Some(value) = value {
                parts.push(format!("{} = ${}", column, first_param + params.len()));
                params.push(SqlParam::Text(value));
            }
        }

        let dates = date_bounds(filter)?;
        if let Some(start) = dates.start {
            parts.push(format!("created_at_ts >= ${}", first_param + params.len()));
            params.push(SqlParam::BigInt(start));
        }
        if let Some(end) = dates.end {
            parts.push(format!("created_at_ts <= ${}", first_param + params.len()));
            params.push(SqlParam::BigInt(end));
        }

        Ok((parts, params))
    }

    fn chunk_from_row(row: &PgRow) -> DocumentChunkWithScore {
        let score: f64 = row.get("score");
        let source: Option<String> = row.get("source");

        DocumentChunkWithScore {
            id: row.get("chunk_id"),
            text: row.get("text"),
            metadata: DocumentChunkMetadata {
                document: DocumentMetadata {
                    source: source.and_then(|s| s.parse().ok()),
                    source_id: row.get("source_id"),
                    url: row.get("url"),
                    created_at: row.get("created_at"),
                    author: row.get("author"),
                },
                document_id: row.get("document_id"),
            },
            score: score as f32,
        }
    }
}

#[async_trait]
impl VectorStore for PgVectorBackend {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        let table: (Option<String>,) = sqlx::query_as("SELECT to_regclass($1)::text")
            .bind(&self.table_name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;

        if table.0.is_none() {
            return Ok(None);
        }

        let query = format!("SELECT COUNT(*) as count FROM {}", self.table_name);
        let row: (i64,) = sqlx::query_as(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;

        Ok(Some(CollectionInfo {
            points_count: row.0 as u64,
        }))
    }

    async fn create_collection(&self) -> Result<(), VectorStoreError> {
        if self.collection_info().await?.is_some() {
            return Ok(());
        }

        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY,
                chunk_id TEXT NOT NULL,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding vector({}) NOT NULL,
                source TEXT,
                source_id TEXT,
                url TEXT,
                created_at TEXT,
                created_at_ts BIGINT,
                author TEXT
            )
            "#,
            self.table_name, self.embedding_dim
        );

        sqlx::query(&create_table)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        let indices = [
            format!(
                "CREATE INDEX IF NOT EXISTS {}_embedding_idx ON {} USING hnsw (embedding vector_cosine_ops)",
                self.collection, self.table_name
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {}_document_id_idx ON {} (document_id)",
                self.collection, self.table_name
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {}_created_at_ts_idx ON {} (created_at_ts)",
                self.collection, self.table_name
            ),
        ];

        for index_sql in &indices {
            sqlx::query(index_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;
        }

        debug!(table = %self.table_name, "created table");
        Ok(())
    }

    async fn upsert_chunks(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let query = format!(
            r#"
            INSERT INTO {} (id, chunk_id, document_id, chunk_index, text, embedding, source,
                          source_id, url, created_at, created_at_ts, author)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                chunk_id = EXCLUDED.chunk_id,
                document_id = EXCLUDED.document_id,
                chunk_index = EXCLUDED.chunk_index,
                text = EXCLUDED.text,
                embedding = EXCLUDED.embedding,
                source = EXCLUDED.source,
                source_id = EXCLUDED.source_id,
                url = EXCLUDED.url,
                created_at = EXCLUDED.created_at,
                created_at_ts = EXCLUDED.created_at_ts,
                author = EXCLUDED.author
            "#,
            self.table_name
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        for chunk in chunks {
            let id = DocumentChunk::point_uuid(&chunk.id);
            let doc = &chunk.metadata.document;
            let embedding = Vector::from(chunk.embedding.clone());

            sqlx::query(&query)
                .bind(id)
                .bind(&chunk.id)
                .bind(&chunk.metadata.document_id)
                .bind(chunk.chunk_index as i32)
                .bind(&chunk.text)
                .bind(&embedding)
                .bind(doc.source.map(|s| s.to_string()))
                .bind(&doc.source_id)
                .bind(&doc.url)
                .bind(&doc.created_at)
                .bind(doc.created_at_timestamp())
                .bind(&doc.author)
                .execute(&mut *tx)
                .await
                .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;
        }

        tx.commit()
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
        let embedding = Vector::from(embedding);

        let (where_parts, params) = match filter {
            Some(f) => Self::where_clause(f, 2)?,
            None => (Vec::new(), Vec::new()),
        };
        let where_clause = if where_parts.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", where_parts.join(" AND "))
        };

        let query = format!(
            r#"
            SELECT
                chunk_id,
                document_id,
                text,
                source,
                source_id,
                url,
                created_at,
                author,
                1 - (embedding <=> $1) as score
            FROM {}
            {}
            ORDER BY embedding <=> $1, chunk_id
            LIMIT {}
            "#,
            self.table_name, where_clause, top_k
        );

        let rows = bind_params(sqlx::query(&query).bind(&embedding), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        Ok(rows.iter().map(Self::chunk_from_row).collect())
    }

    async fn delete_by_document_ids(
        &self,
        document_ids: &[String],
    ) -> Result<(), VectorStoreError> {
        if document_ids.is_empty() {
            return Ok(());
        }

        let query = format!(
            "DELETE FROM {} WHERE document_id = ANY($1)",
            self.table_name
        );

        sqlx::query(&query)
            .bind(document_ids)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;

        Ok(())
    }

    async fn delete_by_filter(
        &self,
        filter: &DocumentMetadataFilter,
    ) -> Result<(), VectorStoreError> {
        let (where_parts, params) = Self::where_clause(filter, 1)?;
        if where_parts.is_empty() {
            return Ok(());
        }

        let query = format!(
            "DELETE FROM {} WHERE {}",
            self.table_name,
            where_parts.join(" AND ")
        );

        bind_params(sqlx::query(&query), &params)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;

        Ok(())
    }

    async fn delete_all(&self) -> Result<(), VectorStoreError> {
        if self.collection_info().await?.is_none() {
            return Ok(());
        }

        let query = format!("TRUNCATE TABLE {}", self.table_name);
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;

        Ok(())
    }

    async fn close(&self) -> Result<(), VectorStoreError> {
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;

    #[test]
    fn test_where_clause_numbering() {
        let filter = DocumentMetadataFilter {
            source: Some(Source::File),
            author: Some("ana".to_string()),
            start_date: Some("1970-01-02".to_string()),
            ..Default::default()
        };

        let (parts, params) = PgVectorBackend::where_clause(&filter, 2).unwrap();

        assert_eq!(
            parts,
            vec!["source = $2", "author = $3", "created_at_ts >= $4"]
        );
        assert_eq!(
            params,
            vec![
                SqlParam::Text("file".to_string()),
                SqlParam::Text("ana".to_string()),
                SqlParam::BigInt(86_400),
            ]
        );
    }

    #[test]
    fn test_where_clause_empty_filter() {
        let (parts, params) =
            PgVectorBackend::where_clause(&DocumentMetadataFilter::default(), 1).unwrap();
        assert!(parts.is_empty());
        assert!(params.is_empty());
    }
}
