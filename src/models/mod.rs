mod config;
mod document;
mod filter;
mod query;
mod source;

pub use config::{
    ChunkingConfig, CompletionConfig, Config, DEFAULT_COLLECTION, DEFAULT_COMPLETION_MODEL,
    DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_API_BASE,
    DEFAULT_QDRANT_URL, EmbeddingConfig, LoggingConfig, RetryConfig, SearchConfig, VectorDriver,
    VectorStoreConfig,
};
pub use document::{
    Document, DocumentChunk, DocumentChunkMetadata, DocumentChunkWithScore, DocumentMetadata,
    parse_timestamp,
};
pub use filter::{DateRange, DocumentMetadataFilter, FilterField};
pub use query::{DEFAULT_TOP_K, OutputFormat, Query, QueryResult};
pub use source::Source;
