pub mod chat;
pub mod chunker;
pub mod completion;
pub mod datastore;
pub mod embedding;
pub mod vector_store;

pub use chat::{ChatAnswer, ChatService};
pub use chunker::{TextChunker, estimate_tokens};
pub use completion::{ChatMessage, CompletionProvider, OpenAiCompletionProvider};
pub use datastore::DataStore;
pub use embedding::{Embedder, EmbeddingProvider, OpenAiEmbeddingProvider};
pub use vector_store::{
    CollectionInfo, MemoryBackend, PgVectorBackend, QdrantBackend, VectorStore, create_backend,
};
