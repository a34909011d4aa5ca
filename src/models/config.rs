use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "documents";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Upper bound for a single upsert/query/delete; unset means no limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_timeout_secs: Option<u64>,
}

impl Config {
    pub fn config_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|p| p.join("doc-retrieval").join("config.toml"))
    }

    /// Load the config file (if any), then apply environment overrides.
    ///
    /// A `.env` file in the working directory is read first so its values
    /// take part in the overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let mut config = Self::load_file()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load only the config file, without environment overrides.
    pub fn load_file() -> Result<Self, ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            return Ok(config);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Apply overrides from environment-style variables.
    pub fn apply_env_overrides<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(driver) = get("DATASTORE").and_then(|v| v.parse().ok()) {
            self.vector_store.driver = driver;
        }
        if let Some(api_key) = get("OPENAI_API_KEY") {
            self.embedding.api_key = Some(api_key.clone());
            self.completion.api_key = Some(api_key);
        }
        if let Some(api_base) = get("OPENAI_API_BASE") {
            self.embedding.api_base = api_base.clone();
            self.completion.api_base = api_base;
        }
        if let Some(model) = get("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(dimension) = get("EMBEDDING_DIMENSION").and_then(|v| v.parse().ok()) {
            self.embedding.dimension = dimension;
        }
        if let Some(collection) = get("QDRANT_COLLECTION") {
            self.vector_store.collection = collection;
        }
        match self.vector_store.driver {
            VectorDriver::Qdrant => {
                if let Some(url) = get("QDRANT_URL") {
                    self.vector_store.url = url;
                }
                if let Some(api_key) = get("QDRANT_API_KEY") {
                    self.vector_store.api_key = Some(api_key);
                }
            }
            VectorDriver::PostgreSQL => {
                if let Some(url) = get("DATABASE_URL") {
                    self.vector_store.url = url;
                }
            }
            VectorDriver::Memory => {}
        }
    }

    /// Set a dotted key such as `chunking.chunk_size` from its string form.
    ///
    /// The result is re-validated; unknown keys are rejected.
    pub fn set_value(&mut self, key: &str, raw: &str) -> Result<(), ConfigError> {
        let mut root = toml::Value::try_from(&*self)?;

        let (path, leaf) = match key.rsplit_once('.') {
            Some((path, leaf)) => (Some(path), leaf),
            None => (None, key),
        };

        let mut table = root
            .as_table_mut()
            .ok_or_else(|| ConfigError::ValidationError("config is not a table".to_string()))?;
        for part in path.into_iter().flat_map(|p| p.split('.')) {
            table = table
                .entry(part)
                .or_insert_with(|| toml::Value::Table(toml::Table::new()))
                .as_table_mut()
                .ok_or_else(|| ConfigError::ValidationError(format!("'{}' is not a section", part)))?;
        }
        table.insert(leaf.to_string(), parse_scalar(raw));

        let updated: Config = root.try_into()?;
        let check = toml::Value::try_from(&updated)?;
        if key.split('.').try_fold(&check, |v, part| v.get(part)).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "unknown configuration key: {}",
                key
            )));
        }

        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }
        if self.search.default_top_k == 0 {
            return Err(ConfigError::ValidationError(
                "search.default_top_k must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Interpret a command-line value as the most specific TOML scalar.
fn parse_scalar(raw: &str) -> toml::Value {
    let trimmed = raw.trim();
    if let Some(quoted) = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    {
        return toml::Value::String(quoted.to_string());
    }
    if let Ok(b) = trimmed.parse::<bool>() {
        return toml::Value::Boolean(b);
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return toml::Value::Integer(n);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return toml::Value::Float(f);
    }
    toml::Value::String(trimmed.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_dimension")]
    pub dimension: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum number of texts sent to the provider in one request.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_api_base() -> String {
    DEFAULT_OPENAI_API_BASE.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_timeout() -> u64 {
    60
}

fn default_batch_size() -> u32 {
    128
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_completion_model() -> String {
    DEFAULT_COMPLETION_MODEL.to_string()
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: default_completion_model(),
            temperature: 0.0,
            timeout_secs: default_timeout(),
        }
    }
}

/// Vector store backend kind, chosen once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    /// In-process store; contents are lost when the process exits.
    Memory,
    #[default]
    Qdrant,
    #[serde(rename = "postgresql", alias = "postgres", alias = "pgvector")]
    PostgreSQL,
}

impl fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorDriver::Memory => write!(f, "memory"),
            VectorDriver::Qdrant => write!(f, "qdrant"),
            VectorDriver::PostgreSQL => write!(f, "postgresql"),
        }
    }
}

impl std::str::FromStr for VectorDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "inmemory" => Ok(VectorDriver::Memory),
            "qdrant" => Ok(VectorDriver::Qdrant),
            "postgresql" | "postgres" | "pgvector" => Ok(VectorDriver::PostgreSQL),
            _ => Err(format!("unknown vector store driver: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    /// Qdrant URL or PostgreSQL connection string, depending on `driver`.
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Qdrant collection or PostgreSQL table name.
    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// PostgreSQL schema holding the table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,

    #[serde(default = "default_pool_acquire_timeout")]
    pub pool_acquire_timeout: u32,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_pool_max() -> u32 {
    10
}

fn default_pool_acquire_timeout() -> u32 {
    30
}

impl VectorStoreConfig {
    pub fn memory() -> Self {
        Self {
            driver: VectorDriver::Memory,
            ..Default::default()
        }
    }

    /// Table name qualified with the schema, if one is configured.
    pub fn qualified_table_name(&self) -> String {
        match self.schema {
            Some(ref schema) => format!("{}.{}", schema, self.collection),
            None => self.collection.clone(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
            schema: None,
            pool_max: default_pool_max(),
            pool_acquire_timeout: default_pool_acquire_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in tokens (approximately 4 characters each).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Tokens shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    /// Upper bound on chunks produced for a single document.
    #[serde(default = "default_max_chunks")]
    pub max_chunks: u32,

    /// Largest file accepted by `upsert-file`, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_chunk_size() -> u32 {
    200
}

fn default_chunk_overlap() -> u32 {
    0
}

fn default_max_chunks() -> u32 {
    10_000
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_chunks: default_max_chunks(),
            max_file_size: default_max_file_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    #[serde(default)]
    pub default_format: super::OutputFormat,
}

fn default_top_k() -> usize {
    super::DEFAULT_TOP_K
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            default_format: super::OutputFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    20_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level or `EnvFilter` directive, e.g. `"warn"` or `"info,doc_retrieval=debug"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
