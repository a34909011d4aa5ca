//! Embedding providers and the batching, retrying embedder built on them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::EmbeddingError;
use crate::models::{Config, EmbeddingConfig};
use crate::utils::RetryPolicy;

/// A service that turns texts into fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one batch of texts. The result has one vector per input, in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Dimensionality of the produced vectors.
    fn dimension(&self) -> usize;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| EmbeddingError::NotConfigured("OPENAI_API_KEY is not set".to_string()))?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            dimension: config.dimension as usize,
        })
    }

}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %self.model, batch_size = texts.len(), "embedding batch");

        let url = format!("{}/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else if e.is_connect() {
                    EmbeddingError::ConnectionError(e.to_string())
                } else {
                    EmbeddingError::RequestError(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(model = %self.model, status = status.as_u16(), "embedding request rejected");
            return Err(EmbeddingError::ServerError {
                status: status.as_u16(),
                message,
            });
        }

        let mut parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        // The API documents `index`; restore input order when it is present.
        if parsed.data.iter().all(|d| d.index.is_some()) {
            parsed.data.sort_by_key(|d| d.index);
        }

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Splits input into provider-sized batches and retries transient failures.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    retry: RetryPolicy,
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("model", &self.provider.model())
            .field("batch_size", &self.batch_size)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            retry,
        }
    }

    /// Build the OpenAI-backed embedder described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, EmbeddingError> {
        let provider = OpenAiEmbeddingProvider::new(&config.embedding)?;
        Ok(Self::new(
            Arc::new(provider),
            config.embedding.batch_size as usize,
            RetryPolicy::from_config(&config.retry),
        ))
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    /// Embed `texts`, returning one vector per input in input order.
    ///
    /// Sub-batches are sent sequentially; the first one that still fails after
    /// retries fails the whole call.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut embeddings = Vec::with_capacity(texts.len());

        for (batch_index, batch) in texts.chunks(self.batch_size).enumerate() {
            let vectors = self
                .retry
                .run("embed_batch", || self.provider.embed_batch(batch))
                .await?;

            if vectors.len() != batch.len() {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "expected {} embeddings in batch {}, got {}",
                    batch.len(),
                    batch_index,
                    vectors.len()
                )));
            }

            let expected = self.provider.dimension();
            if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "expected {}-dimensional embeddings, got {}",
                    expected,
                    bad.len()
                )));
            }

            embeddings.extend(vectors);
        }

        debug!(
            model = %self.provider.model(),
            count = embeddings.len(),
            "embedded texts"
        );
        Ok(embeddings)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic providers for exercising the pipeline without a network.

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    use super::*;

    pub const TEST_DIMENSION: usize = 64;

    /// Bag-of-words hashing provider: texts sharing words get similar vectors.
    #[derive(Debug, Default)]
    pub struct HashEmbeddingProvider {
        pub calls: AtomicUsize,
        pub batch_sizes: Mutex<Vec<usize>>,
    }

    impl HashEmbeddingProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn embed_text(text: &str) -> Vec<f32> {
            let mut vector = vec![0.0f32; TEST_DIMENSION];
            for word in text
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
            {
                let word = word.to_lowercase();
                vector[(fnv1a(word.as_bytes()) % TEST_DIMENSION as u64) as usize] += 1.0;
            }
            let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                vector.iter_mut().for_each(|x| *x /= norm);
            }
            vector
        }
    }

    fn fnv1a(bytes: &[u8]) -> u64 {
        bytes.iter().fold(0xcbf2_9ce4_8422_2325u64, |hash, b| {
            (hash ^ u64::from(*b)).wrapping_mul(0x0100_0000_01b3)
        })
    }

    #[async_trait]
    impl EmbeddingProvider for HashEmbeddingProvider {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batch_sizes
                .lock()
                .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?
                .push(texts.len());
            Ok(texts.iter().map(|t| Self::embed_text(t)).collect())
        }

        fn model(&self) -> &str {
            "hash"
        }

        fn dimension(&self) -> usize {
            TEST_DIMENSION
        }
    }

    /// Fails with `status` for the first `failures` calls, then delegates.
    #[derive(Debug)]
    pub struct FlakyProvider {
        pub remaining_failures: AtomicU32,
        pub status: u16,
        pub calls: AtomicUsize,
        inner: HashEmbeddingProvider,
    }

    impl FlakyProvider {
        pub fn new(failures: u32, status: u16) -> Self {
            Self {
                remaining_failures: AtomicU32::new(failures),
                status,
                calls: AtomicUsize::new(0),
                inner: HashEmbeddingProvider::new(),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .remaining_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(EmbeddingError::ServerError {
                    status: self.status,
                    message: "scripted failure".to_string(),
                });
            }
            self.inner.embed_batch(texts).await
        }

        fn model(&self) -> &str {
            "flaky"
        }

        fn dimension(&self) -> usize {
            TEST_DIMENSION
        }
    }

    /// Returns one vector fewer than requested.
    #[derive(Debug, Default)]
    pub struct ShortProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .skip(1)
                .map(|t| HashEmbeddingProvider::embed_text(t))
                .collect())
        }

        fn model(&self) -> &str {
            "short"
        }

        fn dimension(&self) -> usize {
            TEST_DIMENSION
        }
    }

    pub fn fast_retry() -> RetryPolicy {
        RetryPolicy::default().with_initial_delay(Duration::from_millis(1))
    }
}
