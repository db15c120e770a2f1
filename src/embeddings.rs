//! Embedding providers.
//!
//! The embedding model is an external capability: text in, fixed-length
//! vector out. [`EmbeddingProvider`] is the seam; [`OllamaEmbedder`] talks to
//! an Ollama-compatible `/api/embed` endpoint, and [`MockEmbedder`] produces
//! deterministic vectors for tests and offline runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::NewsWeaveError;
use crate::inference::RetryPolicy;

/// Maps text to fixed-length numeric vectors for similarity comparison.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts. The result has one vector per input, in input
    /// order. Implementations must be consistent: the same text always maps
    /// to the same vector within a process.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, NewsWeaveError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, NewsWeaveError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| NewsWeaveError::inference("embedding provider returned no vector"))
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// HTTP embedding provider for Ollama-compatible servers.
pub struct OllamaEmbedder {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout: std::time::Duration,
    retry: RetryPolicy,
}

impl OllamaEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: std::time::Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
            retry,
        }
    }

    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, NewsWeaveError> {
        let url = format!("{}/api/embed", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|err| NewsWeaveError::inference(format!("embedding request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NewsWeaveError::inference(format!(
                "embedding endpoint returned {status}: {body}"
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|err| NewsWeaveError::inference(format!("malformed embedding response: {err}")))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(NewsWeaveError::inference(format!(
                "embedding count mismatch: requested {}, received {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, NewsWeaveError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.retry
            .run(|attempt| {
                if attempt > 1 {
                    debug!(attempt, "retrying embedding request");
                }
                self.request_batch(texts)
            })
            .await
    }
}

/// Deterministic pseudo-embedder for tests and CI.
///
/// Vectors are derived from an FNV-style hash of the input text, so identical
/// texts always map to identical vectors and distinct texts almost always
/// differ. Vectors are unit-normalized so cosine ranking behaves sensibly.
#[derive(Clone, Debug)]
pub struct MockEmbedder {
    dimension: usize,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self { dimension: 16 }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut seed: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.as_bytes() {
            seed ^= u64::from(*byte);
            seed = seed.wrapping_mul(0x0000_0100_0000_01b3);
        }
        let mut state = seed | 1;
        let mut vector = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let unit = f64::from((state >> 32) as u32) / f64::from(u32::MAX);
            vector.push((unit * 2.0 - 1.0) as f32);
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, NewsWeaveError> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}
