//! Topic retrieval: embed a query topic and fetch the nearest index entries.
//!
//! This is a pure read path. It never mutates the index, and the defined
//! no-ops (blank topic, `k = 0`) short-circuit before touching either the
//! embedding provider or the store.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::embeddings::EmbeddingProvider;
use crate::errors::NewsWeaveError;
use crate::store::{RetrievedChunk, VectorStore};

/// Embeds topics and queries the vector index for grounding context.
pub struct RetrievalService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl RetrievalService {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Top-`k` chunks most relevant to `topic`, most similar first.
    ///
    /// A blank topic or `k = 0` yields an empty sequence without touching
    /// the index. Scores stay internal; only ordering is exposed.
    #[instrument(skip(self))]
    pub async fn retrieve(
        &self,
        topic: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, NewsWeaveError> {
        if topic.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(topic).await?;
        let scored = self.store.query(&query_vector, k).await?;
        debug!(results = scored.len(), "retrieval query complete");
        Ok(scored
            .into_iter()
            .map(|(entry, _score)| RetrievedChunk::from_entry(entry))
            .collect())
    }
}
