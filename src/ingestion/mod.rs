//! Ingestion: turning raw articles into index entries.
//!
//! The ingestor normalizes [`Article`] records, skips documents whose joined
//! text is blank, embeds the surviving batch in one provider call, and writes
//! the whole batch through a single store upsert. Embedding the batch before
//! touching the store makes ingestion atomic: an unreachable embedding
//! provider leaves the index untouched.

pub mod fetch;

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::articles::Article;
use crate::embeddings::EmbeddingProvider;
use crate::errors::NewsWeaveError;
use crate::store::{EntryMetadata, IndexEntry, VectorStore};

pub use fetch::NewsApiClient;

/// Normalizes articles into index entries and upserts them.
pub struct ArticleIngestor {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl ArticleIngestor {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Ingest a batch of articles. Returns the number of entries actually
    /// written; articles with empty document text are skipped and excluded
    /// from the count.
    #[instrument(skip_all, fields(batch = articles.len()))]
    pub async fn ingest(&self, articles: &[Article]) -> Result<usize, NewsWeaveError> {
        if articles.is_empty() {
            return Ok(0);
        }

        let mut pending: Vec<(String, String, EntryMetadata)> = Vec::new();
        for article in articles {
            let Some(document_text) = article.document_text() else {
                debug!(id = %article.id, "skipping article with empty document text");
                continue;
            };
            pending.push((
                article.id.clone(),
                document_text,
                EntryMetadata {
                    title: article.title.clone(),
                    url: article.url.clone(),
                    source: article.source.clone(),
                    published_at: article.published_at.clone(),
                },
            ));
        }

        if pending.is_empty() {
            return Ok(0);
        }

        // One batched embedding call; failure here means nothing is written.
        let documents: Vec<String> = pending.iter().map(|(_, doc, _)| doc.clone()).collect();
        let embeddings = self.embedder.embed_batch(&documents).await?;
        if embeddings.len() != pending.len() {
            return Err(NewsWeaveError::inference(format!(
                "embedding count mismatch during ingestion: {} documents, {} vectors",
                pending.len(),
                embeddings.len()
            )));
        }

        let entries: Vec<IndexEntry> = pending
            .into_iter()
            .zip(embeddings)
            .map(|((id, document_text, metadata), embedding)| IndexEntry {
                id,
                embedding,
                document_text,
                metadata,
            })
            .collect();

        let written = self.store.upsert(entries).await?;
        debug!(written, "ingestion batch complete");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbedder;
    use crate::store::SqliteNewsStore;

    fn article(id: &str, title: Option<&str>, content: Option<&str>) -> Article {
        Article {
            id: id.to_string(),
            title: title.map(str::to_string),
            content: content.map(str::to_string),
            ..Default::default()
        }
    }

    async fn ingestor() -> (ArticleIngestor, Arc<SqliteNewsStore>) {
        let store = Arc::new(SqliteNewsStore::open_in_memory().await.unwrap());
        let ingestor = ArticleIngestor::new(store.clone(), Arc::new(MockEmbedder::new()));
        (ingestor, store)
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let (ingestor, store) = ingestor().await;
        assert_eq!(ingestor.ingest(&[]).await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn blank_articles_are_skipped_and_not_counted() {
        let (ingestor, store) = ingestor().await;
        let batch = vec![
            article("a1", Some("Title"), Some("Body")),
            article("a2", Some("  "), None),
        ];
        assert_eq!(ingestor.ingest(&batch).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.get("a2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reingesting_same_id_replaces_content() {
        let (ingestor, store) = ingestor().await;
        ingestor
            .ingest(&[article("a1", Some("X"), Some("body"))])
            .await
            .unwrap();
        ingestor
            .ingest(&[article("a1", Some("X2"), Some("body2"))])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        let entry = store.get("a1").await.unwrap().unwrap();
        assert_eq!(entry.document_text, "X2\n\nbody2");
        assert_eq!(entry.metadata.title.as_deref(), Some("X2"));
    }
}
