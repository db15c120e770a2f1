//! Shared article data model.
//!
//! An [`Article`] is the transient input record for ingestion: it exists only
//! long enough to be converted into an index entry. All fields except `id`
//! are optional; `id` derives from the article URL when present so that
//! repeated ingestion of the same logical article is stable, with a
//! positional fallback for records that carry no URL.

use serde::{Deserialize, Serialize};

/// A raw news article as handed to the ingestor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
    pub source: Option<String>,
    pub published_at: Option<String>,
}

impl Article {
    /// Derive a stable article id: the source URL when present, otherwise a
    /// positional fallback for this batch.
    #[must_use]
    pub fn derive_id(url: Option<&str>, position: usize) -> String {
        match url {
            Some(u) if !u.trim().is_empty() => u.to_string(),
            _ => format!("article-{position}"),
        }
    }

    /// Join title, description, and content into the indexed document text.
    ///
    /// Blank parts are skipped; returns `None` when every part is blank,
    /// which signals the ingestor to skip the article entirely.
    #[must_use]
    pub fn document_text(&self) -> Option<String> {
        let parts: Vec<&str> = [
            self.title.as_deref(),
            self.description.as_deref(),
            self.content.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|p| !p.trim().is_empty())
        .collect();

        if parts.is_empty() {
            return None;
        }
        let joined = parts.join("\n\n");
        if joined.trim().is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}
