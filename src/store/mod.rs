//! Storage backends for the news vector index.
//!
//! The [`VectorStore`] trait abstracts the persistent id → (embedding,
//! document, metadata) mapping so callers are not tied to one database. The
//! shipped backend is [`sqlite::SqliteNewsStore`], SQLite with vector search
//! via `sqlite-vec`.
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │ VectorStore trait│
//!                  │   (async CRUD)   │
//!                  └────────┬─────────┘
//!                           │
//!                           ▼
//!                  ┌──────────────────┐
//!                  │     SQLite       │
//!                  │   sqlite-vec     │
//!                  └──────────────────┘
//! ```
//!
//! The store handle is constructed once at process start and injected into
//! the ingestor and retrieval service; it is never reached through an
//! ambient global.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::NewsWeaveError;

pub use sqlite::SqliteNewsStore;

/// Source metadata carried alongside each indexed document.
///
/// All fields are optional; only present fields are rendered into prompt
/// context blocks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub title: Option<String>,
    pub url: Option<String>,
    pub source: Option<String>,
    pub published_at: Option<String>,
}

/// One stored unit of the vector index: embedding, raw document text, and
/// source metadata, keyed by a stable article id.
///
/// Invariant: `document_text` is never empty for a stored entry. The ingestor
/// enforces this by skipping articles whose joined text is blank.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub embedding: Vec<f32>,
    pub document_text: String,
    pub metadata: EntryMetadata,
}

/// Read view of an [`IndexEntry`] returned by a similarity query.
///
/// The similarity score itself is not exposed downstream; only the ordering
/// of chunks carries ranking information.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub source: Option<String>,
    pub published_at: Option<String>,
}

impl RetrievedChunk {
    /// Build a chunk view from a stored entry.
    #[must_use]
    pub fn from_entry(entry: IndexEntry) -> Self {
        Self {
            chunk: entry.document_text,
            title: entry.metadata.title,
            url: entry.metadata.url,
            source: entry.metadata.source,
            published_at: entry.metadata.published_at,
        }
    }
}

/// Persistent mapping from document id to (embedding, text, metadata),
/// queryable by nearest-neighbor similarity.
///
/// # Contract
///
/// * `upsert` replaces existing ids wholesale (last-write-wins) and returns
///   the number of entries written; an empty input returns 0 without I/O.
///   Concurrent upserts are mutually exclusive.
/// * `query` returns entries ordered by descending similarity, ties broken
///   by insertion order (earlier first). Querying an empty index yields an
///   empty sequence, never an error. Reads do not mutate the index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert-or-replace a batch of entries. Returns the count written.
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<usize, NewsWeaveError>;

    /// Top-`k` nearest entries to `query_vector`, most similar first.
    async fn query(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<(IndexEntry, f32)>, NewsWeaveError>;

    /// Fetch one entry by id.
    async fn get(&self, id: &str) -> Result<Option<IndexEntry>, NewsWeaveError>;

    /// Total number of stored entries.
    async fn count(&self) -> Result<usize, NewsWeaveError>;
}
