//! # NewsWeave: Retrieval-Augmented News Article Generation
//!
//! NewsWeave ingests short news documents into a persistent vector index,
//! retrieves the most relevant entries for a user-supplied topic, and drives
//! a sequential two-stage generation pipeline (research, then writing) that
//! produces a markdown article grounded in the retrieved context.
//!
//! ```text
//! NewsAPI ──► ingestion::NewsApiClient ──► Article batch
//!                                              │
//!                         ingestion::ArticleIngestor
//!                         (embed batch, single upsert)
//!                                              │
//!                                              ▼
//!                               stores ──► SqliteNewsStore
//!                                          (sqlite-vec index)
//!                                              ▲
//! topic ──► retrieval::RetrievalService ───────┘
//!                 │
//!                 ▼
//!        context::PromptContext ──► pipeline::StagePipeline ──► article
//!                                        │         ▲
//!                                        ▼         │
//!                               inference::InferenceClient
//! ```
//!
//! The embedding model and the language model are opaque external services
//! behind the [`embeddings::EmbeddingProvider`] and
//! [`inference::InferenceClient`] seams; the shipped implementations speak
//! the Ollama HTTP API. The store handle is constructed once at process
//! start and injected everywhere it is needed.

pub mod articles;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod errors;
pub mod ingestion;
pub mod inference;
pub mod pipeline;
pub mod retrieval;
pub mod server;
pub mod stages;
pub mod store;

pub use articles::Article;
pub use config::NewsWeaveConfig;
pub use context::PromptContext;
pub use errors::NewsWeaveError;
pub use pipeline::{CancelHandle, DelegationPolicy, PipelineRun, RunStatus, StagePipeline};
pub use retrieval::RetrievalService;
pub use stages::{Capability, StageConfig, TaskSpec, news_stages};
pub use store::{IndexEntry, RetrievedChunk, SqliteNewsStore, VectorStore};
