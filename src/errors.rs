//! Error taxonomy shared across the crate.
//!
//! Every fallible operation returns [`NewsWeaveError`]. Each variant maps to a
//! stable machine-readable kind (see [`NewsWeaveError::kind`]) so the HTTP
//! layer and callers can branch without parsing messages.
//!
//! Defined no-ops are *not* errors: a blank topic yields an empty retrieval
//! result, and an article whose joined document text is empty is skipped
//! during ingestion.

use thiserror::Error;

/// Unified error type for ingestion, retrieval, and pipeline execution.
#[derive(Debug, Error)]
pub enum NewsWeaveError {
    /// Required credential or setting is missing or malformed. Detected
    /// eagerly, before any network call is attempted.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller-supplied input is invalid (blank topic, malformed record).
    #[error("validation error: {0}")]
    Validation(String),

    /// The external article source is unreachable or returned a non-success
    /// status.
    #[error("upstream fetch error: {0}")]
    UpstreamFetch(String),

    /// Vector index read/write failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Embedding or language-model call failed, timed out, or returned a
    /// malformed response.
    #[error("inference error: {0}")]
    Inference(String),

    /// The caller cancelled a pipeline run; aborts at the next stage boundary.
    #[error("run cancelled: {0}")]
    Cancelled(String),
}

impl NewsWeaveError {
    /// Stable kind identifier, independent of the human-readable message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Validation(_) => "validation",
            Self::UpstreamFetch(_) => "upstream_fetch",
            Self::Storage(_) => "storage",
            Self::Inference(_) => "inference",
            Self::Cancelled(_) => "cancelled",
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamFetch(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(NewsWeaveError::configuration("x").kind(), "configuration");
        assert_eq!(NewsWeaveError::validation("x").kind(), "validation");
        assert_eq!(NewsWeaveError::upstream("x").kind(), "upstream_fetch");
        assert_eq!(NewsWeaveError::storage("x").kind(), "storage");
        assert_eq!(NewsWeaveError::inference("x").kind(), "inference");
        assert_eq!(NewsWeaveError::Cancelled("x".into()).kind(), "cancelled");
    }

    #[test]
    fn messages_carry_kind_prefix() {
        let err = NewsWeaveError::storage("disk full");
        assert_eq!(err.to_string(), "storage error: disk full");
    }
}
