//! Environment-driven configuration.
//!
//! All settings are read once at startup into [`NewsWeaveConfig`] and passed
//! explicitly from there; nothing reaches into the environment later.
//! Malformed values fail eagerly as configuration errors, and the NewsAPI
//! credential is checked before any fetch is attempted rather than failing
//! mid-pipeline.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::NewsWeaveError;
use crate::inference::RetryPolicy;

const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
const DEFAULT_GENERATE_MODEL: &str = "llama3.1";
const DEFAULT_DB_PATH: &str = "newsweave.db";
const DEFAULT_OUTPUT_PATH: &str = "new-blog-post.md";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

/// Process configuration, loaded from the environment.
#[derive(Clone, Debug)]
pub struct NewsWeaveConfig {
    /// NewsAPI credential; absent until ingestion is actually used.
    pub newsapi_key: Option<String>,
    pub ollama_base_url: String,
    pub embed_model: String,
    pub generate_model: String,
    pub db_path: PathBuf,
    pub output_path: PathBuf,
    pub bind_addr: String,
    pub retrieval_k: usize,
    /// Timeout for inference and embedding calls.
    pub inference_timeout: Duration,
    /// Timeout for the upstream headline fetch.
    pub fetch_timeout: Duration,
    pub retry: RetryPolicy,
}

impl NewsWeaveConfig {
    /// Load configuration from the environment (after `dotenvy` has run).
    pub fn from_env() -> Result<Self, NewsWeaveError> {
        let retrieval_k = parsed_var("NEWSWEAVE_RETRIEVAL_K", 6usize)?;
        let inference_timeout_secs = parsed_var("NEWSWEAVE_INFERENCE_TIMEOUT_SECS", 120u64)?;
        let fetch_timeout_secs = parsed_var("NEWSWEAVE_FETCH_TIMEOUT_SECS", 15u64)?;
        let retry_attempts = parsed_var("NEWSWEAVE_RETRY_ATTEMPTS", 3u32)?;
        let retry_base_ms = parsed_var("NEWSWEAVE_RETRY_BASE_MS", 500u64)?;

        Ok(Self {
            newsapi_key: non_empty_var("NEWSAPI_KEY"),
            ollama_base_url: string_var("OLLAMA_BASE_URL", DEFAULT_OLLAMA_BASE_URL),
            embed_model: string_var("NEWSWEAVE_EMBED_MODEL", DEFAULT_EMBED_MODEL),
            generate_model: string_var("NEWSWEAVE_GENERATE_MODEL", DEFAULT_GENERATE_MODEL),
            db_path: PathBuf::from(string_var("NEWSWEAVE_DB_PATH", DEFAULT_DB_PATH)),
            output_path: PathBuf::from(string_var("NEWSWEAVE_OUTPUT_PATH", DEFAULT_OUTPUT_PATH)),
            bind_addr: string_var("NEWSWEAVE_BIND_ADDR", DEFAULT_BIND_ADDR),
            retrieval_k,
            inference_timeout: Duration::from_secs(inference_timeout_secs),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            retry: RetryPolicy {
                max_attempts: retry_attempts,
                base_delay: Duration::from_millis(retry_base_ms),
            },
        })
    }

    /// The NewsAPI credential, or a configuration error if unset. Called
    /// before any fetch so a missing key never surfaces mid-ingestion.
    pub fn require_newsapi_key(&self) -> Result<&str, NewsWeaveError> {
        self.newsapi_key
            .as_deref()
            .ok_or_else(|| NewsWeaveError::configuration("NEWSAPI_KEY is not set"))
    }
}

fn string_var(name: &str, default: &str) -> String {
    non_empty_var(name).unwrap_or_else(|| default.to_string())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T>(name: &str, default: T) -> Result<T, NewsWeaveError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_var(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|err| {
            NewsWeaveError::configuration(format!("invalid {name} value '{raw}': {err}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_newsapi_key_is_a_configuration_error() {
        let config = NewsWeaveConfig {
            newsapi_key: None,
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.into(),
            embed_model: DEFAULT_EMBED_MODEL.into(),
            generate_model: DEFAULT_GENERATE_MODEL.into(),
            db_path: DEFAULT_DB_PATH.into(),
            output_path: DEFAULT_OUTPUT_PATH.into(),
            bind_addr: DEFAULT_BIND_ADDR.into(),
            retrieval_k: 6,
            inference_timeout: Duration::from_secs(120),
            fetch_timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
        };
        let err = config.require_newsapi_key().unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn parsed_var_rejects_garbage() {
        // SAFETY: test-local variable name, no other thread reads it.
        unsafe { env::set_var("NEWSWEAVE_TEST_PARSE_GARBAGE", "not-a-number") };
        let result: Result<u32, _> = parsed_var("NEWSWEAVE_TEST_PARSE_GARBAGE", 1u32);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), "configuration");
        unsafe { env::remove_var("NEWSWEAVE_TEST_PARSE_GARBAGE") };
    }
}
