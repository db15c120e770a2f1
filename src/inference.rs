//! Language-model inference clients.
//!
//! The model is an opaque external service: prompt in, generated text out.
//! [`InferenceClient`] is the seam the pipeline calls through;
//! [`OllamaClient`] implements it over an Ollama-compatible `/api/generate`
//! endpoint, and [`MockInference`] serves scripted responses in tests.
//!
//! Retries live here, at the client boundary, never in the pipeline loop:
//! the pipeline's external contract stays single-attempt-per-stage while the
//! client may make bounded, backed-off attempts underneath.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::NewsWeaveError;

/// Bounded retry with exponential backoff.
///
/// `max_attempts = 1` disables retry entirely. Delay before attempt `n + 1`
/// is `base_delay * 2^(n - 1)`, so the schedule for the default policy is
/// 500ms, 1s.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Single-attempt policy (no retry).
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Backoff delay after a failed `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run `op` up to `max_attempts` times, sleeping between failures.
    /// The attempt number (1-based) is passed to `op`.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, NewsWeaveError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, NewsWeaveError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt < attempts {
                        let delay = self.delay_after(attempt);
                        debug!(attempt, ?delay, error = %err, "attempt failed, backing off");
                        tokio::time::sleep(delay).await;
                    }
                    last_err = Some(err);
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| NewsWeaveError::inference("retry loop ran zero attempts")))
    }
}

/// Given a prompt, returns generated text from a language model.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, NewsWeaveError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// HTTP inference client for Ollama-compatible servers.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
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

    async fn request_generate(&self, prompt: &str) -> Result<String, NewsWeaveError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|err| NewsWeaveError::inference(format!("inference request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NewsWeaveError::inference(format!(
                "inference endpoint returned {status}: {body}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|err| NewsWeaveError::inference(format!("malformed inference response: {err}")))?;
        Ok(parsed.response)
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, NewsWeaveError> {
        self.retry
            .run(|attempt| {
                if attempt > 1 {
                    debug!(attempt, "retrying inference request");
                }
                self.request_generate(prompt)
            })
            .await
    }
}

/// Scripted inference client for tests.
///
/// Responses are served in order; `Err` entries surface as inference errors.
/// Every received prompt is recorded for assertions.
pub struct MockInference {
    responses: Mutex<std::collections::VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockInference {
    pub fn with_responses(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, in call order.
    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl InferenceClient for MockInference {
    async fn generate(&self, prompt: &str) -> Result<String, NewsWeaveError> {
        self.prompts.lock().push(prompt.to_string());
        match self.responses.lock().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(NewsWeaveError::inference(message)),
            None => Err(NewsWeaveError::inference("mock response queue exhausted")),
        }
    }
}
