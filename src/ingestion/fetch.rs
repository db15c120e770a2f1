//! Upstream headline fetch (NewsAPI `top-headlines`).
//!
//! Thin I/O wrapper: GET the technology headlines, map the wire records into
//! [`Article`] values with URL-derived ids, and hand them to the ingestor.
//! Non-success statuses surface as upstream fetch errors.

use std::time::Duration;

use serde::Deserialize;
use tracing::instrument;

use crate::articles::Article;
use crate::errors::NewsWeaveError;
use crate::inference::RetryPolicy;

const DEFAULT_BASE_URL: &str = "https://newsapi.org";
const HEADLINE_QUERY: &str = "AI OR artificial intelligence OR machine learning";
const PAGE_SIZE: u32 = 50;

#[derive(Deserialize)]
struct HeadlinesResponse {
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Deserialize)]
struct RawArticle {
    source: Option<RawSource>,
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    url: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
}

#[derive(Deserialize)]
struct RawSource {
    name: Option<String>,
}

/// Client for the external news headline source.
pub struct NewsApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl NewsApiClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_key, timeout, retry)
    }

    /// Override the endpoint base URL (used by tests against a mock server).
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
            retry,
        }
    }

    /// Fetch current technology headlines as normalized articles.
    ///
    /// Returns the full fetched batch including articles that will later be
    /// skipped for empty text, so callers can report `fetched` vs `indexed`.
    #[instrument(skip(self))]
    pub async fn fetch_top_headlines(&self) -> Result<Vec<Article>, NewsWeaveError> {
        self.retry.run(|_| self.request_headlines()).await
    }

    async fn request_headlines(&self) -> Result<Vec<Article>, NewsWeaveError> {
        let url = format!("{}/v2/top-headlines", self.base_url);
        let page_size = PAGE_SIZE.to_string();
        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("category", "technology"),
                ("pageSize", page_size.as_str()),
                ("language", "en"),
                ("q", HEADLINE_QUERY),
            ])
            .send()
            .await
            .map_err(|err| NewsWeaveError::upstream(format!("news source unreachable: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NewsWeaveError::upstream(format!(
                "news source returned {status}: {body}"
            )));
        }

        let parsed: HeadlinesResponse = response
            .json()
            .await
            .map_err(|err| NewsWeaveError::upstream(format!("malformed news response: {err}")))?;

        Ok(parsed
            .articles
            .into_iter()
            .enumerate()
            .map(|(idx, raw)| Article {
                id: Article::derive_id(raw.url.as_deref(), idx),
                title: raw.title,
                description: raw.description,
                content: raw.content,
                url: raw.url,
                source: raw.source.and_then(|s| s.name),
                published_at: raw.published_at,
            })
            .collect())
    }
}
