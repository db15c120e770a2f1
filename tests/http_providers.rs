//! HTTP provider tests against a local mock server: the Ollama embedding and
//! generation clients and the NewsAPI headline fetch, including retry
//! behavior at the client boundary.

use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use newsweave::embeddings::{EmbeddingProvider, OllamaEmbedder};
use newsweave::inference::{InferenceClient, OllamaClient, RetryPolicy};
use newsweave::ingestion::NewsApiClient;

fn no_retry() -> RetryPolicy {
    RetryPolicy::none()
}

fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts: attempts,
        base_delay: Duration::ZERO,
    }
}

#[tokio::test]
async fn embedder_parses_batch_response() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/embed");
            then.status(200)
                .json_body(json!({ "embeddings": [[0.1, 0.2], [0.3, 0.4]] }));
        })
        .await;

    let embedder = OllamaEmbedder::new(
        server.base_url(),
        "nomic-embed-text",
        Duration::from_secs(5),
        no_retry(),
    );
    let vectors = embedder
        .embed_batch(&["first".into(), "second".into()])
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
}

#[tokio::test]
async fn embedder_rejects_count_mismatch() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/embed");
            then.status(200).json_body(json!({ "embeddings": [[0.1]] }));
        })
        .await;

    let embedder = OllamaEmbedder::new(
        server.base_url(),
        "nomic-embed-text",
        Duration::from_secs(5),
        no_retry(),
    );
    let err = embedder
        .embed_batch(&["first".into(), "second".into()])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "inference");
}

#[tokio::test]
async fn embedder_retries_up_to_max_attempts() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/embed");
            then.status(500).body("overloaded");
        })
        .await;

    let embedder = OllamaEmbedder::new(
        server.base_url(),
        "nomic-embed-text",
        Duration::from_secs(5),
        fast_retry(3),
    );
    let err = embedder.embed_batch(&["text".into()]).await.unwrap_err();
    assert_eq!(err.kind(), "inference");
    assert_eq!(mock.hits_async().await, 3);
}

#[tokio::test]
async fn generate_returns_response_text() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .json_body_partial(r#"{"model": "llama3.1", "stream": false}"#);
            then.status(200)
                .json_body(json!({ "response": "generated article text" }));
        })
        .await;

    let client = OllamaClient::new(
        server.base_url(),
        "llama3.1",
        Duration::from_secs(5),
        no_retry(),
    );
    let text = client.generate("write about AI").await.unwrap();
    mock.assert_async().await;
    assert_eq!(text, "generated article text");
}

#[tokio::test]
async fn generate_maps_http_failure_to_inference_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(503).body("down");
        })
        .await;

    let client = OllamaClient::new(
        server.base_url(),
        "llama3.1",
        Duration::from_secs(5),
        no_retry(),
    );
    let err = client.generate("prompt").await.unwrap_err();
    assert_eq!(err.kind(), "inference");
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn headlines_map_to_articles_with_stable_ids() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v2/top-headlines")
                .query_param("apiKey", "test-key")
                .query_param("category", "technology");
            then.status(200).json_body(json!({
                "status": "ok",
                "articles": [
                    {
                        "source": { "id": null, "name": "Example Wire" },
                        "title": "AI breakthrough",
                        "description": "A description",
                        "content": "Full content",
                        "url": "https://example.com/story",
                        "publishedAt": "2025-11-02T10:30:00Z"
                    },
                    {
                        "source": null,
                        "title": "Untitled source",
                        "description": null,
                        "content": "Body only",
                        "url": null,
                        "publishedAt": null
                    }
                ]
            }));
        })
        .await;

    let client = NewsApiClient::with_base_url(
        server.base_url(),
        "test-key",
        Duration::from_secs(5),
        no_retry(),
    );
    let articles = client.fetch_top_headlines().await.unwrap();

    mock.assert_async().await;
    assert_eq!(articles.len(), 2);
    assert_eq!(articles[0].id, "https://example.com/story");
    assert_eq!(articles[0].source.as_deref(), Some("Example Wire"));
    assert_eq!(
        articles[0].published_at.as_deref(),
        Some("2025-11-02T10:30:00Z")
    );
    assert_eq!(articles[1].id, "article-1");
    assert!(articles[1].source.is_none());
}

#[tokio::test]
async fn non_success_headline_status_is_upstream_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v2/top-headlines");
            then.status(401).body("bad key");
        })
        .await;

    let client = NewsApiClient::with_base_url(
        server.base_url(),
        "wrong-key",
        Duration::from_secs(5),
        no_retry(),
    );
    let err = client.fetch_top_headlines().await.unwrap_err();
    assert_eq!(err.kind(), "upstream_fetch");
}
