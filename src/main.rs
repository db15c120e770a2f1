use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use newsweave::config::NewsWeaveConfig;
use newsweave::embeddings::OllamaEmbedder;
use newsweave::ingestion::{ArticleIngestor, NewsApiClient};
use newsweave::inference::OllamaClient;
use newsweave::pipeline::{FsArticleSink, StagePipeline};
use newsweave::retrieval::RetrievalService;
use newsweave::server::{AppState, router};
use newsweave::stages::news_stages;
use newsweave::store::SqliteNewsStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = NewsWeaveConfig::from_env()?;
    info!(db = %config.db_path.display(), "opening news vector index");

    let store = Arc::new(SqliteNewsStore::open(&config.db_path).await?);
    let embedder = Arc::new(OllamaEmbedder::new(
        &config.ollama_base_url,
        &config.embed_model,
        config.inference_timeout,
        config.retry,
    ));
    let inference = Arc::new(OllamaClient::new(
        &config.ollama_base_url,
        &config.generate_model,
        config.inference_timeout,
        config.retry,
    ));

    let ingestor = Arc::new(ArticleIngestor::new(store.clone(), embedder.clone()));
    let retrieval = Arc::new(RetrievalService::new(store, embedder));
    let pipeline = Arc::new(
        StagePipeline::new(
            news_stages(&config.output_path),
            retrieval,
            inference,
            Arc::new(FsArticleSink),
        )
        .with_retrieval_k(config.retrieval_k),
    );

    let news = match config.require_newsapi_key() {
        Ok(key) => Some(Arc::new(NewsApiClient::new(
            key,
            config.fetch_timeout,
            config.retry,
        ))),
        Err(err) => {
            info!(%err, "/refresh-news will return a configuration error");
            None
        }
    };

    let app = router(AppState {
        ingestor,
        news,
        pipeline,
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "newsweave listening");
    axum::serve(listener, app).await?;
    Ok(())
}
