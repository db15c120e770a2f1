//! End-to-end pipeline tests with deterministic mock embeddings and scripted
//! inference responses.

use std::sync::Arc;

use newsweave::articles::Article;
use newsweave::embeddings::MockEmbedder;
use newsweave::inference::MockInference;
use newsweave::ingestion::ArticleIngestor;
use newsweave::pipeline::{
    CancelHandle, DelegationPolicy, FsArticleSink, NullArticleSink, RunStatus, StagePipeline,
};
use newsweave::retrieval::RetrievalService;
use newsweave::stages::{Capability, StageConfig, TaskSpec, news_stages};
use newsweave::store::SqliteNewsStore;

async fn empty_retrieval() -> Arc<RetrievalService> {
    let store = Arc::new(SqliteNewsStore::open_in_memory().await.unwrap());
    Arc::new(RetrievalService::new(store, Arc::new(MockEmbedder::new())))
}

async fn seeded_retrieval(articles: &[Article]) -> Arc<RetrievalService> {
    let store = Arc::new(SqliteNewsStore::open_in_memory().await.unwrap());
    let embedder = Arc::new(MockEmbedder::new());
    let ingestor = ArticleIngestor::new(store.clone(), embedder.clone());
    ingestor.ingest(articles).await.unwrap();
    Arc::new(RetrievalService::new(store, embedder))
}

fn article(id: &str, title: &str, content: &str) -> Article {
    Article {
        id: id.to_string(),
        title: Some(title.to_string()),
        content: Some(content.to_string()),
        source: Some("Test Wire".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn run_without_context_completes_with_general_knowledge_prompt() {
    let inference = Arc::new(MockInference::with_responses(vec![
        Ok("research findings".into()),
        Ok("# Quantum Computing\n\nA clear overview.".into()),
    ]));
    let pipeline = StagePipeline::new(
        news_stages("unused.md"),
        empty_retrieval().await,
        inference.clone(),
        Arc::new(NullArticleSink),
    );

    let run = pipeline.run("quantum computing").await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.retrieved_chunks.is_empty());
    assert_eq!(run.stage_outputs.len(), 2);
    let article = run.final_output.unwrap();
    assert!(!article.is_empty());

    let prompts = inference.recorded_prompts();
    assert_eq!(prompts.len(), 2);
    for prompt in &prompts {
        assert!(prompt.contains("no external news context"));
        assert!(!prompt.contains("News context:"));
    }
}

#[tokio::test]
async fn failure_on_second_stage_preserves_first_output() {
    let inference = Arc::new(MockInference::with_responses(vec![
        Ok("stage one report".into()),
        Err("model unavailable".into()),
    ]));
    let pipeline = StagePipeline::new(
        news_stages("unused.md"),
        empty_retrieval().await,
        inference,
        Arc::new(NullArticleSink),
    );

    let run = pipeline.run("AI chips").await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.final_output.is_none());
    assert_eq!(run.stage_outputs, vec!["stage one report".to_string()]);
    let failure = run.failure.unwrap();
    assert!(failure.contains("model unavailable"));
}

#[tokio::test]
async fn blank_topic_is_a_validation_error() {
    let pipeline = StagePipeline::new(
        news_stages("unused.md"),
        empty_retrieval().await,
        Arc::new(MockInference::with_responses(vec![])),
        Arc::new(NullArticleSink),
    );
    let err = pipeline.run("   ").await.unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[tokio::test]
async fn grounded_run_threads_context_and_prior_output() {
    let retrieval = seeded_retrieval(&[
        article("a1", "Chips ramp up", "Fabs expand AI accelerator output."),
        article("a2", "Models shrink", "Smaller models close the gap."),
    ])
    .await;
    let inference = Arc::new(MockInference::with_responses(vec![
        Ok("the research report".into()),
        Ok("final article".into()),
    ]));
    let pipeline = StagePipeline::new(
        news_stages("unused.md"),
        retrieval,
        inference.clone(),
        Arc::new(NullArticleSink),
    );

    let run = pipeline.run("AI hardware").await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.retrieved_chunks.len(), 2);

    let prompts = inference.recorded_prompts();
    assert!(prompts[0].contains("Use ONLY the news context"));
    assert!(prompts[0].contains("Chips ramp up"));
    // The writer's rendered description carries the researcher's output.
    assert!(prompts[1].contains("the research report"));
}

#[tokio::test]
async fn cancelled_handle_aborts_before_next_stage() {
    let inference = Arc::new(MockInference::with_responses(vec![Ok("unused".into())]));
    let pipeline = StagePipeline::new(
        news_stages("unused.md"),
        empty_retrieval().await,
        inference.clone(),
        Arc::new(NullArticleSink),
    );

    let cancel = CancelHandle::new();
    cancel.cancel();
    let run = pipeline.run_with_cancel("AI", &cancel).await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.final_output.is_none());
    assert!(run.failure.unwrap().contains("cancelled"));
    assert!(inference.recorded_prompts().is_empty());
}

#[tokio::test]
async fn completed_run_writes_article_to_sink() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("post.md");
    let inference = Arc::new(MockInference::with_responses(vec![
        Ok("report".into()),
        Ok("# The Article".into()),
    ]));
    let pipeline = StagePipeline::new(
        news_stages(&out_path),
        empty_retrieval().await,
        inference,
        Arc::new(FsArticleSink),
    );

    let run = pipeline.run("robotics").await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.warnings.is_empty());
    let written = tokio::fs::read_to_string(&out_path).await.unwrap();
    assert_eq!(written, "# The Article");
}

fn delegating_roster() -> Vec<TaskSpec> {
    // The writer comes first and references the researcher's output, so with
    // a bounded policy the researcher must run before the writer's prompt is
    // built.
    let writer = StageConfig::new("Writer", "Write about {topic}", "writes")
        .with_capability(Capability::Delegation);
    let researcher = StageConfig::new("Researcher", "Research {topic}", "researches");
    vec![
        TaskSpec::new(
            "write",
            "Write an article using: {research}",
            "markdown article",
            writer,
        ),
        TaskSpec::new("research", "Research {topic}", "a report", researcher),
    ]
}

#[tokio::test]
async fn bounded_delegation_runs_dependency_first() {
    let inference = Arc::new(MockInference::with_responses(vec![
        Ok("delegated research output".into()),
        Ok("written article".into()),
    ]));
    let pipeline = StagePipeline::new(
        delegating_roster(),
        empty_retrieval().await,
        inference.clone(),
        Arc::new(NullArticleSink),
    )
    .with_delegation(DelegationPolicy::Bounded { max_depth: 1 });

    let run = pipeline.run("AI").await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.stage_outputs.len(), 2);

    let prompts = inference.recorded_prompts();
    // First call is the delegated researcher, second the writer with the
    // researcher's output substituted.
    assert!(prompts[0].contains("You are Researcher."));
    assert!(prompts[1].contains("delegated research output"));
}

#[tokio::test]
async fn disabled_delegation_leaves_placeholder_unresolved() {
    let inference = Arc::new(MockInference::with_responses(vec![
        Ok("written first".into()),
        Ok("research second".into()),
    ]));
    let pipeline = StagePipeline::new(
        delegating_roster(),
        empty_retrieval().await,
        inference.clone(),
        Arc::new(NullArticleSink),
    );

    let run = pipeline.run("AI").await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    let prompts = inference.recorded_prompts();
    assert!(prompts[0].contains("You are Writer."));
    assert!(prompts[0].contains("{research}"));
}
