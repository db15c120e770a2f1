//! Sequential stage orchestration.
//!
//! [`StagePipeline`] turns a topic into a final article by running a fixed,
//! ordered list of stages. Context is retrieved exactly once per run, before
//! the first stage, and stays fixed for the whole run. Each stage renders
//! its templates with the topic and all previously produced stage outputs,
//! then makes exactly one (client-side retried) inference call; stage `N`'s
//! prompt is never constructed before stage `N - 1` completes.
//!
//! Delegation is explicit and bounded: with a [`DelegationPolicy::Bounded`]
//! policy, a stage that both carries [`Capability::Delegation`] and still
//! references another stage's unproduced output after rendering will run
//! that stage first, up to the configured depth and never re-entering a
//! stage that is currently delegating. The default policy is
//! [`DelegationPolicy::Disabled`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::context::PromptContext;
use crate::errors::NewsWeaveError;
use crate::inference::InferenceClient;
use crate::retrieval::RetrievalService;
use crate::stages::{Capability, TaskSpec, render_template};
use crate::store::RetrievedChunk;

/// Lifecycle of a pipeline run.
///
/// `Created → Retrieving → StageRunning(i) → Completed`, with `Failed`
/// reachable from any `StageRunning`. `Retrieving` is never re-entered once
/// it completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "stage")]
pub enum RunStatus {
    Created,
    Retrieving,
    StageRunning(usize),
    Completed,
    Failed,
}

/// Result of one topic request: retrieved context, per-stage outputs, and
/// the final article text when the run completed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineRun {
    pub topic: String,
    pub retrieved_chunks: Vec<RetrievedChunk>,
    /// Outputs of stages that completed, in stage order. Equals the stage
    /// count on success; on failure it holds the completed prefix.
    pub stage_outputs: Vec<String>,
    /// Set only when `status == Completed`.
    pub final_output: Option<String>,
    pub status: RunStatus,
    /// Failure message when `status == Failed`.
    pub failure: Option<String>,
    /// Recoverable problems that did not fail the run (e.g. sink write).
    pub warnings: Vec<String>,
}

impl PipelineRun {
    fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            retrieved_chunks: Vec::new(),
            stage_outputs: Vec::new(),
            final_output: None,
            status: RunStatus::Created,
            failure: None,
            warnings: Vec::new(),
        }
    }
}

/// Caller-held cancellation handle. A cancelled run aborts at the next stage
/// boundary, never mid-inference-call.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Delegation control. Disabled by default; a stage may run another stage it
/// depends on only when an explicit depth bound is configured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DelegationPolicy {
    #[default]
    Disabled,
    Bounded {
        max_depth: usize,
    },
}

/// External collaborator that persists the final article text.
#[async_trait]
pub trait ArticleSink: Send + Sync {
    async fn write_article(&self, path: &Path, article: &str) -> Result<(), NewsWeaveError>;
}

/// Filesystem sink writing the article as a markdown file.
#[derive(Clone, Debug, Default)]
pub struct FsArticleSink;

#[async_trait]
impl ArticleSink for FsArticleSink {
    async fn write_article(&self, path: &Path, article: &str) -> Result<(), NewsWeaveError> {
        tokio::fs::write(path, article)
            .await
            .map_err(|err| NewsWeaveError::storage(format!("article sink write failed: {err}")))
    }
}

/// Orchestrator for the ordered generation stages.
pub struct StagePipeline {
    stages: Vec<TaskSpec>,
    retrieval: Arc<RetrievalService>,
    inference: Arc<dyn InferenceClient>,
    sink: Arc<dyn ArticleSink>,
    delegation: DelegationPolicy,
    retrieval_k: usize,
}

impl StagePipeline {
    pub fn new(
        stages: Vec<TaskSpec>,
        retrieval: Arc<RetrievalService>,
        inference: Arc<dyn InferenceClient>,
        sink: Arc<dyn ArticleSink>,
    ) -> Self {
        Self {
            stages,
            retrieval,
            inference,
            sink,
            delegation: DelegationPolicy::default(),
            retrieval_k: 6,
        }
    }

    #[must_use]
    pub fn with_delegation(mut self, policy: DelegationPolicy) -> Self {
        self.delegation = policy;
        self
    }

    /// Number of chunks retrieved per run (default 6).
    #[must_use]
    pub fn with_retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = k;
        self
    }

    /// Run the pipeline for `topic` without external cancellation.
    pub async fn run(&self, topic: &str) -> Result<PipelineRun, NewsWeaveError> {
        self.run_with_cancel(topic, &CancelHandle::new()).await
    }

    /// Run the pipeline, aborting at the next stage boundary if `cancel`
    /// fires. A blank topic is a validation error; retrieval failures
    /// propagate as errors; stage inference failures resolve to a run with
    /// `status == Failed` and the completed output prefix preserved.
    #[instrument(skip(self, cancel), fields(stages = self.stages.len()))]
    pub async fn run_with_cancel(
        &self,
        topic: &str,
        cancel: &CancelHandle,
    ) -> Result<PipelineRun, NewsWeaveError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(NewsWeaveError::validation("topic must not be empty"));
        }

        let mut run = PipelineRun::new(topic);
        run.status = RunStatus::Retrieving;
        let chunks = self.retrieval.retrieve(topic, self.retrieval_k).await?;
        let context = PromptContext::assemble(topic, &chunks);
        run.retrieved_chunks = chunks;
        debug!(grounded = context.is_grounded(), "context assembled");

        let mut outputs: Vec<Option<String>> = vec![None; self.stages.len()];
        let mut in_flight = vec![false; self.stages.len()];

        for idx in 0..self.stages.len() {
            if cancel.is_cancelled() {
                let err = NewsWeaveError::Cancelled(format!(
                    "cancelled before stage '{}'",
                    self.stages[idx].name
                ));
                return Ok(self.resolve_failed(run, outputs, err));
            }
            run.status = RunStatus::StageRunning(idx);
            if let Err(err) = self
                .execute_stage(idx, 0, &mut in_flight, &mut outputs, topic, &context)
                .await
            {
                return Ok(self.resolve_failed(run, outputs, err));
            }
        }

        run.stage_outputs = outputs.into_iter().flatten().collect();
        run.final_output = run.stage_outputs.last().cloned();
        run.status = RunStatus::Completed;

        if let Some(article) = run.final_output.clone() {
            for spec in &self.stages {
                if let Some(path) = &spec.output_sink {
                    if let Err(err) = self.sink.write_article(path, &article).await {
                        warn!(path = %path.display(), error = %err, "article sink write failed");
                        run.warnings.push(err.to_string());
                    }
                }
            }
        }
        Ok(run)
    }

    fn resolve_failed(
        &self,
        mut run: PipelineRun,
        outputs: Vec<Option<String>>,
        err: NewsWeaveError,
    ) -> PipelineRun {
        warn!(error = %err, "pipeline run failed");
        run.stage_outputs = outputs.into_iter().flatten().collect();
        run.final_output = None;
        run.status = RunStatus::Failed;
        run.failure = Some(err.to_string());
        run
    }

    /// Render the stage's goal, description, and expected-output templates
    /// against the topic and all outputs produced so far.
    fn render_stage(
        &self,
        idx: usize,
        outputs: &[Option<String>],
        topic: &str,
    ) -> (String, String, String) {
        let spec = &self.stages[idx];
        let mut vars: Vec<(&str, &str)> = vec![("topic", topic)];
        for (other, output) in self.stages.iter().zip(outputs.iter()) {
            if let Some(text) = output {
                vars.push((other.name.as_str(), text.as_str()));
            }
        }
        (
            render_template(&spec.stage.goal_template, &vars),
            render_template(&spec.description_template, &vars),
            render_template(&spec.expected_output_template, &vars),
        )
    }

    /// Index of a stage whose output `description` still references but which
    /// has not produced output yet.
    fn unresolved_dependency(&self, idx: usize, description: &str, outputs: &[Option<String>]) -> Option<usize> {
        self.stages.iter().enumerate().position(|(j, other)| {
            j != idx
                && outputs[j].is_none()
                && description.contains(&format!("{{{}}}", other.name))
        })
    }

    fn execute_stage<'a>(
        &'a self,
        idx: usize,
        depth: usize,
        in_flight: &'a mut Vec<bool>,
        outputs: &'a mut Vec<Option<String>>,
        topic: &'a str,
        context: &'a PromptContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), NewsWeaveError>> + Send + 'a>> {
        Box::pin(async move {
            if outputs[idx].is_some() {
                return Ok(());
            }
            in_flight[idx] = true;

            let spec = &self.stages[idx];
            let (_, description, _) = self.render_stage(idx, outputs, topic);

            if let DelegationPolicy::Bounded { max_depth } = self.delegation {
                if spec.stage.allow_delegation() {
                    if let Some(dep) = self.unresolved_dependency(idx, &description, outputs) {
                        if in_flight[dep] {
                            warn!(
                                stage = %spec.name,
                                dependency = %self.stages[dep].name,
                                "delegation cycle detected, proceeding without delegating"
                            );
                        } else if depth >= max_depth {
                            warn!(
                                stage = %spec.name,
                                depth,
                                "delegation depth bound reached, proceeding without delegating"
                            );
                        } else {
                            debug!(
                                stage = %spec.name,
                                dependency = %self.stages[dep].name,
                                "delegating to collaborating stage"
                            );
                            self.execute_stage(dep, depth + 1, in_flight, outputs, topic, context)
                                .await?;
                        }
                    }
                }
            }

            // Re-render now that delegation may have produced new outputs.
            let (goal, description, expected) = self.render_stage(idx, outputs, topic);
            let spec = &self.stages[idx];
            let mut prompt = format!(
                "You are {role}.\nGoal: {goal}\nBackstory: {backstory}\n\n\
                 Task:\n{description}\n\nExpected output:\n{expected}\n",
                role = spec.stage.role,
                backstory = spec.stage.backstory,
            );
            if spec.stage.has_capability(Capability::ContextAwareGeneration) {
                prompt.push('\n');
                prompt.push_str(&context.render());
            }

            debug!(stage = %spec.name, prompt_len = prompt.len(), "invoking inference");
            let output = self.inference.generate(&prompt).await?;
            outputs[idx] = Some(output);
            in_flight[idx] = false;
            Ok(())
        })
    }
}

/// Sink that drops the article; used when no persistence is configured.
#[derive(Clone, Debug, Default)]
pub struct NullArticleSink;

#[async_trait]
impl ArticleSink for NullArticleSink {
    async fn write_article(&self, _path: &Path, _article: &str) -> Result<(), NewsWeaveError> {
        Ok(())
    }
}

/// Convenience: resolve the article output path for a stage roster, if any
/// stage declares a sink.
#[must_use]
pub fn output_sink_path(stages: &[TaskSpec]) -> Option<PathBuf> {
    stages.iter().find_map(|s| s.output_sink.clone())
}
