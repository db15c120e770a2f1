//! Stage configuration for the generation pipeline.
//!
//! A [`StageConfig`] is the declarative, immutable description of one
//! generation persona (role, goal, backstory) plus a closed, checkable
//! [`Capability`] set, replacing free-form flag soup with an enumerated
//! behavior surface. A [`TaskSpec`] binds a stage to its prompt templates
//! and execution options.
//!
//! Templates use `{placeholder}` substitution: `{topic}` is always
//! available, and each previously completed stage's output is available
//! under that stage's name (for the canonical roster, `{research}`).
//! Unknown placeholders are left intact.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Behaviors a stage may opt into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// The stage's prompt includes the assembled retrieval context.
    ContextAwareGeneration,
    /// The stage may delegate to a collaborating stage (policy-bounded).
    Delegation,
    /// The stage persona claims conversational memory.
    Memory,
}

/// Immutable persona configuration for one pipeline stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    pub role: String,
    pub goal_template: String,
    pub backstory: String,
    pub capabilities: BTreeSet<Capability>,
}

impl StageConfig {
    pub fn new(
        role: impl Into<String>,
        goal_template: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            goal_template: goal_template.into(),
            backstory: backstory.into(),
            capabilities: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    #[must_use]
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Whether the stage persona carries memory.
    #[must_use]
    pub fn memory(&self) -> bool {
        self.has_capability(Capability::Memory)
    }

    /// Whether the stage may delegate work to a collaborating stage.
    #[must_use]
    pub fn allow_delegation(&self) -> bool {
        self.has_capability(Capability::Delegation)
    }
}

/// A stage bound to its prompt templates and execution options.
///
/// `name` is the stage's handle in template placeholders: a later stage can
/// reference this stage's output as `{<name>}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub description_template: String,
    pub expected_output_template: String,
    pub stage: StageConfig,
    /// Kept for contract fidelity; the orchestrator always executes stages
    /// strictly sequentially regardless of this flag.
    pub run_async: bool,
    /// When set, the final article text is also handed to the article sink
    /// at this path after a successful run.
    pub output_sink: Option<PathBuf>,
}

impl TaskSpec {
    pub fn new(
        name: impl Into<String>,
        description_template: impl Into<String>,
        expected_output_template: impl Into<String>,
        stage: StageConfig,
    ) -> Self {
        Self {
            name: name.into(),
            description_template: description_template.into(),
            expected_output_template: expected_output_template.into(),
            stage,
            run_async: false,
            output_sink: None,
        }
    }

    #[must_use]
    pub fn with_output_sink(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_sink = Some(path.into());
        self
    }
}

/// Substitute `{key}` placeholders in `template` from `vars`.
///
/// Placeholders with no matching key are left intact so callers can detect
/// unresolved references (the delegation trigger relies on this).
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut rendered = template.to_string();
    for (key, value) in vars {
        rendered = rendered.replace(&format!("{{{key}}}"), value);
    }
    rendered
}

/// The canonical news crew: a research stage feeding a writing stage.
///
/// Mirrors the original roster: a delegating, context-aware researcher and a
/// non-delegating writer whose article is written to `output_path`.
#[must_use]
pub fn news_stages(output_path: impl Into<PathBuf>) -> Vec<TaskSpec> {
    let researcher = StageConfig::new(
        "Senior Researcher",
        "Uncover ground breaking technologies in {topic}",
        "Driven by curiosity, you're at the forefront of innovation, eager to \
         explore and share knowledge that could change the world.",
    )
    .with_capability(Capability::ContextAwareGeneration)
    .with_capability(Capability::Delegation)
    .with_capability(Capability::Memory);

    let writer = StageConfig::new(
        "Writer",
        "Narrate compelling tech stories about {topic}",
        "With a flair for simplifying complex topics, you craft engaging \
         narratives that captivate and educate, bringing new discoveries to \
         light in an accessible manner.",
    )
    .with_capability(Capability::ContextAwareGeneration)
    .with_capability(Capability::Memory);

    vec![
        TaskSpec::new(
            "research",
            "Identify the next big trend in {topic}. Focus on identifying pros \
             and cons and the overall narrative. Your final report should \
             clearly articulate the key points, its market opportunities, and \
             potential risks.",
            "A comprehensive 3 paragraphs long report on the latest {topic} trends.",
            researcher,
        ),
        TaskSpec::new(
            "write",
            "Compose an insightful article on {topic}. Ground it in the \
             research findings below.\n\nResearch findings:\n{research}\n\n\
             Focus on the latest trends and how they are impacting the \
             industry. This article should be easy to understand, engaging, \
             and positive.",
            "A 4 paragraph article on {topic} advancements formatted as markdown.",
            writer,
        )
        .with_output_sink(output_path),
    ]
}
