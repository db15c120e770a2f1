//! Prompt context assembly.
//!
//! Retrieved chunks become one formatted block each, with whatever metadata
//! lines are present followed by the chunk text, joined by a `---` separator
//! in retrieval order. When nothing was retrieved the assembler produces an
//! explicitly different instruction set telling the model no external
//! context exists, rather than a silently empty context block.

use crate::store::RetrievedChunk;

const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Assembled grounding context for a generation stage.
#[derive(Clone, Debug, PartialEq)]
pub enum PromptContext {
    /// Context built from retrieved news chunks, in retrieval order.
    Grounded { topic: String, blocks: Vec<String> },
    /// No external context was found; the stage relies on general knowledge.
    General { topic: String },
}

impl PromptContext {
    /// Build the context for `topic` from retrieval output.
    #[must_use]
    pub fn assemble(topic: &str, chunks: &[RetrievedChunk]) -> Self {
        if chunks.is_empty() {
            return Self::General {
                topic: topic.to_string(),
            };
        }
        let blocks = chunks.iter().map(render_block).collect();
        Self::Grounded {
            topic: topic.to_string(),
            blocks,
        }
    }

    #[must_use]
    pub fn is_grounded(&self) -> bool {
        matches!(self, Self::Grounded { .. })
    }

    /// Render the context into prompt text.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::General { topic } => format!(
                "There is no external news context available for \"{topic}\", \
                 so rely on your general knowledge. Make clear when you are \
                 uncertain, and do not fabricate citations or sources."
            ),
            Self::Grounded { topic, blocks } => format!(
                "Use ONLY the news context below to write an accurate, up-to-date article.\n\
                 If something is not supported by the context, do not invent facts.\n\n\
                 User topic: {topic}\n\n\
                 News context:\n{}\n\n\
                 Include references to specific sources (by title or source name) where useful.",
                blocks.join(BLOCK_SEPARATOR)
            ),
        }
    }
}

fn render_block(chunk: &RetrievedChunk) -> String {
    let mut meta = String::new();
    if let Some(title) = &chunk.title {
        meta.push_str(&format!("Title: {title}\n"));
    }
    if let Some(source) = &chunk.source {
        meta.push_str(&format!("Source: {source}\n"));
    }
    if let Some(published_at) = &chunk.published_at {
        meta.push_str(&format!("Published at: {published_at}\n"));
    }
    if let Some(url) = &chunk.url {
        meta.push_str(&format!("URL: {url}\n"));
    }
    format!("{meta}\nContent:\n{}", chunk.chunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, title: Option<&str>, source: Option<&str>) -> RetrievedChunk {
        RetrievedChunk {
            chunk: text.to_string(),
            title: title.map(str::to_string),
            url: None,
            source: source.map(str::to_string),
            published_at: None,
        }
    }

    #[test]
    fn empty_chunks_produce_general_variant() {
        let ctx = PromptContext::assemble("quantum computing", &[]);
        assert!(!ctx.is_grounded());
        let rendered = ctx.render();
        assert!(rendered.contains("no external news context"));
        assert!(!rendered.contains("News context:"));
    }

    #[test]
    fn grounded_and_general_variants_are_textually_distinct() {
        let general = PromptContext::assemble("ai", &[]).render();
        let grounded =
            PromptContext::assemble("ai", &[chunk("body", Some("T"), None)]).render();
        assert_ne!(general, grounded);
        assert!(grounded.contains("Use ONLY the news context"));
        assert!(!general.contains("Use ONLY the news context"));
    }

    #[test]
    fn blocks_preserve_retrieval_order_and_skip_missing_metadata() {
        let chunks = vec![
            chunk("first body", Some("First"), Some("Wire")),
            chunk("second body", None, None),
        ];
        let rendered = PromptContext::assemble("ai", &chunks).render();
        let first_pos = rendered.find("first body").unwrap();
        let second_pos = rendered.find("second body").unwrap();
        assert!(first_pos < second_pos);
        assert!(rendered.contains("Title: First\n"));
        assert!(rendered.contains("Source: Wire\n"));
        assert_eq!(rendered.matches("Title:").count(), 1);
        assert_eq!(rendered.matches("---").count(), 1);
    }
}
