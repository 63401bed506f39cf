//! System prompt template and prompt assembly.
//!
//! The system instruction embeds the retrieved context through the
//! `{context}` placeholder. History turns follow it in order, then the
//! question as the final human message.

use std::path::Path;

use crate::core::Turn;
use crate::llm::PromptMessage;
use crate::retrieval::ScoredChunk;

/// Placeholder replaced by the retrieved context.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Compiled-in system instruction.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Answer the question using Only the following context. \
If you don't know the answer just say you don't know. Don't make anything up.\n\n\
Context: {context}";

/// Separator placed between retrieved chunks.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// The system instruction used for every question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Wraps a custom template.
    ///
    /// A template without `{context}` gets the context appended after a
    /// blank line, so retrieved text always reaches the model.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        let mut template = template.into();
        if !template.contains(CONTEXT_PLACEHOLDER) {
            template.push_str("\n\nContext: ");
            template.push_str(CONTEXT_PLACEHOLDER);
        }
        Self { template }
    }

    /// Loads the template from `path`, falling back to the default when
    /// the path is absent or unreadable.
    #[must_use]
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match std::fs::read_to_string(path) {
            Ok(text) if !text.trim().is_empty() => Self::new(text),
            Ok(_) => Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "prompt template unreadable, using default");
                Self::default()
            }
        }
    }

    /// Raw template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitutes `context` into the template.
    #[must_use]
    pub fn render(&self, context: &str) -> String {
        self.template.replace(CONTEXT_PLACEHOLDER, context)
    }
}

/// Joins retrieved chunk texts with blank lines, in retrieval order.
#[must_use]
pub fn format_context(chunks: &[ScoredChunk<'_>]) -> String {
    chunks
        .iter()
        .map(|c| c.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Assembles the full prompt: system instruction, history, question.
#[must_use]
pub fn build_messages(
    template: &PromptTemplate,
    context: &str,
    history: &[Turn],
    question: &str,
) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::system(template.render(context)));
    messages.extend(history.iter().map(PromptMessage::from));
    messages.push(PromptMessage::human(question));
    messages
}
