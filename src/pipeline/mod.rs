//! Question answering over one retriever.
//!
//! Each call to [`RetrievalPipeline::answer`] retrieves context, assembles
//! the prompt from the memory snapshot, records the question, and streams
//! the model's answer through a fresh [`StreamingSink`].
//!
//! The human turn is recorded before the model is invoked. If invocation
//! fails the question stays in memory without an answer.

pub mod prompt;

pub use prompt::{PromptTemplate, build_messages, format_context};

use std::time::{Duration, Instant};

use crate::core::Turn;
use crate::error::{Error, InvocationError, Result};
use crate::llm::{ChatModel, DEFAULT_GENERATION_TIMEOUT, PromptMessage};
use crate::memory::ConversationMemory;
use crate::retrieval::{DEFAULT_TOP_K, Retriever};
use crate::streaming::{MessageSurface, StreamingSink};

/// Retrieval-augmented answer generation.
pub struct RetrievalPipeline {
    model: Box<dyn ChatModel>,
    top_k: usize,
    timeout: Duration,
    template: PromptTemplate,
}

impl std::fmt::Debug for RetrievalPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalPipeline")
            .field("model", &self.model.model_name())
            .field("top_k", &self.top_k)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RetrievalPipeline {
    /// Creates a pipeline with default `top_k`, timeout, and prompt.
    #[must_use]
    pub fn new(model: Box<dyn ChatModel>) -> Self {
        Self {
            model,
            top_k: DEFAULT_TOP_K,
            timeout: DEFAULT_GENERATION_TIMEOUT,
            template: PromptTemplate::default(),
        }
    }

    /// Sets the number of chunks retrieved per question. Zero is raised to
    /// one.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Sets the generation budget.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the system instruction template.
    #[must_use]
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Chat model name.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Chunks retrieved per question.
    #[must_use]
    pub const fn top_k(&self) -> usize {
        self.top_k
    }

    /// Generation budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Answers `question` against `retriever`.
    ///
    /// On success the returned AI turn has already been appended to
    /// `memory`.
    ///
    /// # Errors
    ///
    /// - [`InvocationError`] for model failures, including
    ///   [`InvocationError::TimedOut`] when the generation budget runs out;
    ///   the question is kept in memory, the answer is not
    /// - retrieval errors from embedding the question, before anything is
    ///   recorded
    pub fn answer(
        &self,
        question: &str,
        retriever: &Retriever,
        memory: &mut ConversationMemory,
        surface: &mut dyn MessageSurface,
    ) -> Result<Turn> {
        let hits = retriever.retrieve(question, self.top_k)?;
        let context = format_context(&hits);
        tracing::debug!(
            file = %retriever.identity(),
            chunks = hits.len(),
            context_bytes = context.len(),
            "context retrieved"
        );

        let messages = build_messages(&self.template, &context, memory.all(), question);
        memory.append(Turn::human(question));

        let started = Instant::now();
        let mut sink = StreamingSink::new(memory, surface);
        let result = self.drive(&messages, &mut sink, started);

        match result {
            Ok(()) => {
                let turn = sink.finish()?;
                tracing::info!(
                    model = self.model.model_name(),
                    chars = turn.text.len(),
                    elapsed_ms = started.elapsed().as_millis(),
                    "answer completed"
                );
                Ok(turn)
            }
            Err(e) => {
                let reason = e.to_string();
                sink.abort(&reason)?;
                tracing::warn!(model = self.model.model_name(), error = %reason, "answer failed");
                Err(e)
            }
        }
    }

    fn drive(
        &self,
        messages: &[PromptMessage],
        sink: &mut StreamingSink<'_>,
        started: Instant,
    ) -> Result<()> {
        let tokens = self.model.stream(messages, self.timeout)?;
        sink.start()?;
        for token in tokens {
            let token = token?;
            if started.elapsed() > self.timeout {
                return Err(self.timed_out());
            }
            sink.push(&token)?;
        }
        Ok(())
    }

    fn timed_out(&self) -> Error {
        InvocationError::TimedOut {
            secs: self.timeout.as_secs(),
        }
        .into()
    }
}
