//! Token-by-token answer assembly.
//!
//! A [`StreamingSink`] accumulates tokens for exactly one generation,
//! re-renders the partial answer on a [`MessageSurface`] after every token,
//! and commits the final answer to memory on completion.
//!
//! ```text
//! Idle --start--> Streaming --push--> Streaming --finish--> Completed
//!   \                 |
//!    \--abort-->  Aborted  <--abort--/
//! ```

mod surface;

pub use surface::{BufferSurface, MessageSurface, SurfaceEvent, TerminalSurface};

use crate::core::Turn;
use crate::error::{Error, Result};
use crate::memory::ConversationMemory;

/// Lifecycle state of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// Created, generation not started.
    Idle,
    /// Receiving tokens.
    Streaming,
    /// End of stream reached; the answer was committed.
    Completed,
    /// Generation failed; nothing was committed.
    Aborted,
}

impl SinkState {
    /// Lowercase state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

/// Receives one generation's tokens and commits the answer.
///
/// # Examples
///
/// ```
/// use docqa_rs::memory::ConversationMemory;
/// use docqa_rs::streaming::{BufferSurface, SinkState, StreamingSink};
///
/// let mut memory = ConversationMemory::new();
/// let mut surface = BufferSurface::new();
/// let mut sink = StreamingSink::new(&mut memory, &mut surface);
///
/// sink.start().unwrap();
/// sink.push("Thirty").unwrap();
/// sink.push(" days.").unwrap();
/// let turn = sink.finish().unwrap();
///
/// assert_eq!(turn.text, "Thirty days.");
/// assert_eq!(memory.len(), 1);
/// ```
pub struct StreamingSink<'a> {
    state: SinkState,
    message: String,
    tokens: usize,
    memory: &'a mut ConversationMemory,
    surface: &'a mut dyn MessageSurface,
}

impl<'a> StreamingSink<'a> {
    /// Creates an idle sink bound to `memory` and `surface`.
    pub fn new(memory: &'a mut ConversationMemory, surface: &'a mut dyn MessageSurface) -> Self {
        Self {
            state: SinkState::Idle,
            message: String::new(),
            tokens: 0,
            memory,
            surface,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SinkState {
        self.state
    }

    /// Text accumulated so far.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Number of tokens received.
    #[must_use]
    pub const fn token_count(&self) -> usize {
        self.tokens
    }

    fn reject(&self, action: &str) -> Error {
        Error::InvalidState {
            message: format!("cannot {action} a {} sink", self.state.as_str()),
        }
    }

    /// Begins a generation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the sink is idle.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SinkState::Idle {
            return Err(self.reject("start"));
        }
        self.state = SinkState::Streaming;
        self.message.clear();
        self.surface.generation_started();
        tracing::debug!("generation started");
        Ok(())
    }

    /// Appends a token and re-renders the partial answer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the sink is streaming.
    pub fn push(&mut self, token: &str) -> Result<()> {
        if self.state != SinkState::Streaming {
            return Err(self.reject("push to"));
        }
        self.message.push_str(token);
        self.tokens += 1;
        self.surface.render(&self.message);
        Ok(())
    }

    /// Ends the generation and appends the answer to memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the sink is streaming.
    pub fn finish(&mut self) -> Result<Turn> {
        if self.state != SinkState::Streaming {
            return Err(self.reject("finish"));
        }
        self.state = SinkState::Completed;
        let turn = Turn::ai(std::mem::take(&mut self.message));
        self.memory.append(turn.clone());
        self.surface.generation_finished(&turn.text);
        tracing::debug!(tokens = self.tokens, chars = turn.text.len(), "generation completed");
        Ok(turn)
    }

    /// Abandons the generation without touching memory.
    ///
    /// Partial text stays visible on the surface.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the sink already completed or
    /// aborted.
    pub fn abort(&mut self, reason: &str) -> Result<()> {
        if !matches!(self.state, SinkState::Idle | SinkState::Streaming) {
            return Err(self.reject("abort"));
        }
        self.state = SinkState::Aborted;
        self.surface.generation_aborted(reason);
        tracing::debug!(tokens = self.tokens, reason, "generation aborted");
        Ok(())
    }
}
