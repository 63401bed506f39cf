//! Conversation memory.
//!
//! An append-only log of question and answer turns for one session. The
//! only ways turns leave the log are [`ConversationMemory::clear`] and, when
//! a cap is set, dropping the oldest turn on overflow.

use crate::core::{Role, Turn};

/// Default turn cap used by the application config.
pub const DEFAULT_MAX_TURNS: usize = 100;

/// Ordered log of conversation turns.
///
/// # Examples
///
/// ```
/// use docqa_rs::core::Turn;
/// use docqa_rs::memory::ConversationMemory;
///
/// let mut memory = ConversationMemory::new();
/// memory.append(Turn::human("What is the refund window?"));
/// memory.append(Turn::ai("Thirty days."));
/// assert_eq!(memory.len(), 2);
/// assert_eq!(memory.all()[1].text, "Thirty days.");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: Vec<Turn>,
    max_turns: Option<usize>,
}

impl ConversationMemory {
    /// Creates an unbounded memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a memory that keeps at most `max_turns` turns. Zero means
    /// unbounded.
    #[must_use]
    pub fn with_max_turns(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns: (max_turns > 0).then_some(max_turns),
        }
    }

    /// Turn cap, if any.
    #[must_use]
    pub const fn max_turns(&self) -> Option<usize> {
        self.max_turns
    }

    /// Appends a turn, dropping the oldest when the cap is exceeded.
    pub fn append(&mut self, turn: Turn) {
        tracing::trace!(role = %turn.role, chars = turn.text.len(), "memory append");
        self.turns.push(turn);
        if let Some(max) = self.max_turns
            && self.turns.len() > max
        {
            let excess = self.turns.len() - max;
            self.turns.drain(..excess);
        }
    }

    /// All turns in insertion order.
    #[must_use]
    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of stored turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turns are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent turn.
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of turns with `role`.
    #[must_use]
    pub fn count(&self, role: Role) -> usize {
        self.turns.iter().filter(|t| t.role == role).count()
    }

    /// Removes every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_append_preserves_order() {
        let mut memory = ConversationMemory::new();
        memory.append(Turn::human("q1"));
        memory.append(Turn::ai("a1"));
        memory.append(Turn::human("q2"));

        let texts: Vec<&str> = memory.all().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["q1", "a1", "q2"]);
        assert_eq!(memory.last().map(|t| t.role), Some(Role::Human));
    }

    #[test]
    fn test_cap_drops_oldest() {
        let mut memory = ConversationMemory::with_max_turns(2);
        memory.append(Turn::human("q1"));
        memory.append(Turn::ai("a1"));
        memory.append(Turn::human("q2"));

        let texts: Vec<String> = memory.all().iter().map(|t| t.text.clone()).collect();
        assert_eq!(texts, vec!["a1", "q2"]);
    }

    #[test]
    fn test_zero_cap_is_unbounded() {
        let mut memory = ConversationMemory::with_max_turns(0);
        assert_eq!(memory.max_turns(), None);
        for i in 0..500 {
            memory.append(Turn::human(format!("q{i}")));
        }
        assert_eq!(memory.len(), 500);
    }

    #[test]
    fn test_clear() {
        let mut memory = ConversationMemory::new();
        memory.append(Turn::human("q1"));
        memory.clear();
        assert!(memory.is_empty());
        assert!(memory.last().is_none());
    }

    #[test]
    fn test_count_by_role() {
        let mut memory = ConversationMemory::new();
        memory.append(Turn::human("q1"));
        memory.append(Turn::human("q2"));
        memory.append(Turn::ai("a2"));
        assert_eq!(memory.count(Role::Human), 2);
        assert_eq!(memory.count(Role::Ai), 1);
    }

    proptest! {
        #[test]
        fn prop_all_matches_append_sequence(texts in proptest::collection::vec("[a-z]{0,8}", 0..50)) {
            let mut memory = ConversationMemory::new();
            for (i, text) in texts.iter().enumerate() {
                let turn = if i % 2 == 0 { Turn::human(text.clone()) } else { Turn::ai(text.clone()) };
                memory.append(turn);
            }
            let stored: Vec<String> = memory.all().iter().map(|t| t.text.clone()).collect();
            prop_assert_eq!(stored, texts);
        }

        #[test]
        fn prop_cap_keeps_newest(count in 0usize..60, cap in 1usize..20) {
            let mut memory = ConversationMemory::with_max_turns(cap);
            for i in 0..count {
                memory.append(Turn::human(i.to_string()));
            }
            prop_assert_eq!(memory.len(), count.min(cap));
            if count > 0 {
                prop_assert_eq!(memory.last().map(|t| t.text.clone()), Some((count - 1).to_string()));
            }
        }
    }
}
