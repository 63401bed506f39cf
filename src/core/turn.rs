//! Conversation turns.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The user asking questions.
    Human,
    /// The model's answer.
    Ai,
}

impl Role {
    /// Returns the lowercase role name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Ai => "ai",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded message in a conversation.
///
/// # Examples
///
/// ```
/// use docqa_rs::core::{Role, Turn};
///
/// let turn = Turn::human("What is X?");
/// assert_eq!(turn.role, Role::Human);
/// assert_eq!(turn.text, "What is X?");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced the text.
    pub role: Role,
    /// Message text.
    pub text: String,
    /// Unix timestamp (seconds) when the turn was recorded.
    pub created_at: i64,
}

impl Turn {
    /// Creates a turn stamped with the current time.
    #[must_use]
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            created_at: current_timestamp(),
        }
    }

    /// Creates a human turn.
    #[must_use]
    pub fn human(text: impl Into<String>) -> Self {
        Self::new(Role::Human, text)
    }

    /// Creates an AI turn.
    #[must_use]
    pub fn ai(text: impl Into<String>) -> Self {
        Self::new(Role::Ai, text)
    }
}

/// Returns the current Unix timestamp in seconds.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Human.to_string(), "human");
        assert_eq!(Role::Ai.to_string(), "ai");
    }

    #[test]
    fn test_turn_constructors() {
        let turn = Turn::ai("answer");
        assert_eq!(turn.role, Role::Ai);
        assert!(turn.created_at > 0);
    }

    #[test]
    fn test_turn_serialization() {
        let turn = Turn::human("hi");
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("\"role\":\"human\""));
    }
}
