//! Chat model abstraction.
//!
//! A [`ChatModel`] turns a prompt into a blocking stream of answer tokens.
//! End of iteration is the end-of-stream signal; an `Err` item ends the
//! stream early.

#[cfg(feature = "openai")]
mod openai;

#[cfg(feature = "openai")]
pub use openai::OpenAiChatModel;

use crate::core::{Role, Turn};
use crate::error::{ConfigError, Result};
use std::time::Duration;

/// Default chat-completion model.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Default generation budget.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Blocking iterator of answer tokens.
pub type TokenStream<'a> = Box<dyn Iterator<Item = Result<String>> + 'a>;

/// Author of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    /// Instructions and retrieved context.
    System,
    /// User input.
    Human,
    /// Earlier model output.
    Ai,
}

impl From<Role> for PromptRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Human => Self::Human,
            Role::Ai => Self::Ai,
        }
    }
}

/// One message of an assembled prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    /// Message author.
    pub role: PromptRole,
    /// Message body.
    pub content: String,
}

impl PromptMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    /// Creates a human message.
    #[must_use]
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Human,
            content: content.into(),
        }
    }

    /// Creates an AI message.
    #[must_use]
    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Ai,
            content: content.into(),
        }
    }
}

impl From<&Turn> for PromptMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.into(),
            content: turn.text.clone(),
        }
    }
}

/// A chat-completion model that streams its answer.
pub trait ChatModel {
    /// Model identifier, for logs and output.
    fn model_name(&self) -> &str;

    /// Starts generation for `messages`.
    ///
    /// The returned stream must yield
    /// [`crate::error::InvocationError::TimedOut`] rather than block past
    /// `timeout` measured from this call.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::InvocationError`] if the request cannot be
    /// started.
    fn stream<'a>(&'a self, messages: &[PromptMessage], timeout: Duration)
    -> Result<TokenStream<'a>>;
}

/// Settings needed to construct a chat model.
#[derive(Debug, Clone)]
pub struct ChatSettings<'a> {
    /// Model name.
    pub model: &'a str,
    /// Sampling temperature.
    pub temperature: f32,
    /// Resolved API credential.
    pub api_key: Option<&'a str>,
    /// Alternative API base URL.
    pub api_base: Option<&'a str>,
}

/// Creates the hosted chat model.
///
/// # Errors
///
/// - [`ConfigError::MissingCredential`] without an API key
/// - [`ConfigError::FeatureDisabled`] when built without `openai`
#[cfg(feature = "openai")]
pub fn create_chat_model(settings: &ChatSettings<'_>) -> Result<Box<dyn ChatModel>> {
    let api_key = settings.api_key.ok_or(ConfigError::MissingCredential)?;
    let client = crate::openai::OpenAiClient::new(api_key, settings.api_base)?;
    Ok(Box::new(
        OpenAiChatModel::new(client, settings.model).temperature(settings.temperature),
    ))
}

/// Creates the hosted chat model.
///
/// # Errors
///
/// Always returns [`ConfigError::FeatureDisabled`] in this build.
#[cfg(not(feature = "openai"))]
pub fn create_chat_model(_settings: &ChatSettings<'_>) -> Result<Box<dyn ChatModel>> {
    Err(ConfigError::FeatureDisabled {
        provider: "openai".to_string(),
        feature: "openai".to_string(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_message_from_turn() {
        let msg = PromptMessage::from(&Turn::ai("answer"));
        assert_eq!(msg, PromptMessage::ai("answer"));
        let msg = PromptMessage::from(&Turn::human("question"));
        assert_eq!(msg.role, PromptRole::Human);
    }

    #[test]
    fn test_create_requires_credential() {
        let settings = ChatSettings {
            model: "gpt-3.5-turbo",
            temperature: DEFAULT_TEMPERATURE,
            api_key: None,
            api_base: None,
        };
        assert!(create_chat_model(&settings).is_err());
    }
}
