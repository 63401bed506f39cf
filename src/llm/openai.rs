//! Streaming OpenAI chat completions.

use crate::error::{InvocationError, Result};
use crate::llm::{ChatModel, DEFAULT_TEMPERATURE, PromptMessage, PromptRole, TokenStream};
use crate::openai::{OpenAiClient, classify};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionResponseStream, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
};
use futures_util::StreamExt;
use std::time::{Duration, Instant};

/// Chat model backed by the OpenAI chat completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    client: OpenAiClient,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    /// Creates a model handle for `model`.
    #[must_use]
    pub fn new(client: OpenAiClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn build_request(&self, messages: &[PromptMessage]) -> Result<CreateChatCompletionRequest> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(classify)?;

        Ok(CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .temperature(self.temperature)
            .messages(messages)
            .build()
            .map_err(classify)?)
    }
}

fn to_request_message(
    message: &PromptMessage,
) -> std::result::Result<ChatCompletionRequestMessage, async_openai::error::OpenAIError> {
    let content = message.content.clone();
    Ok(match message.role {
        PromptRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        PromptRole::Human => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        PromptRole::Ai => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()?
            .into(),
    })
}

impl ChatModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn stream<'a>(
        &'a self,
        messages: &[PromptMessage],
        timeout: Duration,
    ) -> Result<TokenStream<'a>> {
        let request = self.build_request(messages)?;
        let deadline = Instant::now() + timeout;
        let chat = self.client.client().chat();

        let stream = self
            .client
            .block_on(async { tokio::time::timeout(timeout, chat.create_stream(request)).await })
            .map_err(|_| InvocationError::TimedOut {
                secs: timeout.as_secs(),
            })?
            .map_err(classify)?;

        tracing::debug!(model = %self.model, messages = messages.len(), "chat stream opened");
        Ok(Box::new(OpenAiTokenStream {
            client: &self.client,
            model: &self.model,
            stream,
            deadline,
            timeout,
            saw_choice: false,
            saw_finish: false,
            done: false,
        }))
    }
}

/// Drains the async response stream one token at a time.
struct OpenAiTokenStream<'a> {
    client: &'a OpenAiClient,
    model: &'a str,
    stream: ChatCompletionResponseStream,
    deadline: Instant,
    timeout: Duration,
    saw_choice: bool,
    saw_finish: bool,
    done: bool,
}

impl OpenAiTokenStream<'_> {
    fn fail(&mut self, err: InvocationError) -> Option<Result<String>> {
        self.done = true;
        Some(Err(err.into()))
    }
}

impl Iterator for OpenAiTokenStream<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            let stream = &mut self.stream;
            let polled = self
                .client
                .block_on(async { tokio::time::timeout(remaining, stream.next()).await });

            match polled {
                Err(_) => {
                    let secs = self.timeout.as_secs();
                    return self.fail(InvocationError::TimedOut { secs });
                }
                Ok(None) => {
                    self.done = true;
                    if !self.saw_choice {
                        let model = self.model.to_string();
                        return self.fail(InvocationError::EmptyResponse { model });
                    }
                    if !self.saw_finish {
                        return self.fail(InvocationError::StreamInterrupted(
                            "stream closed before finish_reason".to_string(),
                        ));
                    }
                    return None;
                }
                Ok(Some(Err(e))) => return self.fail(classify(e)),
                Ok(Some(Ok(response))) => {
                    let mut token = String::new();
                    for choice in response.choices {
                        self.saw_choice = true;
                        if choice.finish_reason.is_some() {
                            self.saw_finish = true;
                        }
                        if let Some(content) = choice.delta.content {
                            token.push_str(&content);
                        }
                    }
                    if !token.is_empty() {
                        return Some(Ok(token));
                    }
                }
            }
        }
        None
    }
}
