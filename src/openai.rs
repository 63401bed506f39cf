//! Shared OpenAI client plumbing.
//!
//! The core of this crate is synchronous. Hosted calls go through
//! `async-openai` on a private current-thread tokio runtime that both the
//! chat model and the embedder block on.

use crate::error::{InvocationError, Result};
use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use std::future::Future;
use std::sync::Arc;

/// Authenticated client plus the runtime that drives it.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    runtime: Arc<tokio::runtime::Runtime>,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient").finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// Creates a client for `api_key`, optionally against another API base.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::Provider`] if the runtime cannot start.
    pub fn new(api_key: &str, api_base: Option<&str>) -> Result<Self> {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| InvocationError::Provider(format!("failed to start runtime: {e}")))?;

        Ok(Self {
            client: Client::with_config(config),
            runtime: Arc::new(runtime),
        })
    }

    pub(crate) const fn client(&self) -> &Client<OpenAIConfig> {
        &self.client
    }

    /// Runs a future to completion on the private runtime.
    ///
    /// Timers must be created inside `fut`, not before the call.
    pub(crate) fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }
}

/// Maps a client error onto the invocation error families.
pub(crate) fn classify(err: OpenAIError) -> InvocationError {
    match err {
        OpenAIError::Reqwest(e) => InvocationError::Network(e.to_string()),
        OpenAIError::StreamError(msg) => InvocationError::StreamInterrupted(msg),
        OpenAIError::ApiError(api) => {
            let code = api.code.as_deref().unwrap_or_default();
            let kind = api.r#type.as_deref().unwrap_or_default();
            if code == "invalid_api_key" || kind == "authentication_error" {
                InvocationError::Auth(api.message)
            } else if code == "rate_limit_exceeded" || kind == "insufficient_quota" {
                InvocationError::RateLimited(api.message)
            } else {
                InvocationError::Provider(api.message)
            }
        }
        other => InvocationError::Provider(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;

    fn api_error(code: Option<&str>, kind: Option<&str>) -> OpenAIError {
        OpenAIError::ApiError(ApiError {
            message: "nope".to_string(),
            r#type: kind.map(str::to_string),
            param: None,
            code: code.map(str::to_string),
        })
    }

    #[test]
    fn test_classify_auth() {
        assert!(matches!(
            classify(api_error(Some("invalid_api_key"), None)),
            InvocationError::Auth(_)
        ));
    }

    #[test]
    fn test_classify_rate_limit() {
        assert!(matches!(
            classify(api_error(Some("rate_limit_exceeded"), Some("requests"))),
            InvocationError::RateLimited(_)
        ));
        assert!(matches!(
            classify(api_error(None, Some("insufficient_quota"))),
            InvocationError::RateLimited(_)
        ));
    }

    #[test]
    fn test_classify_stream_and_other() {
        assert!(matches!(
            classify(OpenAIError::StreamError("eof".to_string())),
            InvocationError::StreamInterrupted(_)
        ));
        assert!(matches!(
            classify(OpenAIError::InvalidArgument("bad".to_string())),
            InvocationError::Provider(_)
        ));
    }

    #[test]
    fn test_client_debug_hides_key() {
        let client = OpenAiClient::new("sk-secret", None).unwrap();
        assert!(!format!("{client:?}").contains("sk-secret"));
    }
}
