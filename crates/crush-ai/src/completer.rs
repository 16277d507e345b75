use std::sync::Arc;
use std::time::Duration;

use crush_core::{AiBackendKind, AppConfig};

use crate::async_chat::AsyncChatClient;
use crate::backend::CompletionBackend;
use crate::chat_completions::ChatCompletionsClient;
use crate::error::AiError;
use crate::poller::JobPoller;
use crate::retry::retry_with_backoff;
use crate::types::{Prompt, Submission};

const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
const DEFAULT_MAX_RETRIES: u32 = 2;

/// `complete(prompt) -> text` over either backend shape.
///
/// A synchronous backend is a single step that is already complete after
/// submission; an asynchronous one is polled by the configured [`JobPoller`].
#[derive(Clone)]
pub struct AiCompleter {
    backend: Arc<dyn CompletionBackend>,
    poller: JobPoller,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl AiCompleter {
    #[must_use]
    pub fn new(backend: Arc<dyn CompletionBackend>, poller: JobPoller) -> Self {
        Self {
            backend,
            poller,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        }
    }

    /// Overrides how often a `submit` that could not connect is attempted again.
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Builds the backend selected by `CRUSH_AI_BACKEND`.
    ///
    /// # Errors
    ///
    /// Returns [`AiError::InvalidConfig`] if the async backend has no bot id,
    /// or [`AiError::Http`] if the HTTP client cannot be constructed.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, AiError> {
        let backend: Arc<dyn CompletionBackend> = match config.ai_backend {
            AiBackendKind::ChatCompletions => Arc::new(ChatCompletionsClient::with_base_url(
                &config.ai_api_key,
                &config.ai_model,
                config.ai_request_timeout_secs,
                config
                    .ai_base_url
                    .as_deref()
                    .unwrap_or(crate::chat_completions::DEFAULT_BASE_URL),
            )?),
            AiBackendKind::AsyncJob => {
                let bot_id = config.ai_bot_id.as_deref().ok_or_else(|| {
                    AiError::InvalidConfig("CRUSH_AI_BOT_ID is required for async_job".to_owned())
                })?;
                Arc::new(AsyncChatClient::with_base_url(
                    &config.ai_api_key,
                    bot_id,
                    config.ai_request_timeout_secs,
                    config
                        .ai_base_url
                        .as_deref()
                        .unwrap_or(crate::async_chat::DEFAULT_BASE_URL),
                )?)
            }
        };

        let poller = JobPoller::new(
            Duration::from_millis(config.ai_poll_interval_ms),
            config.ai_max_poll_attempts,
        );
        Ok(Self::new(backend, poller).with_retries(config.ai_max_retries, DEFAULT_BACKOFF_BASE_MS))
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Submits `prompt` and waits for the generated text.
    ///
    /// # Errors
    ///
    /// Returns [`AiError::ExternalServiceFailed`] if the backend reports a
    /// failure or answers with blank text, [`AiError::Timeout`] if an async
    /// job outlives the poll bound, and any HTTP error from the backend. A
    /// submission is only sent again when it could not connect.
    pub async fn complete(&self, prompt: &Prompt) -> Result<String, AiError> {
        let submission = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.backend.submit(prompt)
        })
        .await?;

        let text = match submission {
            Submission::Completed(text) => text,
            Submission::Pending(job) => {
                tracing::info!(
                    backend = self.backend.name(),
                    job_id = %job.job_id,
                    "AI job submitted, polling"
                );
                self.poller.run(self.backend.as_ref(), &job).await?
            }
        };

        if text.trim().is_empty() {
            return Err(AiError::ExternalServiceFailed(
                "backend returned an empty answer".to_owned(),
            ));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobRef;
    use async_trait::async_trait;

    struct Inline(&'static str);

    #[async_trait]
    impl CompletionBackend for Inline {
        fn name(&self) -> &'static str {
            "inline"
        }

        async fn submit(&self, _prompt: &Prompt) -> Result<Submission, AiError> {
            Ok(Submission::Completed(self.0.to_owned()))
        }
    }

    fn completer(text: &'static str) -> AiCompleter {
        AiCompleter::new(
            Arc::new(Inline(text)),
            JobPoller::new(Duration::from_millis(1), 1),
        )
        .with_retries(0, 0)
    }

    #[tokio::test]
    async fn synchronous_answer_is_returned_without_polling() {
        let text = completer("hello").complete(&Prompt::default()).await.unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn blank_answer_is_a_service_failure() {
        let err = completer("  \n").complete(&Prompt::default()).await.unwrap_err();
        assert!(matches!(err, AiError::ExternalServiceFailed(_)));
    }

    #[tokio::test]
    async fn synchronous_backend_cannot_be_polled() {
        let backend = Inline("x");
        let job = JobRef {
            job_id: "j".to_owned(),
            conversation_id: "c".to_owned(),
        };
        let err = backend.poll(&job).await.unwrap_err();
        assert!(matches!(
            err,
            AiError::Unsupported {
                backend: "inline",
                operation: "poll"
            }
        ));
    }
}
