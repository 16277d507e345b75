use async_trait::async_trait;

use crate::error::AiError;
use crate::types::{JobRef, PollStatus, Prompt, Submission};

/// One AI completion backend.
///
/// Synchronous backends return [`Submission::Completed`] from
/// [`submit`](CompletionBackend::submit) and keep the default `poll` and
/// `fetch_answer`, which are never reached for them.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    async fn submit(&self, prompt: &Prompt) -> Result<Submission, AiError>;

    async fn poll(&self, _job: &JobRef) -> Result<PollStatus, AiError> {
        Err(AiError::Unsupported {
            backend: self.name(),
            operation: "poll",
        })
    }

    async fn fetch_answer(&self, _job: &JobRef) -> Result<String, AiError> {
        Err(AiError::Unsupported {
            backend: self.name(),
            operation: "fetch_answer",
        })
    }
}
