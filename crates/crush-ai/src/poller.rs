//! Polling state machine for asynchronous AI jobs.
//!
//! ```text
//! Submitted -> Polling{1} -> Polling{2} -> ... -> Fetching -> Done
//!                  |                          \-> Failed     (backend said failed)
//!                  \------------------------------> TimedOut (bound exhausted)
//! ```
//!
//! Transport-level poll errors count against the same attempt bound as an
//! in-progress answer and are otherwise ignored. A `failed` status ends the
//! job on the attempt it is seen.

use std::time::Duration;

use crate::backend::CompletionBackend;
use crate::error::AiError;
use crate::types::{JobRef, PollStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPhase {
    Submitted,
    /// Waiting for the status check numbered `attempt` (1-based).
    Polling { attempt: u32 },
    Fetching,
    Done(String),
    Failed(String),
    TimedOut { attempts: u32 },
}

/// Drives a [`JobRef`] to a final answer with a fixed poll interval and a
/// bounded number of status checks.
#[derive(Debug, Clone, Copy)]
pub struct JobPoller {
    interval: Duration,
    max_attempts: u32,
}

impl JobPoller {
    /// `max_attempts` below 1 is raised to 1.
    #[must_use]
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Next phase after the status check numbered `attempt` returned `result`.
    ///
    /// # Errors
    ///
    /// Returns the poll error unchanged when it is not transient.
    pub fn after_poll(
        &self,
        attempt: u32,
        result: Result<PollStatus, AiError>,
    ) -> Result<JobPhase, AiError> {
        match result {
            Ok(PollStatus::Completed) => Ok(JobPhase::Fetching),
            Ok(PollStatus::Failed(reason)) => Ok(JobPhase::Failed(reason)),
            Ok(PollStatus::InProgress) => Ok(self.keep_polling(attempt)),
            Err(err) if err.is_transient() => {
                tracing::warn!(attempt, error = %err, "transient poll failure, will poll again");
                Ok(self.keep_polling(attempt))
            }
            Err(err) => Err(err),
        }
    }

    fn keep_polling(&self, attempt: u32) -> JobPhase {
        if attempt >= self.max_attempts {
            JobPhase::TimedOut { attempts: attempt }
        } else {
            JobPhase::Polling {
                attempt: attempt + 1,
            }
        }
    }

    /// Polls `job` until it reaches a terminal phase and returns the answer.
    ///
    /// # Errors
    ///
    /// - [`AiError::ExternalServiceFailed`] if the backend reports `failed`.
    /// - [`AiError::Timeout`] once `max_attempts` checks have not completed.
    /// - [`AiError::NoAnswerFound`] or any non-transient error from the
    ///   backend.
    pub async fn run(
        &self,
        backend: &dyn CompletionBackend,
        job: &JobRef,
    ) -> Result<String, AiError> {
        let mut phase = JobPhase::Submitted;
        loop {
            phase = match phase {
                JobPhase::Submitted => JobPhase::Polling { attempt: 1 },
                JobPhase::Polling { attempt } => {
                    tokio::time::sleep(self.interval).await;
                    let result = backend.poll(job).await;
                    self.after_poll(attempt, result)?
                }
                JobPhase::Fetching => {
                    tracing::debug!(job_id = %job.job_id, "job completed, fetching answer");
                    JobPhase::Done(backend.fetch_answer(job).await?)
                }
                JobPhase::Done(text) => return Ok(text),
                JobPhase::Failed(reason) => {
                    tracing::warn!(job_id = %job.job_id, %reason, "AI job failed");
                    return Err(AiError::ExternalServiceFailed(reason));
                }
                JobPhase::TimedOut { attempts } => {
                    tracing::warn!(job_id = %job.job_id, attempts, "AI job poll bound exhausted");
                    return Err(AiError::Timeout { attempts });
                }
            };
        }
    }
}
