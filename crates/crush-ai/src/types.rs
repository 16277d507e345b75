//! Request and job types shared by every backend shape.

use serde::{Deserialize, Serialize};

/// A multimodal prompt: one instruction block, the user text, and images.
///
/// Images are `data:` URIs produced by the image normalizer, in the order
/// they should be shown to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub text: String,
    pub images: Vec<String>,
}

/// Handle to a job accepted by an asynchronous backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRef {
    pub job_id: String,
    pub conversation_id: String,
}

/// Outcome of submitting a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The backend answered inline.
    Completed(String),
    /// The backend accepted a job that must be polled.
    Pending(JobRef),
}

/// Status of an asynchronous job as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    InProgress,
    Completed,
    /// Terminal business failure with the backend's reason.
    Failed(String),
}
