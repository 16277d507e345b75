//! Clients for the multimodal AI backends that write personality reports.
//!
//! Two backend shapes sit behind [`CompletionBackend`]:
//!
//! - [`ChatCompletionsClient`]: one request, one response.
//! - [`AsyncChatClient`]: submit a chat job, poll it, then fetch the answer.
//!
//! [`AiCompleter`] drives either one to a final text answer, retrying
//! submissions that could not connect and polling asynchronous jobs through
//! [`JobPoller`].

pub mod async_chat;
pub mod backend;
pub mod chat_completions;
pub mod completer;
pub mod error;
pub mod poller;
pub(crate) mod retry;
pub mod types;

pub use async_chat::AsyncChatClient;
pub use backend::CompletionBackend;
pub use chat_completions::ChatCompletionsClient;
pub use completer::AiCompleter;
pub use error::AiError;
pub use poller::{JobPhase, JobPoller};
pub use types::{JobRef, PollStatus, Prompt, Submission};
