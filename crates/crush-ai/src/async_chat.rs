//! Client for a job-based chat API (Coze v3 shape).
//!
//! - `POST /v3/chat` accepts the prompt and returns a chat id plus a
//!   conversation id.
//! - `GET /v3/chat/retrieve` reports the job status.
//! - `GET /v3/chat/message/list` returns the messages once the job completes.
//!
//! Every response is wrapped in `{"code": 0, "msg": "", "data": ...}`; a
//! non-zero `code` is a business failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::backend::CompletionBackend;
use crate::error::{api_error, AiError};
use crate::types::{JobRef, PollStatus, Prompt, Submission};

pub const DEFAULT_BASE_URL: &str = "https://api.coze.com";

const USER_ID: &str = "crush-report";

/// Answer messages whose content starts with one of these are bookkeeping
/// emitted by the backend, not model output.
const SYSTEM_SENTINELS: &[&str] = &["{\"msg_type\"", "{\"finish_reason\""];

/// Client for an asynchronous chat-job backend.
pub struct AsyncChatClient {
    client: Client,
    api_key: String,
    bot_id: String,
    base_url: Url,
}

impl AsyncChatClient {
    /// # Errors
    ///
    /// Returns [`AiError::Http`] if the underlying `reqwest::Client` cannot be
    /// constructed, or [`AiError::InvalidConfig`] if the key or bot id is empty.
    pub fn new(api_key: &str, bot_id: &str, timeout_secs: u64) -> Result<Self, AiError> {
        Self::with_base_url(api_key, bot_id, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Same as [`AsyncChatClient::new`], plus [`AiError::InvalidConfig`] if
    /// `base_url` is not a valid URL.
    pub fn with_base_url(
        api_key: &str,
        bot_id: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, AiError> {
        if api_key.trim().is_empty() {
            return Err(AiError::InvalidConfig("API key is empty".to_owned()));
        }
        if bot_id.trim().is_empty() {
            return Err(AiError::InvalidConfig("bot id is empty".to_owned()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("crush-report/0.1")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| AiError::InvalidConfig(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            bot_id: bot_id.to_owned(),
            base_url,
        })
    }

    fn url(&self, path: &str, job: Option<&JobRef>) -> Result<Url, AiError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| AiError::InvalidConfig(format!("invalid endpoint path '{path}': {e}")))?;
        if let Some(job) = job {
            url.query_pairs_mut()
                .append_pair("chat_id", &job.job_id)
                .append_pair("conversation_id", &job.conversation_id);
        }
        Ok(url)
    }

    /// Reads the `{code, msg, data}` envelope and returns `data`.
    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
        context: &str,
    ) -> Result<T, AiError> {
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let body = response.text().await?;
        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|e| AiError::Deserialize {
                context: context.to_owned(),
                source: e,
            })?;
        if envelope.code != 0 {
            return Err(AiError::ExternalServiceFailed(format!(
                "code {}: {}",
                envelope.code, envelope.msg
            )));
        }
        envelope.data.ok_or_else(|| {
            AiError::ExternalServiceFailed(format!("{context}: response carried no data"))
        })
    }

    fn object_string(prompt: &Prompt) -> Result<String, AiError> {
        let mut items = Vec::with_capacity(prompt.images.len() + 1);
        let text = if prompt.system.is_empty() {
            prompt.text.clone()
        } else {
            format!("{}\n\n{}", prompt.system, prompt.text)
        };
        items.push(ObjectItem::Text { text });
        items.extend(prompt.images.iter().map(|url| ObjectItem::Image {
            file_url: url.clone(),
        }));
        serde_json::to_string(&items).map_err(|e| AiError::Deserialize {
            context: "object_string prompt".to_owned(),
            source: e,
        })
    }
}

/// Picks the first real answer: `type = answer`, text content, non-empty and
/// not a backend sentinel.
pub(crate) fn select_answer(messages: Vec<ChatMessage>) -> Option<String> {
    messages.into_iter().find_map(|message| {
        let usable = message.kind == "answer"
            && message.content_type == "text"
            && !message.content.trim().is_empty()
            && !SYSTEM_SENTINELS
                .iter()
                .any(|s| message.content.trim_start().starts_with(s));
        usable.then_some(message.content)
    })
}

#[async_trait]
impl CompletionBackend for AsyncChatClient {
    fn name(&self) -> &'static str {
        "async_job"
    }

    async fn submit(&self, prompt: &Prompt) -> Result<Submission, AiError> {
        let request = SubmitRequest {
            bot_id: &self.bot_id,
            user_id: USER_ID,
            stream: false,
            auto_save_history: true,
            additional_messages: vec![AdditionalMessage {
                role: "user",
                content: Self::object_string(prompt)?,
                content_type: "object_string",
            }],
        };

        let response = self
            .client
            .post(self.url("v3/chat", None)?)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let chat: ChatObject = Self::read_envelope(response, "v3/chat").await?;
        tracing::debug!(
            job_id = %chat.id,
            conversation_id = %chat.conversation_id,
            "chat job accepted"
        );

        Ok(Submission::Pending(JobRef {
            job_id: chat.id,
            conversation_id: chat.conversation_id,
        }))
    }

    async fn poll(&self, job: &JobRef) -> Result<PollStatus, AiError> {
        let response = self
            .client
            .get(self.url("v3/chat/retrieve", Some(job))?)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let chat: ChatObject = Self::read_envelope(response, "v3/chat/retrieve").await?;
        Ok(match chat.status.as_str() {
            "completed" => PollStatus::Completed,
            "failed" => PollStatus::Failed(
                chat.last_error
                    .map(|e| e.msg)
                    .filter(|msg| !msg.is_empty())
                    .unwrap_or_else(|| "chat job failed".to_owned()),
            ),
            "canceled" => PollStatus::Failed("chat job was canceled".to_owned()),
            "requires_action" => {
                PollStatus::Failed("chat job requires a tool action".to_owned())
            }
            _ => PollStatus::InProgress,
        })
    }

    async fn fetch_answer(&self, job: &JobRef) -> Result<String, AiError> {
        let response = self
            .client
            .get(self.url("v3/chat/message/list", Some(job))?)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let messages: Vec<ChatMessage> =
            Self::read_envelope(response, "v3/chat/message/list").await?;
        select_answer(messages).ok_or(AiError::NoAnswerFound)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    bot_id: &'a str,
    user_id: &'a str,
    stream: bool,
    auto_save_history: bool,
    additional_messages: Vec<AdditionalMessage>,
}

#[derive(Debug, Serialize)]
struct AdditionalMessage {
    role: &'static str,
    content: String,
    content_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ObjectItem {
    Text { text: String },
    Image { file_url: String },
}

#[derive(Debug, Deserialize)]
struct ChatObject {
    id: String,
    conversation_id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    last_error: Option<LastError>,
}

#[derive(Debug, Deserialize)]
struct LastError {
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatMessage {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    content_type: String,
}
