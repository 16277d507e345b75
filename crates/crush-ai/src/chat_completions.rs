//! Client for OpenAI-style `chat/completions` endpoints (OpenRouter by default).
//!
//! A single POST carries the instruction block, the user text and every image
//! as content parts; the answer is `choices[0].message.content`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::backend::CompletionBackend;
use crate::error::{api_error, AiError};
use crate::types::{Prompt, Submission};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

const MAX_TOKENS: u32 = 4000;
const TEMPERATURE: f32 = 0.7;

/// Client for a synchronous chat-completions backend.
///
/// Use [`ChatCompletionsClient::new`] for production or
/// [`ChatCompletionsClient::with_base_url`] to point at a mock server.
pub struct ChatCompletionsClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl ChatCompletionsClient {
    /// # Errors
    ///
    /// Returns [`AiError::Http`] if the underlying `reqwest::Client` cannot be
    /// constructed.
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> Result<Self, AiError> {
        Self::with_base_url(api_key, model, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for proxies or wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`AiError::Http`] if the underlying `reqwest::Client` cannot be
    /// constructed, or [`AiError::InvalidConfig`] if the key or model is empty.
    pub fn with_base_url(
        api_key: &str,
        model: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, AiError> {
        if api_key.trim().is_empty() {
            return Err(AiError::InvalidConfig("API key is empty".to_owned()));
        }
        if model.trim().is_empty() {
            return Err(AiError::InvalidConfig("model is empty".to_owned()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("crush-report/0.1")
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            model: model.to_owned(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    fn build_request<'a>(&'a self, prompt: &'a Prompt) -> ChatRequest<'a> {
        let mut parts = Vec::with_capacity(prompt.images.len() + 1);
        parts.push(ContentPart::Text { text: &prompt.text });
        parts.extend(prompt.images.iter().map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl { url },
        }));

        let mut messages = Vec::with_capacity(2);
        if !prompt.system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: MessageContent::Text(&prompt.system),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: MessageContent::Parts(parts),
        });

        ChatRequest {
            model: &self.model,
            messages,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        }
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionsClient {
    fn name(&self) -> &'static str {
        "chat_completions"
    }

    async fn submit(&self, prompt: &Prompt) -> Result<Submission, AiError> {
        let request = self.build_request(prompt);

        tracing::debug!(
            model = %self.model,
            images = prompt.images.len(),
            "submitting chat completion"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", "https://crushandbeyond.com")
            .header("X-Title", "Crush & Beyond Personality Report")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body = response.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| AiError::Deserialize {
                context: "chat/completions response".to_owned(),
                source: e,
            })?;

        if let Some(error) = parsed.error {
            return Err(AiError::ExternalServiceFailed(error.message));
        }

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(AiError::NoAnswerFound)?;

        Ok(Submission::Completed(text))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
