use thiserror::Error;

/// Errors returned by the AI backend clients.
#[derive(Debug, Error)]
pub enum AiError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-2xx HTTP status.
    #[error("AI backend returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// The backend reported a terminal failure for the request or job.
    #[error("AI backend reported failure: {0}")]
    ExternalServiceFailed(String),

    /// An asynchronous job was still running when the poll bound ran out.
    #[error("AI job did not finish after {attempts} status polls")]
    Timeout { attempts: u32 },

    /// The job completed but no usable answer message was returned.
    #[error("AI job completed without an answer message")]
    NoAnswerFound,

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid AI client configuration: {0}")]
    InvalidConfig(String),

    /// The backend shape has no such step (e.g. polling a synchronous backend).
    #[error("{backend} backend does not support {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },
}

impl AiError {
    /// Transport-level failures worth another status poll: connect errors,
    /// timeouts, truncated or undecodable bodies, 429 and 5xx.
    ///
    /// Business-level failures (`ExternalServiceFailed`, a missing answer,
    /// malformed payloads, 4xx) are never transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            AiError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.is_body()
                    || e.is_decode()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            AiError::Api { status, .. } => *status == 429 || *status >= 500,
            AiError::ExternalServiceFailed(_)
            | AiError::Timeout { .. }
            | AiError::NoAnswerFound
            | AiError::Deserialize { .. }
            | AiError::InvalidConfig(_)
            | AiError::Unsupported { .. } => false,
        }
    }

    /// Whether a submission can be sent again without risking a second job
    /// or generation.
    ///
    /// Only a failed connect qualifies: the request never reached the
    /// backend. Timeouts, 429 and 5xx answers are terminal for a submission.
    #[must_use]
    pub fn is_retryable_submit(&self) -> bool {
        matches!(self, AiError::Http(e) if e.is_connect())
    }
}

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Builds an [`AiError::Api`] from a failed response, keeping only the head
/// of the body.
pub(crate) async fn api_error(response: reqwest::Response) -> AiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let body = if body.chars().count() > MAX_ERROR_BODY_CHARS {
        let head: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{head}...")
    } else {
        body
    };
    AiError::Api { status, body }
}
