use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which shape of AI backend the report generator talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiBackendKind {
    /// One request, one response (OpenAI-style `chat/completions`).
    ChatCompletions,
    /// Submit a chat job, poll its status, then fetch the answer messages.
    AsyncJob,
}

impl std::fmt::Display for AiBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiBackendKind::ChatCompletions => write!(f, "chat_completions"),
            AiBackendKind::AsyncJob => write!(f, "async_job"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub ai_backend: AiBackendKind,
    pub ai_api_key: String,
    pub ai_base_url: Option<String>,
    pub ai_model: String,
    pub ai_bot_id: Option<String>,
    pub ai_request_timeout_secs: u64,
    pub ai_poll_interval_ms: u64,
    pub ai_max_poll_attempts: u32,
    pub ai_max_retries: u32,
    pub image_fetch_timeout_secs: u64,
    pub image_max_dimension: u32,
    pub image_jpeg_quality: u8,
    pub chrome_path: PathBuf,
    pub render_timeout_secs: u64,
    pub reports_dir: PathBuf,
    pub public_base_url: String,
    pub assets_dir: PathBuf,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("ai_backend", &self.ai_backend)
            .field("ai_api_key", &"[redacted]")
            .field("ai_base_url", &self.ai_base_url)
            .field("ai_model", &self.ai_model)
            .field("ai_bot_id", &self.ai_bot_id)
            .field("ai_request_timeout_secs", &self.ai_request_timeout_secs)
            .field("ai_poll_interval_ms", &self.ai_poll_interval_ms)
            .field("ai_max_poll_attempts", &self.ai_max_poll_attempts)
            .field("ai_max_retries", &self.ai_max_retries)
            .field("image_fetch_timeout_secs", &self.image_fetch_timeout_secs)
            .field("image_max_dimension", &self.image_max_dimension)
            .field("image_jpeg_quality", &self.image_jpeg_quality)
            .field("chrome_path", &self.chrome_path)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("reports_dir", &self.reports_dir)
            .field("public_base_url", &self.public_base_url)
            .field("assets_dir", &self.assets_dir)
            .finish()
    }
}
