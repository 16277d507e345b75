use crate::app_config::{AiBackendKind, AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;
    let ai_api_key = require("CRUSH_AI_API_KEY")?;

    let env = parse_environment(&or_default("CRUSH_ENV", "development"))?;
    let bind_addr = parse_addr("CRUSH_BIND_ADDR", "0.0.0.0:3001")?;
    let log_level = or_default("CRUSH_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("CRUSH_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("CRUSH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("CRUSH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let ai_backend = parse_ai_backend(&or_default("CRUSH_AI_BACKEND", "chat_completions"))?;
    let ai_base_url = lookup("CRUSH_AI_BASE_URL")
        .ok()
        .filter(|v| !v.trim().is_empty());
    let ai_model = or_default("CRUSH_AI_MODEL", "anthropic/claude-3.5-sonnet");
    let ai_bot_id = lookup("CRUSH_AI_BOT_ID")
        .ok()
        .filter(|v| !v.trim().is_empty());
    if ai_backend == AiBackendKind::AsyncJob && ai_bot_id.is_none() {
        return Err(invalid(
            "CRUSH_AI_BOT_ID",
            "required when CRUSH_AI_BACKEND=async_job".to_string(),
        ));
    }
    let ai_request_timeout_secs = parse_u64("CRUSH_AI_REQUEST_TIMEOUT_SECS", "180")?;
    let ai_poll_interval_ms = parse_u64("CRUSH_AI_POLL_INTERVAL_MS", "2000")?;
    let ai_max_poll_attempts = parse_u32("CRUSH_AI_MAX_POLL_ATTEMPTS", "150")?;
    if ai_max_poll_attempts == 0 {
        return Err(invalid(
            "CRUSH_AI_MAX_POLL_ATTEMPTS",
            "must be at least 1".to_string(),
        ));
    }
    let ai_max_retries = parse_u32("CRUSH_AI_MAX_RETRIES", "2")?;

    let image_fetch_timeout_secs = parse_u64("CRUSH_IMAGE_FETCH_TIMEOUT_SECS", "20")?;
    let image_max_dimension = parse_u32("CRUSH_IMAGE_MAX_DIMENSION", "1600")?;
    if image_max_dimension == 0 {
        return Err(invalid(
            "CRUSH_IMAGE_MAX_DIMENSION",
            "must be at least 1".to_string(),
        ));
    }
    let image_jpeg_quality = parse_jpeg_quality(&or_default("CRUSH_IMAGE_JPEG_QUALITY", "80"))?;

    let chrome_path = PathBuf::from(or_default("CRUSH_CHROME_PATH", "chromium"));
    let render_timeout_secs = parse_u64("CRUSH_RENDER_TIMEOUT_SECS", "60")?;
    let reports_dir = PathBuf::from(or_default("CRUSH_REPORTS_DIR", "./public/reports"));
    let public_base_url = or_default("CRUSH_PUBLIC_BASE_URL", "http://localhost:3001")
        .trim_end_matches('/')
        .to_string();
    let assets_dir = PathBuf::from(or_default("CRUSH_ASSETS_DIR", "./assets"));

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        ai_backend,
        ai_api_key,
        ai_base_url,
        ai_model,
        ai_bot_id,
        ai_request_timeout_secs,
        ai_poll_interval_ms,
        ai_max_poll_attempts,
        ai_max_retries,
        image_fetch_timeout_secs,
        image_max_dimension,
        image_jpeg_quality,
        chrome_path,
        render_timeout_secs,
        reports_dir,
        public_base_url,
        assets_dir,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CRUSH_ENV".to_string(),
            reason: format!("expected development, test or production, got '{other}'"),
        }),
    }
}

fn parse_ai_backend(s: &str) -> Result<AiBackendKind, ConfigError> {
    match s {
        "chat_completions" => Ok(AiBackendKind::ChatCompletions),
        "async_job" => Ok(AiBackendKind::AsyncJob),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CRUSH_AI_BACKEND".to_string(),
            reason: format!("expected chat_completions or async_job, got '{other}'"),
        }),
    }
}

fn parse_jpeg_quality(s: &str) -> Result<u8, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar {
        var: "CRUSH_IMAGE_JPEG_QUALITY".to_string(),
        reason,
    };
    let quality = s.parse::<u8>().map_err(|e| invalid(e.to_string()))?;
    if (1..=100).contains(&quality) {
        Ok(quality)
    } else {
        Err(invalid(format!("must be between 1 and 100, got {quality}")))
    }
}
