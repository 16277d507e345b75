//! Domain types and configuration shared by every Crush crate.

mod app_config;
pub mod applicant;
mod config;
pub mod processing;

use thiserror::Error;

pub use app_config::{AiBackendKind, AppConfig, Environment};
pub use applicant::{
    Applicant, ApplicantStatus, Gender, Orientation, PdfArtifact, PersonalityReport,
    ReportContent,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use processing::{
    BatchProgress, NewProcessingRecord, ProcessingRecord, COMPLETION_SENTINEL, PREPARING_STATUS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid applicant status: {0}")]
    InvalidStatus(String),

    #[error("invalid gender: {0}")]
    InvalidGender(String),

    #[error("invalid orientation: {0}")]
    InvalidOrientation(String),
}
