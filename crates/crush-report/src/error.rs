use crush_ai::AiError;
use crush_db::DbError;
use thiserror::Error;
use uuid::Uuid;

/// Failures of a single report or PDF operation.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("applicant {0} not found")]
    NotFound(Uuid),

    #[error("none of the applicant's {attempted} images could be processed")]
    NoUsableImages { attempted: usize },

    #[error("applicant has no generated report")]
    NoReport,

    #[error("report text is not a valid section array: {0}")]
    MalformedReportJson(String),

    /// The AI backend failed terminally. Carries the backend's reason.
    #[error("AI service failed: {0}")]
    ExternalServiceFailed(String),

    /// The AI job outlived its poll bound. The caller may retry later.
    #[error("AI job still running after {attempts} status polls")]
    Timeout { attempts: u32 },

    #[error("PDF render did not finish within {secs}s")]
    RenderTimeout { secs: u64 },

    #[error("PDF render failed: {0}")]
    RenderFailed(String),

    #[error("failed to store PDF artifact: {0}")]
    StorageWriteFailed(String),

    #[error("database error: {0}")]
    Store(#[from] DbError),
}

impl ReportError {
    /// Stable machine-readable code, used as the API error code.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ReportError::NotFound(_) => "not_found",
            ReportError::NoUsableImages { .. } => "no_usable_images",
            ReportError::NoReport => "no_report",
            ReportError::MalformedReportJson(_) => "malformed_report_json",
            ReportError::ExternalServiceFailed(_) => "external_service_failed",
            ReportError::Timeout { .. } => "timeout",
            ReportError::RenderTimeout { .. } => "render_timeout",
            ReportError::RenderFailed(_) => "render_failed",
            ReportError::StorageWriteFailed(_) => "storage_write_failed",
            ReportError::Store(_) => "store_error",
        }
    }
}

impl From<AiError> for ReportError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::Timeout { attempts } => ReportError::Timeout { attempts },
            AiError::ExternalServiceFailed(reason) => ReportError::ExternalServiceFailed(reason),
            other => ReportError::ExternalServiceFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ai_timeout_stays_distinct_from_service_failure() {
        let timeout = ReportError::from(AiError::Timeout { attempts: 150 });
        assert_eq!(timeout.kind(), "timeout");

        let failed = ReportError::from(AiError::ExternalServiceFailed("quota".to_owned()));
        assert_eq!(failed.kind(), "external_service_failed");
        assert_eq!(failed.to_string(), "AI service failed: quota");
    }

    #[test]
    fn missing_answer_is_a_service_failure() {
        let err = ReportError::from(AiError::NoAnswerFound);
        assert!(matches!(err, ReportError::ExternalServiceFailed(_)));
    }
}
