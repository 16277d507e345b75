//! Batch audit records and the live progress snapshot of a batch run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status text written once the last applicant of a batch has been handled.
pub const COMPLETION_SENTINEL: &str = "all processing complete";

/// Status text written when a batch is accepted and before the first applicant.
pub const PREPARING_STATUS: &str = "preparing";

/// One audit entry per applicant per batch run. Never updated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub id: i64,
    pub run_id: Uuid,
    pub applicant_id: Uuid,
    pub name: String,
    pub success: bool,
    pub error: Option<String>,
    pub status: String,
    pub report_generated: bool,
    pub pdf_generated: bool,
    pub pdf_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A processing record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProcessingRecord {
    pub run_id: Uuid,
    pub applicant_id: Uuid,
    pub name: String,
    pub success: bool,
    pub error: Option<String>,
    pub status: String,
    pub report_generated: bool,
    pub pdf_generated: bool,
    pub pdf_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl NewProcessingRecord {
    #[must_use]
    pub fn started(run_id: Uuid, applicant_id: Uuid) -> Self {
        Self {
            run_id,
            applicant_id,
            name: String::new(),
            success: false,
            error: None,
            status: "started".to_string(),
            report_generated: false,
            pdf_generated: false,
            pdf_url: None,
            timestamp: Utc::now(),
        }
    }
}

/// Live view of the running (or last finished) batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BatchProgress {
    pub run_id: Option<Uuid>,
    /// 1-based index of the applicant being processed.
    pub current: usize,
    pub total: usize,
    pub current_user: String,
    pub status: String,
}

impl BatchProgress {
    #[must_use]
    pub fn preparing(run_id: Uuid, total: usize) -> Self {
        Self {
            run_id: Some(run_id),
            current: 0,
            total,
            current_user: String::new(),
            status: PREPARING_STATUS.to_string(),
        }
    }

    /// `current == total` alone is true while the last applicant is still
    /// in flight, so the sentinel must also be present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current == self.total && self.status.contains(COMPLETION_SENTINEL)
    }
}
