//! Background batch runs: report then PDF for each applicant, in order.
//!
//! At most one batch runs per process. Applicants are processed strictly one
//! after another. Every applicant gets exactly one processing record,
//! written before the next one starts, whatever happened to it.

mod progress;

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crush_core::{
    Applicant, BatchProgress, NewProcessingRecord, ProcessingRecord, COMPLETION_SENTINEL,
};
use crush_db::DbError;

use crate::error::ReportError;
use crate::generator::ReportGenerator;
use crate::pdf::PdfBuilder;
use crate::store::{ApplicantStore, ProcessingRecordStore};

use progress::{ProgressTracker, RunGuard};

pub const DEFAULT_RECORD_LIMIT: i64 = 100;
pub const MAX_RECORD_LIMIT: i64 = 500;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("a batch is already running")]
    AlreadyRunning,

    #[error("no applicant ids given")]
    Empty,
}

/// An accepted batch. Dropping it leaves the run going in the background.
#[derive(Debug)]
pub struct BatchStarted {
    pub run_id: Uuid,
    pub total: usize,
    handle: JoinHandle<()>,
}

impl BatchStarted {
    /// Waits for the run to finish.
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(run_id = %self.run_id, error = %e, "batch task ended abnormally");
        }
    }
}

#[derive(Clone)]
pub struct BatchOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    applicants: Arc<dyn ApplicantStore>,
    records: Arc<dyn ProcessingRecordStore>,
    generator: Arc<ReportGenerator>,
    pdf: Arc<PdfBuilder>,
    progress: Arc<ProgressTracker>,
}

impl BatchOrchestrator {
    #[must_use]
    pub fn new(
        applicants: Arc<dyn ApplicantStore>,
        records: Arc<dyn ProcessingRecordStore>,
        generator: Arc<ReportGenerator>,
        pdf: Arc<PdfBuilder>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                applicants,
                records,
                generator,
                pdf,
                progress: Arc::new(ProgressTracker::default()),
            }),
        }
    }

    /// Starts a batch over `ids` in the background.
    ///
    /// Duplicate ids are processed once per occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::AlreadyRunning`] without any side effect while
    /// another batch is active, or [`BatchError::Empty`] for an empty list.
    pub fn start_batch(&self, ids: Vec<Uuid>) -> Result<BatchStarted, BatchError> {
        if ids.is_empty() {
            return Err(BatchError::Empty);
        }

        let run_id = Uuid::new_v4();
        let total = ids.len();
        let guard = self
            .inner
            .progress
            .try_begin(run_id, total)
            .ok_or(BatchError::AlreadyRunning)?;

        tracing::info!(%run_id, total, "batch accepted");
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run(run_id, ids, guard).await });

        Ok(BatchStarted {
            run_id,
            total,
            handle,
        })
    }

    #[must_use]
    pub fn progress(&self) -> BatchProgress {
        self.inner.progress.snapshot()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.progress.is_running()
    }

    /// Most recent processing records first. `limit` is clamped to
    /// `1..=MAX_RECORD_LIMIT`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the records cannot be read.
    pub async fn records(&self, limit: Option<i64>) -> Result<Vec<ProcessingRecord>, DbError> {
        let limit = limit
            .unwrap_or(DEFAULT_RECORD_LIMIT)
            .clamp(1, MAX_RECORD_LIMIT);
        self.inner.records.recent(limit).await
    }
}

impl Inner {
    async fn run(&self, run_id: Uuid, ids: Vec<Uuid>, _guard: RunGuard) {
        let total = ids.len();
        let mut succeeded = 0usize;

        for (index, id) in ids.into_iter().enumerate() {
            self.progress.update(|p| {
                p.current = index + 1;
                p.current_user.clear();
                p.status = format!("loading applicant {id}");
            });

            let record = self.process_one(run_id, id).await;
            if record.success {
                succeeded += 1;
            }
            if let Err(e) = self.records.append(&record).await {
                tracing::error!(
                    %run_id,
                    applicant_id = %id,
                    error = %e,
                    "failed to write processing record"
                );
            }
        }

        self.progress.set_status(format!(
            "{COMPLETION_SENTINEL}: {succeeded} of {total} succeeded"
        ));
        tracing::info!(%run_id, total, succeeded, "batch finished");
    }

    async fn process_one(&self, run_id: Uuid, id: Uuid) -> NewProcessingRecord {
        let mut record = NewProcessingRecord::started(run_id, id);

        let applicant = match self.applicants.get_applicant(id).await {
            Ok(Some(applicant)) => applicant,
            Ok(None) => return self.failed(record, &ReportError::NotFound(id)),
            Err(e) => return self.failed(record, &ReportError::Store(e)),
        };
        record.name.clone_from(&applicant.name);
        self.progress.update(|p| {
            p.current_user.clone_from(&applicant.name);
            p.status = format!("generating report for {}", applicant.name);
        });

        let reported = match self.generator.generate_for(&applicant).await {
            Ok(updated) => updated,
            Err(e) => return self.failed(record, &e),
        };
        record.report_generated = true;

        self.report_pdf(&mut record, &reported).await;
        record.success = true;
        record.timestamp = Utc::now();
        record
    }

    /// PDF stage. A failure here is recorded but keeps the run successful.
    async fn report_pdf(&self, record: &mut NewProcessingRecord, applicant: &Applicant) {
        let name = &applicant.name;
        self.progress
            .set_status(format!("report ready for {name}, generating PDF"));

        match self.pdf.build_for(applicant).await {
            Ok(outcome) => {
                record.pdf_generated = true;
                record.pdf_url = Some(outcome.artifact_url);
                record.status = format!("PDF ready for {name}");
            }
            Err(e) => {
                tracing::warn!(
                    applicant_id = %applicant.id,
                    kind = e.kind(),
                    error = %e,
                    "PDF stage failed"
                );
                record.error = Some(format!("PDF failed: {e}"));
                record.status = format!("report ready for {name}, PDF failed: {e}");
            }
        }
        self.progress.set_status(record.status.clone());
    }

    fn failed(&self, mut record: NewProcessingRecord, err: &ReportError) -> NewProcessingRecord {
        let who = if record.name.is_empty() {
            record.applicant_id.to_string()
        } else {
            record.name.clone()
        };
        tracing::warn!(
            run_id = %record.run_id,
            applicant_id = %record.applicant_id,
            kind = err.kind(),
            error = %err,
            "applicant failed"
        );
        record.success = false;
        record.error = Some(err.to_string());
        record.status = format!("failed for {who}: {err}");
        record.timestamp = Utc::now();
        self.progress.set_status(record.status.clone());
        record
    }
}
