//! Persistence seams used by the pipeline, with the Postgres implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crush_core::{Applicant, NewProcessingRecord, PdfArtifact, ProcessingRecord};
use crush_db::DbError;

#[async_trait]
pub trait ApplicantStore: Send + Sync {
    async fn get_applicant(&self, id: Uuid) -> Result<Option<Applicant>, DbError>;

    /// Writes one report revision atomically. See [`crush_db::record_report`].
    async fn record_report(
        &self,
        id: Uuid,
        raw_response: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<Applicant, DbError>;

    /// Adds `artifact` at the front of the PDF history.
    async fn prepend_pdf_artifact(
        &self,
        id: Uuid,
        artifact: &PdfArtifact,
    ) -> Result<Applicant, DbError>;
}

#[async_trait]
pub trait ProcessingRecordStore: Send + Sync {
    async fn append(&self, record: &NewProcessingRecord) -> Result<i64, DbError>;

    /// Most recent records first.
    async fn recent(&self, limit: i64) -> Result<Vec<ProcessingRecord>, DbError>;
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicantStore for PgStore {
    async fn get_applicant(&self, id: Uuid) -> Result<Option<Applicant>, DbError> {
        crush_db::get_applicant(&self.pool, id)
            .await?
            .map(crush_db::ApplicantRow::into_applicant)
            .transpose()
    }

    async fn record_report(
        &self,
        id: Uuid,
        raw_response: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<Applicant, DbError> {
        crush_db::record_report(&self.pool, id, raw_response, generated_at)
            .await?
            .into_applicant()
    }

    async fn prepend_pdf_artifact(
        &self,
        id: Uuid,
        artifact: &PdfArtifact,
    ) -> Result<Applicant, DbError> {
        crush_db::prepend_pdf_artifact(&self.pool, id, artifact)
            .await?
            .into_applicant()
    }
}

#[async_trait]
impl ProcessingRecordStore for PgStore {
    async fn append(&self, record: &NewProcessingRecord) -> Result<i64, DbError> {
        crush_db::insert_processing_record(&self.pool, record).await
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ProcessingRecord>, DbError> {
        let rows = crush_db::list_processing_records(&self.pool, limit).await?;
        Ok(rows.into_iter().map(ProcessingRecord::from).collect())
    }
}
