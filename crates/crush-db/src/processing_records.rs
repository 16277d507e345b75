//! Database operations for the append-only `processing_records` audit table.

use chrono::{DateTime, Utc};
use crush_core::{NewProcessingRecord, ProcessingRecord};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `processing_records` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessingRecordRow {
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

impl From<ProcessingRecordRow> for ProcessingRecord {
    fn from(row: ProcessingRecordRow) -> Self {
        Self {
            id: row.id,
            run_id: row.run_id,
            applicant_id: row.applicant_id,
            name: row.name,
            success: row.success,
            error: row.error,
            status: row.status,
            report_generated: row.report_generated,
            pdf_generated: row.pdf_generated,
            pdf_url: row.pdf_url,
            timestamp: row.timestamp,
        }
    }
}

/// Appends one processing record and returns its generated `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_processing_record(
    pool: &PgPool,
    record: &NewProcessingRecord,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO processing_records \
             (run_id, applicant_id, name, success, error, status, \
              report_generated, pdf_generated, pdf_url, timestamp) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING id",
    )
    .bind(record.run_id)
    .bind(record.applicant_id)
    .bind(&record.name)
    .bind(record.success)
    .bind(record.error.as_deref())
    .bind(&record.status)
    .bind(record.report_generated)
    .bind(record.pdf_generated)
    .bind(record.pdf_url.as_deref())
    .bind(record.timestamp)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Returns the most recent `limit` records, newest first.
///
/// Ties on `timestamp` fall back to insertion order so records from one run
/// keep their relative order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_processing_records(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<ProcessingRecordRow>, DbError> {
    let rows = sqlx::query_as::<_, ProcessingRecordRow>(
        "SELECT id, run_id, applicant_id, name, success, error, status, \
                report_generated, pdf_generated, pdf_url, timestamp \
         FROM processing_records \
         ORDER BY timestamp DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
