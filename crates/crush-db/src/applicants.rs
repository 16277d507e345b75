//! Database operations for `applicants` and the personality report columns
//! stored on each row.

use chrono::{DateTime, Utc};
use crush_core::{
    Applicant, ApplicantStatus, Gender, Orientation, PdfArtifact, PersonalityReport,
    ReportContent,
};
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::DbError;

const APPLICANT_COLUMNS: &str = "id, name, phone, wechat, gender, orientation, birth_date, \
     zodiac, mbti, location, occupation, self_intro, images, status, matched_with, matched_at, \
     report_raw_response, report_generated_at, report_generation_count, report_pdf_reports, \
     created_at, updated_at";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `applicants` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApplicantRow {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub wechat: String,
    pub gender: String,
    pub orientation: String,
    pub birth_date: String,
    pub zodiac: String,
    pub mbti: String,
    pub location: String,
    pub occupation: String,
    pub self_intro: String,
    pub images: Vec<String>,
    pub status: String,
    pub matched_with: Option<Uuid>,
    pub matched_at: Option<DateTime<Utc>>,
    pub report_raw_response: Option<String>,
    pub report_generated_at: Option<DateTime<Utc>>,
    pub report_generation_count: i32,
    pub report_pdf_reports: Json<Vec<PdfArtifact>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicantRow {
    /// Converts the flat row into the domain [`Applicant`].
    ///
    /// A report is present once it has been generated at least once. PDF
    /// history without report text cannot be produced by the pipeline but is
    /// still surfaced rather than dropped.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] if an enum column holds an unknown value.
    pub fn into_applicant(self) -> Result<Applicant, DbError> {
        let gender = self
            .gender
            .parse::<Gender>()
            .map_err(|e| DbError::InvalidRow {
                column: "gender",
                reason: e.to_string(),
            })?;
        let orientation =
            self.orientation
                .parse::<Orientation>()
                .map_err(|e| DbError::InvalidRow {
                    column: "orientation",
                    reason: e.to_string(),
                })?;
        let status = self
            .status
            .parse::<ApplicantStatus>()
            .map_err(|e| DbError::InvalidRow {
                column: "status",
                reason: e.to_string(),
            })?;

        let pdf_reports = self.report_pdf_reports.0;
        let personality_report = match (self.report_raw_response, self.report_generated_at) {
            (Some(raw_response), Some(generated_at)) => Some(PersonalityReport {
                content: ReportContent { raw_response },
                generated_at,
                generation_count: self.report_generation_count,
                pdf_reports,
            }),
            (raw, generated_at) if !pdf_reports.is_empty() => Some(PersonalityReport {
                content: ReportContent {
                    raw_response: raw.unwrap_or_default(),
                },
                generated_at: generated_at.unwrap_or(self.updated_at),
                generation_count: self.report_generation_count,
                pdf_reports,
            }),
            _ => None,
        };

        Ok(Applicant {
            id: self.id,
            name: self.name,
            phone: self.phone,
            wechat: self.wechat,
            gender,
            orientation,
            birth_date: self.birth_date,
            zodiac: self.zodiac,
            mbti: self.mbti,
            location: self.location,
            occupation: self.occupation,
            self_intro: self.self_intro,
            images: self.images,
            status,
            matched_with: self.matched_with,
            matched_at: self.matched_at,
            personality_report,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Fields of a questionnaire submission.
#[derive(Debug, Clone)]
pub struct NewApplicant {
    pub name: String,
    pub phone: String,
    pub wechat: String,
    pub gender: Gender,
    pub orientation: Orientation,
    pub birth_date: String,
    pub zodiac: String,
    pub mbti: String,
    pub location: String,
    pub occupation: String,
    pub self_intro: String,
    pub images: Vec<String>,
}

/// A matched applicant that has no generated report yet.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingReportRow {
    pub id: Uuid,
    pub name: String,
    pub matched_at: Option<DateTime<Utc>>,
    pub matched_with_id: Option<Uuid>,
    pub matched_with_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Fetches a single applicant by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_applicant(pool: &PgPool, id: Uuid) -> Result<Option<ApplicantRow>, DbError> {
    let row = sqlx::query_as::<_, ApplicantRow>(&format!(
        "SELECT {APPLICANT_COLUMNS} FROM applicants WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Lists matched applicants whose report has never been generated, newest
/// match first, together with their partner's name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_applicants_needing_report(
    pool: &PgPool,
) -> Result<Vec<PendingReportRow>, DbError> {
    let rows = sqlx::query_as::<_, PendingReportRow>(
        "SELECT a.id, a.name, a.matched_at, \
                p.id AS matched_with_id, p.name AS matched_with_name \
         FROM applicants a \
         LEFT JOIN applicants p ON p.id = a.matched_with \
         WHERE a.status = 'matched' \
           AND a.matched_with IS NOT NULL \
           AND a.report_generation_count = 0 \
         ORDER BY a.matched_at DESC NULLS LAST, a.id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts a new applicant in `submitted` status and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_applicant(
    pool: &PgPool,
    applicant: &NewApplicant,
) -> Result<ApplicantRow, DbError> {
    let row = sqlx::query_as::<_, ApplicantRow>(&format!(
        "INSERT INTO applicants \
             (id, name, phone, wechat, gender, orientation, birth_date, zodiac, mbti, \
              location, occupation, self_intro, images) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         RETURNING {APPLICANT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&applicant.name)
    .bind(&applicant.phone)
    .bind(&applicant.wechat)
    .bind(applicant.gender.as_str())
    .bind(applicant.orientation.as_str())
    .bind(&applicant.birth_date)
    .bind(&applicant.zodiac)
    .bind(&applicant.mbti)
    .bind(&applicant.location)
    .bind(&applicant.occupation)
    .bind(&applicant.self_intro)
    .bind(&applicant.images)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Writes a new report revision in one statement.
///
/// Overwrites the report text, stamps `generated_at`, increments
/// `report_generation_count`, and moves `submitted` to `reported`. Other
/// statuses are left as they are. PDF history is not touched.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the applicant does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn record_report(
    pool: &PgPool,
    id: Uuid,
    raw_response: &str,
    generated_at: DateTime<Utc>,
) -> Result<ApplicantRow, DbError> {
    sqlx::query_as::<_, ApplicantRow>(&format!(
        "UPDATE applicants \
         SET report_raw_response = $2, \
             report_generated_at = $3, \
             report_generation_count = report_generation_count + 1, \
             status = CASE WHEN status = 'submitted' THEN 'reported' ELSE status END, \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {APPLICANT_COLUMNS}"
    ))
    .bind(id)
    .bind(raw_response)
    .bind(generated_at)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Prepends a PDF artifact to the applicant's `report_pdf_reports` history.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the applicant does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn prepend_pdf_artifact(
    pool: &PgPool,
    id: Uuid,
    artifact: &PdfArtifact,
) -> Result<ApplicantRow, DbError> {
    sqlx::query_as::<_, ApplicantRow>(&format!(
        "UPDATE applicants \
         SET report_pdf_reports = $2::jsonb || report_pdf_reports, \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {APPLICANT_COLUMNS}"
    ))
    .bind(id)
    .bind(Json(vec![artifact]))
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}
