//! Applicant records and the personality report embedded in them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Lifecycle of a questionnaire submission.
///
/// The report pipeline only ever moves an applicant from `Submitted` to
/// `Reported`. `Matched` is owned by the pairing workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicantStatus {
    Submitted,
    Reported,
    Matched,
}

impl ApplicantStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicantStatus::Submitted => "submitted",
            ApplicantStatus::Reported => "reported",
            ApplicantStatus::Matched => "matched",
        }
    }

    /// Status after a report has been written. Never downgrades `Matched`.
    #[must_use]
    pub fn after_report(self) -> Self {
        match self {
            ApplicantStatus::Submitted => ApplicantStatus::Reported,
            other => other,
        }
    }
}

impl std::str::FromStr for ApplicantStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(ApplicantStatus::Submitted),
            "reported" => Ok(ApplicantStatus::Reported),
            "matched" => Ok(ApplicantStatus::Matched),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    /// Human-readable label used in prompts and rendered reports.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl std::str::FromStr for Gender {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(CoreError::InvalidGender(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Straight,
    Gay,
    Bisexual,
}

impl Orientation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Straight => "straight",
            Orientation::Gay => "gay",
            Orientation::Bisexual => "bisexual",
        }
    }
}

impl std::str::FromStr for Orientation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "straight" => Ok(Orientation::Straight),
            "gay" => Ok(Orientation::Gay),
            "bisexual" => Ok(Orientation::Bisexual),
            other => Err(CoreError::InvalidOrientation(other.to_string())),
        }
    }
}

/// A stored PDF rendering of a personality report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfArtifact {
    pub url: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportContent {
    pub raw_response: String,
}

/// AI-generated analysis attached to an applicant.
///
/// `pdf_reports` is newest first and only ever grows. Regenerating the text
/// does not touch it, so older artifacts may describe a previous revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityReport {
    pub content: ReportContent,
    pub generated_at: DateTime<Utc>,
    pub generation_count: i32,
    #[serde(default)]
    pub pdf_reports: Vec<PdfArtifact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub phone: String,
    #[serde(skip_serializing)]
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
    pub status: ApplicantStatus,
    pub matched_with: Option<Uuid>,
    pub matched_at: Option<DateTime<Utc>>,
    pub personality_report: Option<PersonalityReport>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Applicant {
    /// The report text, if one has been generated and is non-blank.
    #[must_use]
    pub fn raw_report(&self) -> Option<&str> {
        self.personality_report
            .as_ref()
            .map(|r| r.content.raw_response.as_str())
            .filter(|text| !text.trim().is_empty())
    }

    #[must_use]
    pub fn generation_count(&self) -> i32 {
        self.personality_report
            .as_ref()
            .map_or(0, |r| r.generation_count)
    }

    #[must_use]
    pub fn pdf_reports(&self) -> &[PdfArtifact] {
        self.personality_report
            .as_ref()
            .map_or(&[], |r| r.pdf_reports.as_slice())
    }
}
