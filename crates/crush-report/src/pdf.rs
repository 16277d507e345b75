//! PDF artifact building: sections, HTML, render, store, history.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crush_core::{Applicant, PdfArtifact};
use crush_db::DbError;

use crate::artifacts::ArtifactStore;
use crate::error::ReportError;
use crate::render::{PdfOptions, PdfRenderer};
use crate::sections::parse_sections;
use crate::store::ApplicantStore;
use crate::template::{render_html, BrandingAssets, ReportView};

#[derive(Debug, Clone)]
pub struct PdfOutcome {
    pub applicant: Applicant,
    pub artifact_url: String,
}

pub struct PdfBuilder {
    store: Arc<dyn ApplicantStore>,
    renderer: Arc<dyn PdfRenderer>,
    artifacts: Arc<dyn ArtifactStore>,
    assets: BrandingAssets,
    options: PdfOptions,
}

impl PdfBuilder {
    #[must_use]
    pub fn new(
        store: Arc<dyn ApplicantStore>,
        renderer: Arc<dyn PdfRenderer>,
        artifacts: Arc<dyn ArtifactStore>,
        assets: BrandingAssets,
    ) -> Self {
        Self {
            store,
            renderer,
            artifacts,
            assets,
            options: PdfOptions::default(),
        }
    }

    /// Loads the applicant and builds a PDF from its current report.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::NotFound`] if the applicant does not exist, and
    /// otherwise the errors of [`PdfBuilder::build_for`].
    pub async fn build(&self, id: Uuid) -> Result<PdfOutcome, ReportError> {
        let applicant = self
            .store
            .get_applicant(id)
            .await?
            .ok_or(ReportError::NotFound(id))?;
        self.build_for(&applicant).await
    }

    /// Builds, stores and records a PDF for `applicant`'s current report.
    ///
    /// The PDF history is only written after the file is stored, so any
    /// failure leaves it untouched. A stored file whose history write fails
    /// is discarded again.
    ///
    /// # Errors
    ///
    /// - [`ReportError::NoReport`] if no report text exists.
    /// - [`ReportError::MalformedReportJson`] if the text has no section array.
    /// - [`ReportError::RenderTimeout`] / [`ReportError::RenderFailed`] from
    ///   the renderer.
    /// - [`ReportError::StorageWriteFailed`] from the artifact store.
    pub async fn build_for(&self, applicant: &Applicant) -> Result<PdfOutcome, ReportError> {
        let raw = applicant.raw_report().ok_or(ReportError::NoReport)?;
        let sections = parse_sections(raw)?;

        let generated_at = Utc::now();
        let html = render_html(
            &ReportView {
                applicant,
                generated_at,
                sections: &sections,
            },
            &self.assets,
        );

        let bytes = self.renderer.render(&html, &self.options).await?;
        let url = self.artifacts.write(&bytes, &applicant.name).await?;

        let artifact = PdfArtifact {
            url: url.clone(),
            generated_at,
        };
        let updated = match self.store.prepend_pdf_artifact(applicant.id, &artifact).await {
            Ok(updated) => updated,
            Err(e) => {
                if let Err(discard) = self.artifacts.discard(&url).await {
                    tracing::warn!(
                        applicant_id = %applicant.id,
                        url = %url,
                        error = %discard,
                        "orphaned PDF artifact could not be removed"
                    );
                }
                return Err(match e {
                    DbError::NotFound => ReportError::NotFound(applicant.id),
                    other => ReportError::Store(other),
                });
            }
        };

        tracing::info!(
            applicant_id = %applicant.id,
            sections = sections.len(),
            pdf_count = updated.pdf_reports().len(),
            url = %url,
            "PDF report built"
        );
        Ok(PdfOutcome {
            applicant: updated,
            artifact_url: url,
        })
    }
}
