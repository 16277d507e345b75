//! Report generation for one applicant: photos, prompt, AI call, store.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crush_ai::AiCompleter;
use crush_core::Applicant;
use crush_db::DbError;

use crate::error::ReportError;
use crate::normalizer::{truncate_for_log, ImageNormalizer, NormalizedImage};
use crate::prompt::build_prompt;
use crate::store::ApplicantStore;

pub struct ReportGenerator {
    store: Arc<dyn ApplicantStore>,
    images: ImageNormalizer,
    ai: AiCompleter,
}

impl ReportGenerator {
    #[must_use]
    pub fn new(store: Arc<dyn ApplicantStore>, images: ImageNormalizer, ai: AiCompleter) -> Self {
        Self { store, images, ai }
    }

    /// Loads the applicant and generates a new report revision.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::NotFound`] if the applicant does not exist, and
    /// otherwise the errors of [`ReportGenerator::generate_for`].
    pub async fn generate(&self, id: Uuid) -> Result<Applicant, ReportError> {
        let applicant = self
            .store
            .get_applicant(id)
            .await?
            .ok_or(ReportError::NotFound(id))?;
        self.generate_for(&applicant).await
    }

    /// Generates a report for an already loaded applicant and returns the
    /// updated record.
    ///
    /// Nothing is written unless the AI call produced text.
    ///
    /// # Errors
    ///
    /// - [`ReportError::NoUsableImages`] if the applicant has photos and none
    ///   of them could be processed.
    /// - [`ReportError::ExternalServiceFailed`] / [`ReportError::Timeout`]
    ///   from the AI backend.
    /// - [`ReportError::NotFound`] if the applicant vanished before the write.
    pub async fn generate_for(&self, applicant: &Applicant) -> Result<Applicant, ReportError> {
        let images = self.normalize_images(applicant).await?;
        let prompt = build_prompt(applicant, &images);

        tracing::info!(
            applicant_id = %applicant.id,
            images = images.len(),
            backend = self.ai.backend_name(),
            "requesting personality report"
        );
        let text = self.ai.complete(&prompt).await?;

        let updated = self
            .store
            .record_report(applicant.id, &text, Utc::now())
            .await
            .map_err(|e| match e {
                DbError::NotFound => ReportError::NotFound(applicant.id),
                other => ReportError::Store(other),
            })?;

        tracing::info!(
            applicant_id = %applicant.id,
            generation_count = updated.generation_count(),
            chars = text.chars().count(),
            "personality report stored"
        );
        Ok(updated)
    }

    /// Normalizes every photo in order, skipping the ones that fail.
    async fn normalize_images(
        &self,
        applicant: &Applicant,
    ) -> Result<Vec<NormalizedImage>, ReportError> {
        let mut normalized = Vec::with_capacity(applicant.images.len());
        for url in &applicant.images {
            match self.images.normalize(url).await {
                Ok(image) => normalized.push(image),
                Err(e) => tracing::warn!(
                    applicant_id = %applicant.id,
                    url = %truncate_for_log(url),
                    error = %e.reason,
                    "skipping unusable image"
                ),
            }
        }

        if !applicant.images.is_empty() && normalized.is_empty() {
            return Err(ReportError::NoUsableImages {
                attempted: applicant.images.len(),
            });
        }
        Ok(normalized)
    }
}
