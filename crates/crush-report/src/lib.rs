//! Personality report pipeline.
//!
//! For one applicant: fetch and normalize photos ([`normalizer`]), prompt the AI
//! backend and store the answer ([`generator`]), then turn the stored answer
//! into a branded PDF ([`pdf`]). [`batch`] runs both stages over a list of
//! applicants in the background while exposing live progress.

pub mod artifacts;
pub mod batch;
pub mod error;
pub mod generator;
pub mod normalizer;
pub mod pdf;
pub mod prompt;
pub mod render;
pub mod sections;
pub mod store;
pub mod template;

pub use artifacts::{ArtifactStore, FsArtifactStore};
pub use batch::{BatchError, BatchOrchestrator, BatchStarted};
pub use error::ReportError;
pub use generator::ReportGenerator;
pub use normalizer::{ImageNormalizer, ImageProcessingFailed, NormalizedImage};
pub use pdf::{PdfBuilder, PdfOutcome};
pub use render::{ChromeRenderer, PdfOptions, PdfRenderer};
pub use sections::{parse_sections, ReportSection};
pub use store::{ApplicantStore, PgStore, ProcessingRecordStore};
pub use template::BrandingAssets;
