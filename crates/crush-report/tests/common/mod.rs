//! In-memory collaborators shared by the pipeline integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::{ImageFormat, Rgb, RgbImage};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crush_ai::{AiCompleter, AiError, CompletionBackend, JobPoller, Prompt, Submission};
use crush_core::{
    Applicant, ApplicantStatus, Gender, NewProcessingRecord, Orientation, PdfArtifact,
    PersonalityReport, ProcessingRecord, ReportContent,
};
use crush_db::DbError;
use crush_report::{
    ApplicantStore, ArtifactStore, BatchOrchestrator, BrandingAssets, ImageNormalizer,
    PdfBuilder, PdfOptions, PdfRenderer, ProcessingRecordStore, ReportError, ReportGenerator,
};

pub const SECTIONS: &str = r#"Here you go:
[
  {"title": "1. Personality", "content": "Curious and **kind**."},
  {"title": "2. Relationships", "content": "Values honesty."}
]"#;

// ---------------------------------------------------------------------------
// Applicants
// ---------------------------------------------------------------------------

pub fn applicant(name: &str, images: Vec<String>) -> Applicant {
    Applicant {
        id: Uuid::new_v4(),
        name: name.to_owned(),
        phone: "13800000000".to_owned(),
        wechat: format!("{name}_wx"),
        gender: Gender::Female,
        orientation: Orientation::Straight,
        birth_date: "1995-06".to_owned(),
        zodiac: "Gemini".to_owned(),
        mbti: "ENFJ".to_owned(),
        location: "Chengdu".to_owned(),
        occupation: "Nurse".to_owned(),
        self_intro: "Loves hotpot and long walks.".to_owned(),
        images,
        status: ApplicantStatus::Submitted,
        matched_with: None,
        matched_at: None,
        personality_report: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn with_report(mut applicant: Applicant, raw: &str) -> Applicant {
    applicant.status = ApplicantStatus::Reported;
    applicant.personality_report = Some(PersonalityReport {
        content: ReportContent {
            raw_response: raw.to_owned(),
        },
        generated_at: Utc::now(),
        generation_count: 1,
        pdf_reports: vec![],
    });
    applicant
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    applicants: Mutex<HashMap<Uuid, Applicant>>,
    records: Mutex<Vec<ProcessingRecord>>,
    next_record_id: AtomicI64,
}

impl MemoryStore {
    pub fn insert(&self, applicant: Applicant) -> Uuid {
        let id = applicant.id;
        self.applicants.lock().unwrap().insert(id, applicant);
        id
    }

    pub fn get(&self, id: Uuid) -> Applicant {
        self.applicants.lock().unwrap()[&id].clone()
    }

    /// Records in the order they were appended.
    pub fn records(&self) -> Vec<ProcessingRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApplicantStore for MemoryStore {
    async fn get_applicant(&self, id: Uuid) -> Result<Option<Applicant>, DbError> {
        Ok(self.applicants.lock().unwrap().get(&id).cloned())
    }

    async fn record_report(
        &self,
        id: Uuid,
        raw_response: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<Applicant, DbError> {
        let mut applicants = self.applicants.lock().unwrap();
        let applicant = applicants.get_mut(&id).ok_or(DbError::NotFound)?;
        let (count, pdf_reports) = applicant
            .personality_report
            .take()
            .map_or((0, vec![]), |r| (r.generation_count, r.pdf_reports));
        applicant.personality_report = Some(PersonalityReport {
            content: ReportContent {
                raw_response: raw_response.to_owned(),
            },
            generated_at,
            generation_count: count + 1,
            pdf_reports,
        });
        applicant.status = applicant.status.after_report();
        applicant.updated_at = Utc::now();
        Ok(applicant.clone())
    }

    async fn prepend_pdf_artifact(
        &self,
        id: Uuid,
        artifact: &PdfArtifact,
    ) -> Result<Applicant, DbError> {
        let mut applicants = self.applicants.lock().unwrap();
        let applicant = applicants.get_mut(&id).ok_or(DbError::NotFound)?;
        let report = applicant.personality_report.get_or_insert_with(|| PersonalityReport {
            content: ReportContent {
                raw_response: String::new(),
            },
            generated_at: Utc::now(),
            generation_count: 0,
            pdf_reports: vec![],
        });
        report.pdf_reports.insert(0, artifact.clone());
        Ok(applicant.clone())
    }
}

#[async_trait]
impl ProcessingRecordStore for MemoryStore {
    async fn append(&self, record: &NewProcessingRecord) -> Result<i64, DbError> {
        let id = self.next_record_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.records.lock().unwrap().push(ProcessingRecord {
            id,
            run_id: record.run_id,
            applicant_id: record.applicant_id,
            name: record.name.clone(),
            success: record.success,
            error: record.error.clone(),
            status: record.status.clone(),
            report_generated: record.report_generated,
            pdf_generated: record.pdf_generated,
            pdf_url: record.pdf_url.clone(),
            timestamp: record.timestamp,
        });
        Ok(id)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ProcessingRecord>, DbError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .rev()
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// AI backend
// ---------------------------------------------------------------------------

/// Answers from a queue, then with the fallback. Records every prompt.
pub struct ScriptedAi {
    answers: Mutex<VecDeque<Result<String, AiError>>>,
    fallback: String,
    prompts: Mutex<Vec<Prompt>>,
    gate: Option<Arc<tokio::sync::Notify>>,
}

impl ScriptedAi {
    pub fn always(text: &str) -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
            fallback: text.to_owned(),
            prompts: Mutex::new(vec![]),
            gate: None,
        }
    }

    pub fn queued(answers: Vec<Result<String, AiError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            ..Self::always(SECTIONS)
        }
    }

    /// Every submit waits for one `notify_one` on the returned handle.
    pub fn gated() -> (Self, Arc<tokio::sync::Notify>) {
        let gate = Arc::new(tokio::sync::Notify::new());
        let ai = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::always(SECTIONS)
        };
        (ai, gate)
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedAi {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn submit(&self, prompt: &Prompt) -> Result<Submission, AiError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.prompts.lock().unwrap().push(prompt.clone());
        let next = self.answers.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
            .map(Submission::Completed)
    }
}

// ---------------------------------------------------------------------------
// Renderer and artifacts
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Ok,
    Timeout,
}

pub struct FakeRenderer {
    mode: Mutex<RenderMode>,
    calls: AtomicUsize,
    last_html: Mutex<Option<String>>,
}

impl FakeRenderer {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            calls: AtomicUsize::new(0),
            last_html: Mutex::new(None),
        }
    }

    pub fn set_mode(&self, mode: RenderMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_html(&self) -> Option<String> {
        self.last_html.lock().unwrap().clone()
    }
}

#[async_trait]
impl PdfRenderer for FakeRenderer {
    async fn render(&self, html: &str, _options: &PdfOptions) -> Result<Vec<u8>, ReportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_html.lock().unwrap() = Some(html.to_owned());
        let mode = *self.mode.lock().unwrap();
        match mode {
            RenderMode::Ok => Ok(b"%PDF-1.7 fake".to_vec()),
            RenderMode::Timeout => Err(ReportError::RenderTimeout { secs: 60 }),
        }
    }
}

#[derive(Default)]
pub struct MemoryArtifacts {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryArtifacts {
    pub fn count(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifacts {
    async fn write(&self, bytes: &[u8], suggested_name: &str) -> Result<String, ReportError> {
        let mut files = self.files.lock().unwrap();
        let name = format!("{}_{}.pdf", files.len() + 1, suggested_name);
        files.push((name.clone(), bytes.to_vec()));
        Ok(format!("http://test.local/reports/{name}"))
    }

    async fn discard(&self, url: &str) -> Result<(), ReportError> {
        let mut files = self.files.lock().unwrap();
        let before = files.len();
        files.retain(|(name, _)| !url.ends_with(&format!("/{name}")));
        if files.len() == before {
            return Err(ReportError::StorageWriteFailed(format!("unknown artifact {url}")));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Image server
// ---------------------------------------------------------------------------

pub fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(120, 80, Rgb([240, 180, 200]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Serves `/ok.png`, `/missing.png` (404) and `/page.html` (not an image).
pub async fn image_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(png_bytes()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html></html>"),
        )
        .mount(&server)
        .await;
    server
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub ai: Arc<ScriptedAi>,
    pub renderer: Arc<FakeRenderer>,
    pub artifacts: Arc<MemoryArtifacts>,
    pub generator: Arc<ReportGenerator>,
    pub pdf: Arc<PdfBuilder>,
    pub orchestrator: BatchOrchestrator,
}

impl Harness {
    pub fn new(ai: ScriptedAi) -> Self {
        Self::with_renderer(ai, FakeRenderer::new(RenderMode::Ok))
    }

    pub fn with_renderer(ai: ScriptedAi, renderer: FakeRenderer) -> Self {
        let store = Arc::new(MemoryStore::default());
        let ai = Arc::new(ai);
        let renderer = Arc::new(renderer);
        let artifacts = Arc::new(MemoryArtifacts::default());

        let backend: Arc<dyn CompletionBackend> = ai.clone();
        let completer = AiCompleter::new(backend, JobPoller::new(Duration::from_millis(1), 1))
            .with_retries(0, 0);
        let normalizer = ImageNormalizer::new(5, 64, 80).unwrap();

        let generator = Arc::new(ReportGenerator::new(store.clone(), normalizer, completer));
        let pdf = Arc::new(PdfBuilder::new(
            store.clone(),
            renderer.clone(),
            artifacts.clone(),
            BrandingAssets::default(),
        ));
        let orchestrator =
            BatchOrchestrator::new(store.clone(), store.clone(), generator.clone(), pdf.clone());

        Self {
            store,
            ai,
            renderer,
            artifacts,
            generator,
            pdf,
            orchestrator,
        }
    }
}

/// Polls `cond` every few milliseconds for up to five seconds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
