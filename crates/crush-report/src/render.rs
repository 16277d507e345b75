//! HTML to PDF through a headless Chromium process.
//!
//! Each render gets its own temporary directory holding the HTML input and
//! the PDF output. The browser is killed if it outlives the render timeout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crush_core::AppConfig;

use crate::error::ReportError;

const STDERR_TAIL_CHARS: usize = 400;

/// Margins and footer for a rendered A4 report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfOptions {
    pub margin_mm: u32,
    /// Text shown in the footer next to the page counter.
    pub footer_brand: String,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            margin_mm: 15,
            footer_brand: "© Crush & Beyond".to_owned(),
        }
    }
}

impl PdfOptions {
    /// `@page` rules for A4, margins and a `brand · page / pages` footer.
    #[must_use]
    pub fn page_css(&self) -> String {
        let brand = self.footer_brand.replace('\\', "\\\\").replace('"', "\\\"");
        format!(
            "@page {{ size: A4; margin: {m}mm {m}mm {m}mm {m}mm; \
             @bottom-center {{ content: \"{brand}  ·  \" counter(page) \" / \" counter(pages); \
             font-size: 8pt; color: #8a6570; }} }}",
            m = self.margin_mm,
        )
    }
}

#[async_trait]
pub trait PdfRenderer: Send + Sync {
    /// Renders a complete HTML document to PDF bytes.
    async fn render(&self, html: &str, options: &PdfOptions) -> Result<Vec<u8>, ReportError>;
}

/// Spawns `chromium --headless --print-to-pdf` once per render.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    chrome_path: PathBuf,
    timeout: Duration,
}

impl ChromeRenderer {
    #[must_use]
    pub fn new(chrome_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            chrome_path: chrome_path.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(
            config.chrome_path.clone(),
            Duration::from_secs(config.render_timeout_secs),
        )
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.chrome_path);
        cmd.arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--no-first-run")
            .arg("--disable-extensions")
            .arg("--hide-scrollbars")
            .arg("--no-pdf-header-footer")
            .arg("--run-all-compositor-stages-before-draw")
            .arg("--virtual-time-budget=10000")
            .arg(format!("--print-to-pdf={}", output.display()))
            .arg(format!("file://{}", input.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Places the page rules right before `</head>`, or first if there is none.
fn inject_page_css(html: &str, options: &PdfOptions) -> String {
    let style = format!("<style>{}</style>\n", options.page_css());
    match html.find("</head>") {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + style.len());
            out.push_str(&html[..at]);
            out.push_str(&style);
            out.push_str(&html[at..]);
            out
        }
        None => format!("{style}{html}"),
    }
}

fn tail(text: &str) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= STDERR_TAIL_CHARS {
        return trimmed.to_owned();
    }
    trimmed.chars().skip(count - STDERR_TAIL_CHARS).collect()
}

#[async_trait]
impl PdfRenderer for ChromeRenderer {
    async fn render(&self, html: &str, options: &PdfOptions) -> Result<Vec<u8>, ReportError> {
        let workdir = tempfile::tempdir()
            .map_err(|e| ReportError::RenderFailed(format!("cannot create temp dir: {e}")))?;
        let input = workdir.path().join("report.html");
        let output = workdir.path().join("report.pdf");

        tokio::fs::write(&input, inject_page_css(html, options))
            .await
            .map_err(|e| ReportError::RenderFailed(format!("cannot write HTML input: {e}")))?;

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(self.timeout, self.command(&input, &output).output())
            .await
            .map_err(|_| ReportError::RenderTimeout {
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| {
                ReportError::RenderFailed(format!(
                    "cannot start {}: {e}",
                    self.chrome_path.display()
                ))
            })?;

        if !result.status.success() {
            return Err(ReportError::RenderFailed(format!(
                "browser exited with {}: {}",
                result.status,
                tail(&String::from_utf8_lossy(&result.stderr))
            )));
        }

        let bytes = tokio::fs::read(&output)
            .await
            .map_err(|e| ReportError::RenderFailed(format!("no PDF output produced: {e}")))?;
        if !bytes.starts_with(b"%PDF") {
            return Err(ReportError::RenderFailed(
                "browser output is not a PDF".to_owned(),
            ));
        }

        tracing::debug!(
            bytes = bytes.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "PDF rendered"
        );
        Ok(bytes)
    }
}
