//! Storage for rendered PDF files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crush_core::AppConfig;

use crate::error::ReportError;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores `bytes` under a unique name derived from `suggested_name` and
    /// returns its public URL.
    async fn write(&self, bytes: &[u8], suggested_name: &str) -> Result<String, ReportError>;

    /// Removes an artifact previously returned by [`ArtifactStore::write`].
    async fn discard(&self, url: &str) -> Result<(), ReportError>;
}

/// Writes PDFs into a directory served at `{public_base_url}/reports/`.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
    public_base_url: String,
}

impl FsArtifactStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_owned(),
        }
    }

    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(config.reports_dir.clone(), &config.public_base_url)
    }

    /// Maps a URL from [`ArtifactStore::write`] back to its file.
    fn path_for(&self, url: &str) -> Option<PathBuf> {
        let file_name = url.strip_prefix(&format!("{}/reports/", self.public_base_url))?;
        let is_plain = Path::new(file_name).file_name() == Some(std::ffi::OsStr::new(file_name));
        is_plain.then(|| self.dir.join(file_name))
    }
}

/// `{stem}_{timestamp}_{random}.pdf`, where `stem` keeps only ASCII
/// alphanumerics, `-` and `_` so the name is URL-safe as is.
#[must_use]
pub fn unique_file_name(suggested_name: &str) -> String {
    let mut stem: String = suggested_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    stem = stem.trim_matches('_').to_owned();
    if stem.chars().all(|c| c == '_') {
        stem = "report".to_owned();
    }
    stem.truncate(48);

    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{stem}_{}_{}.pdf",
        Utc::now().format("%Y%m%d%H%M%S"),
        &suffix[..8]
    )
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn write(&self, bytes: &[u8], suggested_name: &str) -> Result<String, ReportError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            ReportError::StorageWriteFailed(format!("cannot create {}: {e}", self.dir.display()))
        })?;

        let file_name = unique_file_name(suggested_name);
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            ReportError::StorageWriteFailed(format!("cannot write {}: {e}", path.display()))
        })?;

        tracing::info!(path = %path.display(), bytes = bytes.len(), "PDF artifact stored");
        Ok(format!("{}/reports/{file_name}", self.public_base_url))
    }

    async fn discard(&self, url: &str) -> Result<(), ReportError> {
        let path = self.path_for(url).ok_or_else(|| {
            ReportError::StorageWriteFailed(format!("{url} is not an artifact of this store"))
        })?;
        tokio::fs::remove_file(&path).await.map_err(|e| {
            ReportError::StorageWriteFailed(format!("cannot remove {}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), "PDF artifact discarded");
        Ok(())
    }
}
