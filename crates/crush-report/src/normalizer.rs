//! Fetches applicant photos and re-encodes them into bounded JPEG data URIs
//! that can be embedded in an AI prompt.

use std::io::Cursor;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use thiserror::Error;

use crush_core::AppConfig;

const LOG_URL_CHARS: usize = 80;

/// Upper bound on a fetched image body, checked before and while buffering.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Any failure to turn one image URL into a data URI.
#[derive(Debug, Error)]
#[error("failed to process image {}: {reason}", truncate_for_log(.url))]
pub struct ImageProcessingFailed {
    pub url: String,
    pub reason: String,
}

impl ImageProcessingFailed {
    fn new(url: &str, reason: impl Into<String>) -> Self {
        Self {
            url: url.to_owned(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    /// `data:image/jpeg;base64,...`
    pub data_uri: String,
    /// Size of the JPEG bytes before base64 encoding.
    pub encoded_size: usize,
    pub width: u32,
    pub height: u32,
}

pub struct ImageNormalizer {
    client: Client,
    max_dimension: u32,
    jpeg_quality: u8,
    max_bytes: usize,
}

impl ImageNormalizer {
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        max_dimension: u32,
        jpeg_quality: u8,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("crush-report/0.1")
            .build()?;

        Ok(Self {
            client,
            max_dimension: max_dimension.max(1),
            jpeg_quality: jpeg_quality.clamp(1, 100),
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        })
    }

    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes.max(1);
        self
    }

    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be constructed.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            config.image_fetch_timeout_secs,
            config.image_max_dimension,
            config.image_jpeg_quality,
        )
    }

    /// Fetches `url` and returns it as a downscaled JPEG data URI.
    ///
    /// # Errors
    ///
    /// Returns [`ImageProcessingFailed`] on network failure or timeout, a
    /// non-2xx status, a non-image `Content-Type`, a body larger than the
    /// byte cap, or undecodable bytes.
    pub async fn normalize(&self, url: &str) -> Result<NormalizedImage, ImageProcessingFailed> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ImageProcessingFailed::new(url, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageProcessingFailed::new(url, format!("HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !content_type.starts_with("image/") {
            return Err(ImageProcessingFailed::new(
                url,
                format!("content-type '{content_type}' is not an image"),
            ));
        }

        let bytes = self.read_capped(url, response).await?;

        let max_dimension = self.max_dimension;
        let quality = self.jpeg_quality;
        let (jpeg, width, height) =
            tokio::task::spawn_blocking(move || transcode(&bytes, max_dimension, quality))
                .await
                .map_err(|e| ImageProcessingFailed::new(url, format!("transcode task failed: {e}")))?
                .map_err(|reason| ImageProcessingFailed::new(url, reason))?;

        tracing::debug!(
            url = %truncate_for_log(url),
            width,
            height,
            bytes = jpeg.len(),
            "image normalized"
        );

        Ok(NormalizedImage {
            data_uri: format!("data:image/jpeg;base64,{}", BASE64.encode(&jpeg)),
            encoded_size: jpeg.len(),
            width,
            height,
        })
    }
}

impl ImageNormalizer {
    /// Buffers the body, refusing anything over `max_bytes` whether or not
    /// the server declared a `Content-Length`.
    async fn read_capped(
        &self,
        url: &str,
        mut response: reqwest::Response,
    ) -> Result<Vec<u8>, ImageProcessingFailed> {
        let too_large = || {
            ImageProcessingFailed::new(url, format!("body exceeds {} bytes", self.max_bytes))
        };

        let declared = response
            .content_length()
            .and_then(|len| usize::try_from(len).ok());
        if declared.is_some_and(|len| len > self.max_bytes) {
            return Err(too_large());
        }

        let mut body = Vec::with_capacity(declared.unwrap_or(0));
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ImageProcessingFailed::new(url, format!("reading body failed: {e}")))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

/// Decodes any supported format, shrinks it to fit `max_dimension` on both
/// sides (never enlarges), and encodes it as JPEG.
///
/// # Errors
///
/// Returns a description of the decode or encode failure.
pub fn transcode(
    bytes: &[u8],
    max_dimension: u32,
    quality: u8,
) -> Result<(Vec<u8>, u32, u32), String> {
    let decoded = image::load_from_memory(bytes).map_err(|e| format!("decode failed: {e}"))?;

    let (width, height) = decoded.dimensions();
    let resized = if width > max_dimension || height > max_dimension {
        decoded.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    } else {
        decoded
    };

    let rgb = resized.to_rgb8();
    let (out_width, out_height) = rgb.dimensions();
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .map_err(|e| format!("JPEG encode failed: {e}"))?;

    Ok((out.into_inner(), out_width, out_height))
}

/// Shortens a URL for log lines; signed upload URLs can be very long.
#[must_use]
pub fn truncate_for_log(url: &str) -> String {
    if url.chars().count() <= LOG_URL_CHARS {
        return url.to_owned();
    }
    let head: String = url.chars().take(LOG_URL_CHARS - 3).collect();
    format!("{head}...")
}
