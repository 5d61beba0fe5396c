//! ==============================================================================
//! image.rs - camera frame resolution and loading
//! ==============================================================================
//!
//! purpose:
//!     turns the `img` column of a reading into something the dashboard can
//!     show, and into bytes the detector can look at.
//!
//! resolution rule:
//!     - no payload            -> placeholder ("Loading...")
//!     - "data:..." / "http…"  -> already a url, used as-is
//!     - anything else         -> raw base64 jpeg, wrapped in a data url
//!
//! loading never panics: a payload that fails to decode is reported as an
//! ImageError and the caller treats it as "no image".
//!
//! ==============================================================================

use crate::error::ImageError;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use std::time::Duration;

const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// where the dashboard gets its camera image from
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "src", rename_all = "lowercase")]
pub enum ImageSource {
    Placeholder,
    Url(String),
}

impl ImageSource {
    pub fn url(&self) -> Option<&str> {
        match self {
            ImageSource::Placeholder => None,
            ImageSource::Url(url) => Some(url),
        }
    }
}

/// resolve a reading's image payload into a displayable source
pub fn resolve(payload: Option<&str>) -> ImageSource {
    match payload {
        None => ImageSource::Placeholder,
        Some(p) if p.trim().is_empty() => ImageSource::Placeholder,
        Some(p) if p.starts_with("data:") || p.starts_with("http") => ImageSource::Url(p.to_string()),
        Some(p) => ImageSource::Url(format!("{}{}", JPEG_DATA_URL_PREFIX, p)),
    }
}

/// image bytes ready for the detector
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// decode a `data:<media>;base64,<payload>` url
pub fn decode_data_url(url: &str) -> Result<DecodedImage, ImageError> {
    let rest = url.strip_prefix("data:").ok_or(ImageError::NotDataUrl)?;
    let (meta, payload) = rest.split_once(',').ok_or(ImageError::NotDataUrl)?;
    let media_type = meta.strip_suffix(";base64").ok_or(ImageError::NotDataUrl)?;

    // frames stored by some cameras are line-wrapped
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact)?;
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }

    Ok(DecodedImage {
        media_type: if media_type.is_empty() { "image/jpeg".to_string() } else { media_type.to_string() },
        bytes,
    })
}

/// loads resolved image sources, downloading remote ones
#[derive(Clone)]
pub struct ImageLoader {
    client: reqwest::Client,
}

impl ImageLoader {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// `Ok(None)` for the placeholder, bytes otherwise
    pub async fn load(&self, source: &ImageSource) -> Result<Option<DecodedImage>, ImageError> {
        let url = match source {
            ImageSource::Placeholder => return Ok(None),
            ImageSource::Url(url) => url,
        };

        if url.starts_with("data:") {
            return decode_data_url(url).map(Some);
        }

        let response = self.client.get(url).send().await?.error_for_status()?;
        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        Ok(Some(DecodedImage { media_type, bytes }))
    }
}
