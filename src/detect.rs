//! object detection collaborator
//!
//! the detector is handed to the monitor at construction. when none is
//! configured the overlay simply has nothing to draw.

use crate::domain::Detection;
use crate::image::DecodedImage;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, image: &DecodedImage) -> anyhow::Result<Vec<Detection>>;
}

/// detection service reached over http
///
/// the image bytes are POSTed with their media type; the service answers
/// with `[{"bbox": [x, y, w, h], "class": "...", "score": 0.0..1.0}, ...]`.
pub struct HttpDetector {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDetector {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client, endpoint: endpoint.into() }
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(&self, image: &DecodedImage) -> anyhow::Result<Vec<Detection>> {
        let detections = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, image.media_type.as_str())
            .body(image.bytes.clone())
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Detection>>()
            .await?;
        Ok(detections)
    }
}

/// run the detector if there is one; failures count as "nothing found"
pub async fn detect_or_empty(detector: Option<&dyn Detector>, image: &DecodedImage) -> Vec<Detection> {
    let Some(detector) = detector else {
        return Vec::new();
    };
    match detector.detect(image).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!("[DETECT] detection failed: {:#}", e);
            Vec::new()
        }
    }
}
