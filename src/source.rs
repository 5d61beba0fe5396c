//! where the dashboard gets its readings from

use crate::domain::Reading;
use crate::error::FetchError;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// the newest reading, or why there is none this cycle
    async fn fetch_latest(&self) -> Result<Reading, FetchError>;
}

/// polls the telemetry endpoint over http
pub struct HttpReadingSource {
    client: reqwest::Client,
    url: String,
}

impl HttpReadingSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl ReadingSource for HttpReadingSource {
    async fn fetch_latest(&self) -> Result<Reading, FetchError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        // read the body first so a bad payload is reported as malformed,
        // not as a transport error
        let body = response.bytes().await?;
        serde_json::from_slice::<Reading>(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        let source = HttpReadingSource::new("http://127.0.0.1:9/api/get-newest-temp", Duration::from_millis(500));
        assert!(matches!(source.fetch_latest().await, Err(FetchError::Network(_))));
    }
}
