//! ==============================================================================
//! notify.rs - user-facing alert delivery
//! ==============================================================================
//!
//! purpose:
//!     the monitor raises alerts; a Notifier puts them in front of a person.
//!
//! contract:
//!     - request_permission() is called before the first notify(), and again
//!       on later alerts for as long as it answers Pending
//!     - a denied permission is not an error: the monitor keeps polling and
//!       shows a banner on the dashboard instead
//!
//! implementations:
//!     - LogNotifier: writes alerts to the log, always granted
//!     - WebhookNotifier: POSTs a small json document to a url
//!
//! ==============================================================================

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// not asked yet, or the notifier could not be reached
    Pending,
    Granted,
    Denied,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn request_permission(&self) -> Permission;
    async fn notify(&self, message: &str) -> anyhow::Result<()>;
}

/// alerts go to the log at warn level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn notify(&self, message: &str) -> anyhow::Result<()> {
        tracing::warn!("[ALERT] {}", message);
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    title: &'a str,
    body: &'a str,
}

/// posts `{"title": ..., "body": ...}` to a webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    /// probes the webhook; 401/403 is a denial, an unreachable hook stays pending
    async fn request_permission(&self) -> Permission {
        match self.client.get(&self.url).send().await {
            Ok(res) if matches!(res.status().as_u16(), 401 | 403) => Permission::Denied,
            Ok(_) => Permission::Granted,
            Err(e) => {
                tracing::debug!("[NOTIFY] webhook probe failed: {}", e);
                Permission::Pending
            }
        }
    }

    async fn notify(&self, message: &str) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(&WebhookPayload { title: "Telemetry alert", body: message })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
