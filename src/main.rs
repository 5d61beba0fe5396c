//! ==============================================================================
//! main.rs - telemetry dashboard entry point
//! ==============================================================================
//!
//! purpose:
//!     serves the newest row of the telemetry table and a live dashboard
//!     built from polling it.
//!
//! responsibilities:
//!     - load configuration (config/dashboard.toml, DATABASE_URL)
//!     - open the postgres-backed store behind /api/get-newest-temp
//!     - wire the monitor to its collaborators (source, detector, notifier)
//!     - run the polling timer and the web server until ctrl-c
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                         this binary                          │
//!     │  ┌──────────────┐   http    ┌──────────────┐                 │
//!     │  │ monitor      │ ────────> │ web server   │ ──> postgres    │
//!     │  │ (poll timer) │           │ (port 3000)  │    (temp_data)  │
//!     │  └──────┬───────┘           └──────┬───────┘                 │
//!     │         │ rolling series,          │ GET /                   │
//!     │         │ display, overlay         │ reads the snapshot      │
//!     │         └──────── snapshot ────────┘                         │
//!     └──────────────────────────────────────────────────────────────┘
//!
//! ==============================================================================

use anyhow::Result;
use std::sync::Arc;
use telemetry_dashboard::config::{DashboardConfig, NotifierKind};
use telemetry_dashboard::detect::{Detector, HttpDetector};
use telemetry_dashboard::image::ImageLoader;
use telemetry_dashboard::logging;
use telemetry_dashboard::monitor::{Monitor, MonitorSettings};
use telemetry_dashboard::notify::{LogNotifier, Notifier, WebhookNotifier};
use telemetry_dashboard::server::{self, AppState};
use telemetry_dashboard::source::HttpReadingSource;
use telemetry_dashboard::store::PgStore;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration
    let (mut config, origin) = DashboardConfig::load_or_default();
    config.apply_env();

    logging::init(&config.logging.level);
    info!("Telemetry Dashboard v{}", env!("CARGO_PKG_VERSION"));
    info!("[CONFIG] {}", origin);

    if let Err(e) = config.validate() {
        error!("[CONFIG] invalid configuration: {:#}", e);
        return Err(e);
    }
    config.log_summary();

    // step 2: database-backed endpoint
    let store = Arc::new(PgStore::new(config.database.url.clone(), &config.database.table)?);

    // step 3: monitor and its collaborators
    let timeout = config.request_timeout();
    let notifier: Arc<dyn Notifier> = match (config.alerts.notifier, config.alerts.webhook_url.as_deref()) {
        (NotifierKind::Webhook, Some(url)) => Arc::new(WebhookNotifier::new(url, timeout)),
        _ => Arc::new(LogNotifier),
    };
    let detector: Option<Arc<dyn Detector>> = match config.detection.endpoint.as_deref() {
        Some(endpoint) if config.features.enable_detection => {
            Some(Arc::new(HttpDetector::new(endpoint, timeout)) as Arc<dyn Detector>)
        }
        _ => None,
    };
    let monitor = Monitor::new(
        MonitorSettings::from_config(&config),
        Arc::new(HttpReadingSource::new(config.polling.source_url.clone(), timeout)),
        detector,
        notifier,
        ImageLoader::new(timeout),
    );

    // step 4: web server and polling loop
    let state = AppState { store, monitor: monitor.clone() };
    let polling = monitor.start();

    tokio::select! {
        res = server::run_server(&config.server.bind, state) => {
            if let Err(e) = &res {
                error!("[ERROR] Web server error: {:#}", e);
            }
            polling.shutdown();
            res
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down gracefully");
            polling.shutdown();
            Ok(())
        }
    }
}
