//! ==============================================================================
//! monitor.rs - the dashboard's fetch cycle
//! ==============================================================================
//!
//! purpose:
//!     on every tick, fetch the newest reading and fold it into the rolling
//!     series and display state. then raise alerts and redraw the overlay.
//!
//! cycle:
//!
//! ```text
//!     tick ──> fetch ──x── failed: log, state untouched
//!                │
//!                ├──── older than last applied: discard
//!                │
//!                ▼
//!          build new series + display, swap under the lock
//!                │
//!                ├──> alerts   (features.enable_alerts)
//!                └──> overlay  (features.enable_detection)
//! ```
//!
//! ordering:
//!     every cycle takes a sequence number before it fetches. a response is
//!     applied only if its number is above the last applied one, so a slow
//!     response can never overwrite a newer one. with `single-flight` a tick
//!     is skipped instead while a cycle is running.
//!
//! relationships:
//!     - used by: main.rs (start / shutdown), server.rs (snapshot)
//!     - collaborators: source.rs, detect.rs, notify.rs, image.rs
//!
//! ==============================================================================

use crate::alerts::{self, AlertRule};
use crate::config::{DashboardConfig, FeatureFlags, MetricPrecision, OverlapPolicy, SeriesConfig};
use crate::detect::{self, Detector};
use crate::display::{DisplayState, MetricSeries};
use crate::domain::Reading;
use crate::image::{ImageLoader, ImageSource};
use crate::notify::{Notifier, Permission};
use crate::overlay::{self, AreaPolicy, OverlayFrame, SvgCanvas};
use crate::source::ReadingSource;
use chrono::FixedOffset;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// everything the monitor needs to know from the config
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub overlap: OverlapPolicy,
    pub series: SeriesConfig,
    pub precision: MetricPrecision,
    pub features: FeatureFlags,
    pub rules: Vec<AlertRule>,
    pub area_policy: AreaPolicy,
    pub canvas_size: (u32, u32),
    pub utc_offset: FixedOffset,
    pub show_readings: bool,
}

impl MonitorSettings {
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            overlap: config.polling.overlap,
            series: config.series.clone(),
            precision: config.precision.clone(),
            features: config.features.clone(),
            rules: config.alerts.rules.clone(),
            area_policy: AreaPolicy {
                min_area: config.detection.min_area,
                max_area: config.detection.max_area,
            },
            canvas_size: (config.detection.canvas_width, config.detection.canvas_height),
            utc_offset: config.utc_offset(),
            show_readings: config.logging.show_readings,
        }
    }
}

/// what the web server shows
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub series: MetricSeries,
    pub display: DisplayState,
    pub overlay: OverlayFrame,
    pub notifications: Permission,
    /// sequence number of the reading behind `display`, 0 before the first
    pub last_applied_seq: u64,
}

impl DashboardSnapshot {
    fn initial(settings: &MonitorSettings) -> Self {
        let series = MetricSeries::seeded(&settings.series);
        let display = DisplayState::initial(&series);
        Self {
            series,
            display,
            overlay: OverlayFrame::default(),
            notifications: Permission::Pending,
            last_applied_seq: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Applied { seq: u64, alerts: usize },
    /// fetch failed, nothing changed
    Failed { seq: u64 },
    /// a newer reading was applied first
    Stale { seq: u64 },
    /// the monitor was shut down while fetching
    Discarded { seq: u64 },
}

struct Inner {
    settings: MonitorSettings,
    source: Arc<dyn ReadingSource>,
    detector: Option<Arc<dyn Detector>>,
    notifier: Arc<dyn Notifier>,
    images: ImageLoader,
    state: RwLock<DashboardSnapshot>,
    /// last answer from the notifier; asked again while still pending
    permission: Mutex<Permission>,
    next_seq: AtomicU64,
    in_flight: AtomicBool,
    torn_down: AtomicBool,
}

/// clone-able handle to the shared monitor state
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

impl Monitor {
    pub fn new(
        settings: MonitorSettings,
        source: Arc<dyn ReadingSource>,
        detector: Option<Arc<dyn Detector>>,
        notifier: Arc<dyn Notifier>,
        images: ImageLoader,
    ) -> Self {
        let state = RwLock::new(DashboardSnapshot::initial(&settings));
        Self {
            inner: Arc::new(Inner {
                settings,
                source,
                detector,
                notifier,
                images,
                state,
                permission: Mutex::new(Permission::Pending),
                next_seq: AtomicU64::new(0),
                in_flight: AtomicBool::new(false),
                torn_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.inner.settings
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        self.inner.state.read().await.clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::SeqCst)
    }

    /// one fetch cycle
    pub async fn run_cycle(&self) -> CycleOutcome {
        let inner = &self.inner;
        let settings = &inner.settings;
        let seq = inner.next_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let reading = match inner.source.fetch_latest().await {
            Ok(reading) => reading,
            Err(e) => {
                warn!(seq, "[POLL] ⚠ fetch failed: {}", e);
                return CycleOutcome::Failed { seq };
            }
        };

        let image = {
            let mut state = inner.state.write().await;
            if self.is_torn_down() {
                debug!(seq, "[POLL] monitor shut down, dropping reading");
                return CycleOutcome::Discarded { seq };
            }
            if seq <= state.last_applied_seq {
                debug!(seq, applied = state.last_applied_seq, "[POLL] stale reading dropped");
                return CycleOutcome::Stale { seq };
            }

            let series = state.series.appended(&reading, &settings.precision);
            let display = DisplayState::derive(&series, &reading, &settings.utc_offset);
            let image = display.image.clone();
            state.series = series;
            state.display = display;
            state.last_applied_seq = seq;
            image
        };

        if settings.show_readings {
            info!(
                seq,
                time = %reading.time,
                "[POLL] Temp: {:.2}°C | Humidity: {:.2}% | Pressure: {:.1} hPa",
                reading.temp,
                reading.humidity,
                reading.pressure
            );
        }

        let alerts = if settings.features.enable_alerts {
            self.raise_alerts(&reading).await
        } else {
            0
        };

        if settings.features.enable_detection {
            self.redraw_overlay(seq, &image).await;
        }

        CycleOutcome::Applied { seq, alerts }
    }

    /// ask the notifier until it answers; granted and denied are kept for good
    pub async fn ensure_permission(&self) -> Permission {
        let mut cached = self.inner.permission.lock().await;
        if *cached != Permission::Pending {
            return *cached;
        }

        let permission = self.inner.notifier.request_permission().await;
        match permission {
            Permission::Denied => warn!("[ALERT] notification permission denied, alerts will only be logged"),
            Permission::Pending => debug!("[ALERT] notifier did not answer, asking again on the next alert"),
            Permission::Granted => {}
        }
        *cached = permission;
        self.inner.state.write().await.notifications = permission;
        permission
    }

    async fn raise_alerts(&self, reading: &Reading) -> usize {
        let alerts = alerts::evaluate(&self.inner.settings.rules, reading);
        if alerts.is_empty() {
            return 0;
        }

        let permission = self.ensure_permission().await;
        for alert in &alerts {
            let text = alert.notification_text();
            if permission != Permission::Granted {
                warn!(value = alert.value, "[ALERT] {} (not delivered)", text);
                continue;
            }
            if let Err(e) = self.inner.notifier.notify(text).await {
                warn!("[ALERT] ⚠ delivery failed for `{}`: {:#}", text, e);
            }
        }
        alerts.len()
    }

    async fn redraw_overlay(&self, seq: u64, image: &ImageSource) {
        let inner = &self.inner;
        let frame = match (inner.images.load(image).await, image.url()) {
            (Ok(Some(decoded)), Some(url)) => {
                let detections = detect::detect_or_empty(inner.detector.as_deref(), &decoded).await;
                let (w, h) = inner.settings.canvas_size;
                let mut canvas = SvgCanvas::new(w, h);
                let drawn = overlay::draw(&mut canvas, url, &detections, &inner.settings.area_policy);
                debug!(seq, found = detections.len(), drawn, "[DETECT] overlay redrawn");
                OverlayFrame { seq, detections, svg: Some(canvas.finish()), image_failed: false }
            }
            (Ok(_), _) => OverlayFrame { seq, ..OverlayFrame::default() },
            (Err(e), _) => {
                warn!(seq, "[DETECT] ⚠ camera frame unusable: {}", e);
                OverlayFrame { seq, image_failed: true, ..OverlayFrame::default() }
            }
        };

        let mut state = inner.state.write().await;
        if state.last_applied_seq == seq && !self.is_torn_down() {
            state.overlay = frame;
        }
    }

    /// spawn the polling timer; the first cycle runs immediately
    pub fn start(&self) -> MonitorHandle {
        let monitor = self.clone();
        let task = tokio::spawn(async move {
            let settings = &monitor.inner.settings;
            info!(
                "[RUNTIME] Starting telemetry polling ({}ms interval, {:?})",
                settings.interval.as_millis(),
                settings.overlap
            );

            if settings.features.enable_alerts {
                let m = monitor.clone();
                tokio::spawn(async move {
                    m.ensure_permission().await;
                });
            }

            let mut ticker = tokio::time::interval(settings.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if monitor.is_torn_down() {
                    break;
                }
                monitor.spawn_cycle();
            }
        });

        MonitorHandle { monitor: self.clone(), task }
    }

    fn spawn_cycle(&self) {
        let m = self.clone();
        match self.inner.settings.overlap {
            OverlapPolicy::LatestWins => {
                tokio::spawn(async move {
                    m.run_cycle().await;
                });
            }
            OverlapPolicy::SingleFlight => {
                if self.inner.in_flight.swap(true, Ordering::SeqCst) {
                    debug!("[POLL] previous fetch still running, tick skipped");
                    return;
                }
                tokio::spawn(async move {
                    m.run_cycle().await;
                    m.inner.in_flight.store(false, Ordering::SeqCst);
                });
            }
        }
    }
}

/// owns the timer task; dropping it stops polling
pub struct MonitorHandle {
    monitor: Monitor,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// stop the timer; fetches already in flight finish and are discarded
    pub fn shutdown(&self) {
        if !self.monitor.inner.torn_down.swap(true, Ordering::SeqCst) {
            info!("[RUNTIME] Polling stopped");
        }
        self.task.abort();
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
