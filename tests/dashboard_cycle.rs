//! end-to-end: scripted readings through the monitor, and the monitor
//! polling the real router over http.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use telemetry_dashboard::config::DashboardConfig;
use telemetry_dashboard::detect::Detector;
use telemetry_dashboard::domain::{Detection, Reading};
use telemetry_dashboard::error::{FetchError, StoreError};
use telemetry_dashboard::image::{DecodedImage, ImageLoader};
use telemetry_dashboard::monitor::{CycleOutcome, Monitor, MonitorSettings};
use telemetry_dashboard::notify::{LogNotifier, Notifier, Permission, WebhookNotifier};
use telemetry_dashboard::server::{self, AppState};
use telemetry_dashboard::source::{HttpReadingSource, ReadingSource};
use telemetry_dashboard::store::{TelemetryRow, TelemetryStore};

struct Scripted(Mutex<VecDeque<Result<Reading, FetchError>>>);

#[async_trait]
impl ReadingSource for Scripted {
    async fn fetch_latest(&self) -> Result<Reading, FetchError> {
        self.0
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Malformed("no more readings".into())))
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

#[async_trait]
impl Notifier for Recorder {
    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }
    async fn notify(&self, message: &str) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

struct OnePerson;

#[async_trait]
impl Detector for OnePerson {
    async fn detect(&self, image: &DecodedImage) -> anyhow::Result<Vec<Detection>> {
        assert_eq!(image.bytes, b"hello");
        Ok(serde_json::from_value(json!([
            { "bbox": [12, 40, 100, 80], "class": "person", "score": 0.914 },
            { "bbox": [0, 0, 0, 10], "class": "ghost", "score": 0.99 }
        ]))?)
    }
}

fn settings() -> MonitorSettings {
    let mut config = DashboardConfig::default();
    config.display.utc_offset_minutes = Some(0);
    config.logging.show_readings = false;
    MonitorSettings::from_config(&config)
}

fn reading(cycle: u32, temp: f64) -> Reading {
    Reading {
        id: Some(json!(cycle)),
        time: Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap() + ChronoDuration::seconds(cycle as i64 * 5),
        temp,
        humidity: 50.0,
        pressure: 1000.0,
        img: None,
    }
}

#[tokio::test]
async fn fifteen_cycles_keep_last_ten_and_alert_above_limit() {
    // 18.5, 19.0, ... 25.5: cycle 10 (23.0) is at the limit, cycle 11 (23.5) is the first above it
    let temps: Vec<f64> = (1..=15).map(|c| 18.0 + c as f64 * 0.5).collect();
    let script = temps
        .iter()
        .enumerate()
        .map(|(i, &t)| Ok(reading(i as u32 + 1, t)))
        .collect();
    let recorder = Arc::new(Recorder::default());
    let monitor = Monitor::new(
        settings(),
        Arc::new(Scripted(Mutex::new(script))),
        None,
        recorder.clone(),
        ImageLoader::new(Duration::from_secs(1)),
    );

    let mut first_alert = None;
    for cycle in 1..=15u64 {
        match monitor.run_cycle().await {
            CycleOutcome::Applied { seq, alerts } => {
                assert_eq!(seq, cycle);
                if alerts > 0 && first_alert.is_none() {
                    first_alert = Some(cycle);
                }
                if cycle >= 11 {
                    assert_eq!(alerts, 1, "cycle {}", cycle);
                }
            }
            other => panic!("cycle {} not applied: {:?}", cycle, other),
        }
    }

    let snapshot = monitor.snapshot().await;
    assert_eq!(snapshot.series.temperature.to_vec(), temps[5..].to_vec());
    assert_eq!(snapshot.display.temperature, 25.5);
    assert_eq!(snapshot.display.last_updated.as_deref(), Some("01:01:15 pm"));
    assert_eq!(first_alert, Some(11));
    assert_eq!(recorder.0.lock().unwrap().len(), 5);

    // the script is exhausted now: a failing cycle changes nothing
    assert_eq!(monitor.run_cycle().await, CycleOutcome::Failed { seq: 16 });
    let after = monitor.snapshot().await;
    assert_eq!(after.series, snapshot.series);
    assert_eq!(after.display, snapshot.display);
}

#[tokio::test]
async fn detection_overlay_is_drawn_for_the_latest_frame() {
    let mut s = settings();
    s.features.enable_detection = true;
    s.features.enable_alerts = false;

    let mut with_frame = reading(1, 20.0);
    with_frame.img = Some("aGVsbG8=".to_string());
    let mut broken_frame = reading(2, 20.0);
    broken_frame.img = Some("***".to_string());

    let monitor = Monitor::new(
        s,
        Arc::new(Scripted(Mutex::new(vec![Ok(with_frame), Ok(broken_frame)].into()))),
        Some(Arc::new(OnePerson) as Arc<dyn Detector>),
        Arc::new(LogNotifier),
        ImageLoader::new(Duration::from_secs(1)),
    );

    monitor.run_cycle().await;
    let snap = monitor.snapshot().await;
    assert_eq!(snap.overlay.seq, 1);
    assert_eq!(snap.overlay.detections.len(), 2);
    let svg = snap.overlay.svg.expect("overlay drawn");
    assert!(svg.contains(r#"href="data:image/jpeg;base64,aGVsbG8=""#));
    assert!(svg.contains("person (91%)"));
    assert!(!svg.contains("ghost"));

    monitor.run_cycle().await;
    let snap = monitor.snapshot().await;
    assert_eq!(snap.overlay.seq, 2);
    assert!(snap.overlay.image_failed);
    assert!(snap.overlay.svg.is_none());
    assert_eq!(snap.display.temperature, 20.0);
}

// ==============================================================================
// over http
// ==============================================================================

struct SwitchStore(Mutex<Option<TelemetryRow>>, Mutex<bool>);

#[async_trait]
impl TelemetryStore for SwitchStore {
    async fn newest_row(&self) -> Result<Option<TelemetryRow>, StoreError> {
        if *self.1.lock().unwrap() {
            return Err(StoreError::Connect("down".into()));
        }
        Ok(self.0.lock().unwrap().clone())
    }
}

#[tokio::test]
async fn monitor_polls_the_endpoint() {
    let store = Arc::new(SwitchStore(Mutex::new(None), Mutex::new(false)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let source = HttpReadingSource::new(format!("http://{}/api/get-newest-temp", addr), Duration::from_secs(2));
    let monitor = Monitor::new(
        settings(),
        Arc::new(source),
        None,
        Arc::new(LogNotifier),
        ImageLoader::new(Duration::from_secs(1)),
    );
    let app = server::router(AppState { store: store.clone(), monitor: monitor.clone() });
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // empty table answers `null`, which is not a reading
    assert_eq!(monitor.run_cycle().await, CycleOutcome::Failed { seq: 1 });

    let Value::Object(row) = json!({
        "id": 1,
        "time": "2024-05-01T13:00:00.000Z",
        "temp": 22.346,
        "humidity": 61.0,
        "pressure": 1011.25,
        "img": "https://cam.local/latest.jpg"
    }) else {
        unreachable!()
    };
    *store.0.lock().unwrap() = Some(row);
    assert_eq!(monitor.run_cycle().await, CycleOutcome::Applied { seq: 2, alerts: 0 });

    let snap = monitor.snapshot().await;
    assert_eq!(snap.display.temperature, 22.35);
    assert_eq!(snap.display.pressure, 1011.3);
    assert_eq!(snap.display.image.url(), Some("https://cam.local/latest.jpg"));

    // a 500 from the endpoint is a failed cycle, state stays put
    *store.1.lock().unwrap() = true;
    assert_eq!(monitor.run_cycle().await, CycleOutcome::Failed { seq: 3 });
    assert_eq!(monitor.snapshot().await.display, snap.display);
}

#[tokio::test]
async fn alerts_resume_once_the_webhook_comes_up() {
    use axum::{extract::State, routing::get, Json, Router};

    // reserve a port, then close it so the first probe is refused
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let script = (1..=6).map(|c| Ok(reading(c, 30.0))).collect();
    let monitor = Monitor::new(
        settings(),
        Arc::new(Scripted(Mutex::new(script))),
        None,
        Arc::new(WebhookNotifier::new(format!("http://{}/hook", addr), Duration::from_millis(500))),
        ImageLoader::new(Duration::from_secs(1)),
    );

    assert_eq!(monitor.run_cycle().await, CycleOutcome::Applied { seq: 1, alerts: 1 });
    assert_eq!(monitor.snapshot().await.notifications, Permission::Pending);

    let delivered: Arc<Mutex<Vec<Value>>> = Arc::default();
    let app = Router::new()
        .route(
            "/hook",
            get(|| async { "ok" }).post(|State(sink): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                sink.lock().unwrap().push(body);
            }),
        )
        .with_state(delivered.clone());
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    for seq in 2..=6 {
        assert_eq!(monitor.run_cycle().await, CycleOutcome::Applied { seq, alerts: 1 });
    }
    assert_eq!(monitor.snapshot().await.notifications, Permission::Granted);
    let delivered = delivered.lock().unwrap();
    assert_eq!(delivered.len(), 5);
    assert_eq!(delivered[0]["body"], "temperature dangerously high");
}
