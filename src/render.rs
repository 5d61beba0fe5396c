//! ==============================================================================
//! render.rs - server-side dashboard page
//! ==============================================================================
//!
//! purpose:
//!     turns a DashboardSnapshot into one self-contained html page:
//!     header with "last updated", camera panel, one card per metric with
//!     its readout and (when charts are on) a sparkline of the rolling series.
//!
//! the page re-requests itself at the polling interval, so it stays as fresh
//! as the monitor behind it.
//!
//! ==============================================================================

use crate::config::FeatureFlags;
use crate::domain::Metric;
use crate::monitor::DashboardSnapshot;
use crate::notify::Permission;
use std::fmt::Write;
use std::time::Duration;

const SPARK_WIDTH: f64 = 200.0;
const SPARK_HEIGHT: f64 = 60.0;

/// escape html special characters to prevent xss
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// svg polyline of `values`, oldest on the left
pub fn sparkline(values: &[f64]) -> String {
    let mut svg = format!(
        r#"<svg class="spark" viewBox="0 0 {w} {h}" width="{w}" height="{h}" preserveAspectRatio="none">"#,
        w = SPARK_WIDTH,
        h = SPARK_HEIGHT
    );
    if !values.is_empty() {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = if max > min { max - min } else { 1.0 };
        let step = if values.len() > 1 { SPARK_WIDTH / (values.len() - 1) as f64 } else { 0.0 };

        let points: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let x = i as f64 * step;
                // flat series sit in the middle
                let y = if max > min { SPARK_HEIGHT - (v - min) / span * SPARK_HEIGHT } else { SPARK_HEIGHT / 2.0 };
                format!("{:.1},{:.1}", x, y)
            })
            .collect();
        let _ = write!(
            svg,
            r##"<polyline fill="none" stroke="#4fd1c5" stroke-width="2" points="{}"/>"##,
            points.join(" ")
        );
    }
    svg.push_str("</svg>");
    svg
}

fn camera_panel(snapshot: &DashboardSnapshot, features: &FeatureFlags) -> String {
    const PLACEHOLDER: &str = r#"<div class="placeholder">Loading...</div>"#;

    if features.enable_detection && snapshot.overlay.seq == snapshot.last_applied_seq {
        if snapshot.overlay.image_failed {
            return PLACEHOLDER.to_string();
        }
        if let Some(svg) = &snapshot.overlay.svg {
            return svg.clone();
        }
    }

    match snapshot.display.image.url() {
        Some(src) => format!(r#"<img src="{}" alt="Camera feed">"#, html_escape(src)),
        None => PLACEHOLDER.to_string(),
    }
}

fn metric_card(snapshot: &DashboardSnapshot, metric: Metric, charts: bool) -> String {
    let mut card = format!(
        r#"<div class="card"><div class="label">{}</div><div class="value">{}{}</div>"#,
        metric.label(),
        snapshot.display.value(metric),
        metric.unit()
    );
    if charts {
        card.push_str(&sparkline(&snapshot.series.get(metric).to_vec()));
    }
    card.push_str("</div>");
    card
}

/// the whole dashboard page
pub fn dashboard_page(snapshot: &DashboardSnapshot, features: &FeatureFlags, refresh: Duration) -> String {
    let refresh_secs = refresh.as_secs().max(1);
    let last_updated = match &snapshot.display.last_updated {
        Some(t) => format!("Last updated: {}", html_escape(t)),
        None => "Loading...".to_string(),
    };
    let banner = if snapshot.notifications == Permission::Denied {
        r#"<div class="banner">Notifications are blocked - alerts are only logged.</div>"#
    } else {
        ""
    };
    let cards: String = Metric::ALL
        .iter()
        .map(|&m| metric_card(snapshot, m, features.enable_charts))
        .collect();

    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{refresh}">
<title>Dashboard</title>
<style>
body {{ margin: 0; font-family: system-ui; background: #111827; color: #fff; }}
header {{ display: flex; justify-content: space-between; align-items: center; padding: 1rem 1.5rem; background: #111827; }}
header .title {{ font-weight: bold; font-size: 1.125rem; }}
main {{ display: flex; }}
.camera {{ flex: 1; padding: 1.5rem; background: #1f2937; }}
.camera img, .camera svg.overlay, .placeholder {{ width: 100%; height: auto; aspect-ratio: 16 / 9; border-radius: 8px; background: #374151; object-fit: cover; }}
.placeholder {{ display: flex; align-items: center; justify-content: center; font-size: 1.5rem; font-weight: bold; }}
aside {{ width: 16rem; padding: 1.5rem; }}
.card {{ background: #1f2937; border-radius: 8px; padding: 1rem; margin-bottom: 1.5rem; }}
.card .label {{ font-size: 0.875rem; }}
.card .value {{ font-size: 1.875rem; font-weight: bold; }}
.spark {{ width: 100%; background: #374151; border-radius: 8px; }}
.banner {{ background: #7f1d1d; padding: 0.5rem 1.5rem; }}
</style>
</head>
<body>
<header><div class="title">Dashboard</div><div class="updated">{last_updated}</div></header>
{banner}
<main>
<div class="camera">{camera}</div>
<aside>{cards}</aside>
</main>
</body>
</html>"#,
        refresh = refresh_secs,
        last_updated = last_updated,
        banner = banner,
        camera = camera_panel(snapshot, features),
        cards = cards,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeriesConfig;
    use crate::display::{DisplayState, MetricSeries};
    use crate::image::ImageSource;
    use crate::overlay::OverlayFrame;

    fn snapshot() -> DashboardSnapshot {
        let series = MetricSeries::seeded(&SeriesConfig::default());
        let display = DisplayState::initial(&series);
        DashboardSnapshot {
            series,
            display,
            overlay: OverlayFrame::default(),
            notifications: Permission::Pending,
            last_applied_seq: 0,
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(html_escape(r#"<a href="x">&</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }

    #[test]
    fn sparkline_spans_the_box() {
        let svg = sparkline(&[1.0, 2.0, 3.0]);
        assert!(svg.contains(r#"points="0.0,60.0 100.0,30.0 200.0,0.0""#));
        let flat = sparkline(&[5.0]);
        assert!(flat.contains(r#"points="0.0,30.0""#));
        assert!(!sparkline(&[]).contains("polyline"));
    }

    #[test]
    fn page_before_first_reading() {
        let html = dashboard_page(&snapshot(), &FeatureFlags::default(), Duration::from_secs(5));
        assert!(html.contains(r#"content="5""#));
        assert!(html.contains("Loading..."));
        assert!(html.contains("30°C"));
        assert!(html.contains("70%"));
        assert!(html.contains("1013 hPa"));
        assert!(html.contains("<polyline"));
        assert!(!html.contains("class=\"banner\""));
    }

    #[test]
    fn page_with_image_and_blocked_notifications() {
        let mut snap = snapshot();
        snap.display.last_updated = Some("02:05:09 pm".to_string());
        snap.display.image = ImageSource::Url("data:image/jpeg;base64,/9j/4AAQ".to_string());
        snap.notifications = Permission::Denied;
        let features = FeatureFlags { enable_charts: false, ..FeatureFlags::default() };

        let html = dashboard_page(&snap, &features, Duration::from_millis(500));
        assert!(html.contains("Last updated: 02:05:09 pm"));
        assert!(html.contains(r#"<img src="data:image/jpeg;base64,/9j/4AAQ""#));
        assert!(html.contains("class=\"banner\""));
        assert!(!html.contains("<polyline"));
        assert!(html.contains(r#"content="1""#));
    }

    #[test]
    fn failed_frame_shows_placeholder_when_detecting() {
        let mut snap = snapshot();
        snap.last_applied_seq = 3;
        snap.display.image = ImageSource::Url("data:image/jpeg;base64,!!".to_string());
        snap.overlay = OverlayFrame { seq: 3, image_failed: true, ..OverlayFrame::default() };
        let features = FeatureFlags { enable_detection: true, ..FeatureFlags::default() };

        let html = dashboard_page(&snap, &features, Duration::from_secs(5));
        assert!(!html.contains("<img"));
        assert!(html.contains(r#"<div class="placeholder">Loading...</div>"#));
    }
}
