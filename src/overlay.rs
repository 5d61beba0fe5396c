//! ==============================================================================
//! overlay.rs - detection boxes drawn over the camera frame
//! ==============================================================================
//!
//! purpose:
//!     paints the current frame onto a canvas and annotates every admitted
//!     detection with a stroked box and a `"<class> (<score>%)"` label.
//!
//! relationships:
//!     - used by: monitor.rs (redraw after each applied reading)
//!     - SvgCanvas output is embedded by render.rs into the dashboard page
//!
//! ==============================================================================

use crate::domain::{BoundingBox, Detection};
use crate::render::html_escape;
use crate::round::half_up;
use serde::Serialize;
use std::fmt::Write;

/// labels never sit closer than this to the top edge
const MIN_LABEL_BASELINE: f64 = 10.0;
/// gap between a label's baseline and its box
const LABEL_GAP: f64 = 5.0;

/// the drawing surface the overlay needs
pub trait Canvas {
    fn clear(&mut self);
    fn draw_image(&mut self, src: &str);
    fn fill_text(&mut self, text: &str, x: f64, y: f64);
    fn stroke_rect(&mut self, bbox: &BoundingBox);
}

/// which boxes are worth drawing
///
/// zero-area boxes are always skipped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AreaPolicy {
    pub min_area: f64,
    pub max_area: Option<f64>,
}

impl AreaPolicy {
    pub fn admits(&self, bbox: &BoundingBox) -> bool {
        let area = bbox.area();
        area > 0.0 && area >= self.min_area && self.max_area.map_or(true, |max| area <= max)
    }
}

pub fn label(detection: &Detection) -> String {
    format!("{} ({}%)", detection.class, half_up(detection.score * 100.0))
}

/// where the label baseline goes for a box
pub fn label_position(bbox: &BoundingBox) -> (f64, f64) {
    (bbox.x, (bbox.y - LABEL_GAP).max(MIN_LABEL_BASELINE))
}

/// repaint `canvas`; returns how many detections were drawn
pub fn draw<C: Canvas + ?Sized>(
    canvas: &mut C,
    image_src: &str,
    detections: &[Detection],
    policy: &AreaPolicy,
) -> usize {
    canvas.clear();
    canvas.draw_image(image_src);

    let mut drawn = 0;
    for detection in detections.iter().filter(|d| policy.admits(&d.bbox)) {
        let (x, y) = label_position(&detection.bbox);
        canvas.fill_text(&label(detection), x, y);
        canvas.stroke_rect(&detection.bbox);
        drawn += 1;
    }
    drawn
}

// ==============================================================================
// svg canvas
// ==============================================================================

/// canvas that renders to an inline `<svg>` element
#[derive(Debug, Clone)]
pub struct SvgCanvas {
    width: u32,
    height: u32,
    elements: Vec<String>,
}

impl SvgCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, elements: Vec::new() }
    }

    pub fn finish(self) -> String {
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" class="overlay" viewBox="0 0 {w} {h}" width="{w}" height="{h}">"#,
            w = self.width,
            h = self.height
        );
        for element in &self.elements {
            svg.push_str(element);
        }
        svg.push_str("</svg>");
        svg
    }
}

impl Canvas for SvgCanvas {
    fn clear(&mut self) {
        self.elements.clear();
    }

    fn draw_image(&mut self, src: &str) {
        self.elements.push(format!(
            r#"<image href="{}" x="0" y="0" width="{}" height="{}" preserveAspectRatio="xMidYMid slice"/>"#,
            html_escape(src),
            self.width,
            self.height
        ));
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        let mut el = String::new();
        let _ = write!(
            el,
            r#"<text x="{}" y="{}" fill="red" font-size="14" font-family="sans-serif">{}</text>"#,
            x,
            y,
            html_escape(text)
        );
        self.elements.push(el);
    }

    fn stroke_rect(&mut self, bbox: &BoundingBox) {
        self.elements.push(format!(
            r#"<rect x="{}" y="{}" width="{}" height="{}" fill="none" stroke="red" stroke-width="2"/>"#,
            bbox.x, bbox.y, bbox.width, bbox.height
        ));
    }
}

/// serializable copy of what was drawn last
#[derive(Debug, Clone, Default, Serialize)]
pub struct OverlayFrame {
    /// cycle that produced this frame
    pub seq: u64,
    pub detections: Vec<Detection>,
    /// rendered `<svg>`, absent when there was no frame to draw on
    pub svg: Option<String>,
    /// the camera frame could not be decoded or downloaded
    pub image_failed: bool,
}
