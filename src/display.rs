//! ==============================================================================
//! display.rs - rolling state and its render-ready projection
//! ==============================================================================
//!
//! purpose:
//!     `MetricSeries` holds one rolling window per metric.
//!     `DisplayState` is recomputed from it after every applied reading:
//!     latest values, the "last updated" text and the camera image source.
//!
//! both are plain values. an update builds new ones and the monitor swaps
//! them in under its lock, so a failed cycle never leaves half-applied state.
//!
//! ==============================================================================

use crate::config::{MetricPrecision, SeriesConfig};
use crate::domain::{Metric, Reading};
use crate::image::{self, ImageSource};
use crate::round::round;
use crate::series::RollingSeries;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

/// 12-hour clock with lowercase meridiem, e.g. `02:05:09 pm`
const LAST_UPDATED_FORMAT: &str = "%I:%M:%S %P";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub temperature: RollingSeries<f64>,
    pub humidity: RollingSeries<f64>,
    pub pressure: RollingSeries<f64>,
}

impl MetricSeries {
    pub fn seeded(config: &SeriesConfig) -> Self {
        Self {
            temperature: RollingSeries::seeded(config.seed.temperature, config.capacity),
            humidity: RollingSeries::seeded(config.seed.humidity, config.capacity),
            pressure: RollingSeries::seeded(config.seed.pressure, config.capacity),
        }
    }

    pub fn get(&self, metric: Metric) -> &RollingSeries<f64> {
        match metric {
            Metric::Temperature => &self.temperature,
            Metric::Humidity => &self.humidity,
            Metric::Pressure => &self.pressure,
        }
    }

    /// new series with `reading` rounded and appended to every metric
    pub fn appended(&self, reading: &Reading, precision: &MetricPrecision) -> Self {
        let next = |metric: Metric| {
            self.get(metric)
                .appended(round(metric.value(reading), precision.for_metric(metric)))
        };
        Self {
            temperature: next(Metric::Temperature),
            humidity: next(Metric::Humidity),
            pressure: next(Metric::Pressure),
        }
    }

    pub fn latest(&self, metric: Metric) -> f64 {
        self.get(metric).latest().copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayState {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    /// `None` until the first reading arrives
    pub last_updated: Option<String>,
    pub image: ImageSource,
}

impl DisplayState {
    /// state shown before any fetch succeeded
    pub fn initial(series: &MetricSeries) -> Self {
        Self {
            temperature: series.latest(Metric::Temperature),
            humidity: series.latest(Metric::Humidity),
            pressure: series.latest(Metric::Pressure),
            last_updated: None,
            image: ImageSource::Placeholder,
        }
    }

    /// project freshly appended series and the reading that produced them
    pub fn derive(series: &MetricSeries, reading: &Reading, offset: &FixedOffset) -> Self {
        Self {
            temperature: series.latest(Metric::Temperature),
            humidity: series.latest(Metric::Humidity),
            pressure: series.latest(Metric::Pressure),
            last_updated: Some(format_last_updated(&reading.time, offset)),
            image: image::resolve(reading.img.as_deref()),
        }
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::Pressure => self.pressure,
        }
    }
}

pub fn format_last_updated(time: &DateTime<Utc>, offset: &FixedOffset) -> String {
    time.with_timezone(offset).format(LAST_UPDATED_FORMAT).to_string()
}
