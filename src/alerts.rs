//! threshold alerting
//!
//! every rule is checked on its own, so one reading can raise several alerts.
//! there is no memory between cycles: a metric that stays above its limit
//! alerts again on every applied reading.

use crate::domain::{Metric, Reading};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub metric: Metric,
    /// fires when the value is strictly greater
    pub above: f64,
    pub message: String,
}

impl AlertRule {
    pub fn new(metric: Metric, above: f64, message: impl Into<String>) -> Self {
        Self { metric, above, message: message.into() }
    }

    pub fn defaults() -> Vec<AlertRule> {
        vec![
            AlertRule::new(Metric::Temperature, 23.0, "temperature dangerously high"),
            AlertRule::new(Metric::Humidity, 85.0, "humidity dangerously high"),
            AlertRule::new(Metric::Pressure, 1150.0, "pressure dangerously high"),
        ]
    }

    pub fn check(&self, reading: &Reading) -> Option<Alert> {
        let value = self.metric.value(reading);
        (value > self.above).then(|| Alert {
            metric: self.metric,
            value,
            limit: self.above,
            message: self.message.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub metric: Metric,
    pub value: f64,
    pub limit: f64,
    pub message: String,
}

impl Alert {
    /// text handed to the notifier: the rule's message as configured
    pub fn notification_text(&self) -> &str {
        &self.message
    }
}

/// all alerts the reading triggers, in rule order
pub fn evaluate(rules: &[AlertRule], reading: &Reading) -> Vec<Alert> {
    rules.iter().filter_map(|rule| rule.check(reading)).collect()
}
