//! Congestion alerts for downstream notifiers

use serde::{Deserialize, Serialize};

use crate::ml::features::weekday_name;
use crate::ml::{Severity, SlotForecast};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Congestion,
}

/// A forecast slot that crossed the alert threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub weekday: u32,
    pub hour_slot: u32,
    /// Forecast event count
    pub expected: f64,
    pub level: Severity,
}

impl Alert {
    pub fn congestion(forecast: &SlotForecast) -> Self {
        Self {
            kind: AlertKind::Congestion,
            weekday: forecast.weekday,
            hour_slot: forecast.hour_slot,
            expected: forecast.value,
            level: forecast.level,
        }
    }

    /// One-line summary, e.g. "High congestion expected Monday 08:00 (~42.0 events)"
    pub fn message(&self) -> String {
        let level = match self.level {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        };
        format!(
            "{} congestion expected {} {:02}:00 (~{:.1} events)",
            level,
            weekday_name(self.weekday),
            self.hour_slot,
            self.expected
        )
    }
}

/// Keep forecasts at or above `threshold`, preserving input order.
pub fn build_alerts(forecasts: &[SlotForecast], threshold: Severity) -> Vec<Alert> {
    forecasts
        .iter()
        .filter(|forecast| forecast.level.rank() >= threshold.rank())
        .map(Alert::congestion)
        .collect()
}
