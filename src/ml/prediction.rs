//! Serving forecasts from a trained artifact bundle

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use super::features::slot_index;
use super::persistence::{ArtifactBundle, ArtifactStore};
use super::{ForecastError, Severity};

/// Forecast for a single (weekday, hour) query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub value: f64,
    pub level: Severity,
}

/// A prediction tagged with the slot it was made for
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotForecast {
    /// Day of week (0=Sunday, 6=Saturday)
    pub weekday: u32,
    /// Hour of day (0-23)
    pub hour_slot: u32,
    pub value: f64,
    pub level: Severity,
}

impl SlotForecast {
    pub fn new(weekday: u32, hour_slot: u32, prediction: Prediction) -> Self {
        Self {
            weekday,
            hour_slot,
            value: prediction.value,
            level: prediction.level,
        }
    }
}

/// Evaluate the bundle's regression line at the slot and classify the result.
pub fn predict(bundle: &ArtifactBundle, weekday: u32, hour_slot: u32) -> Prediction {
    let value = bundle.lin_model.predict(slot_index(weekday, hour_slot));
    Prediction {
        value,
        level: bundle.kmeans.classify(value),
    }
}

/// Predictor over a single loaded bundle snapshot.
///
/// Load once per request and reuse it for every query in that request so a
/// concurrent retrain cannot be observed halfway.
#[derive(Debug, Clone)]
pub struct Predictor {
    bundle: ArtifactBundle,
}

impl Predictor {
    pub fn new(bundle: ArtifactBundle) -> Self {
        Self { bundle }
    }

    /// Load the current bundle, failing with `ModelNotTrained` if there is none
    pub fn from_store<S: ArtifactStore + ?Sized>(store: &S) -> Result<Self, ForecastError> {
        store
            .load()?
            .map(Self::new)
            .ok_or(ForecastError::ModelNotTrained)
    }

    pub fn predict(&self, weekday: u32, hour_slot: u32) -> Prediction {
        predict(&self.bundle, weekday, hour_slot)
    }

    /// Forecast each of the next `hours` hour slots after `start`, stopping
    /// early at the end of the representable date range.
    pub fn upcoming<Tz: TimeZone>(&self, start: &DateTime<Tz>, hours: u32) -> Vec<SlotForecast> {
        (1..=i64::from(hours))
            .map_while(|ahead| {
                let target = start.clone().checked_add_signed(Duration::hours(ahead))?;
                let weekday = target.weekday().num_days_from_sunday();
                let hour_slot = target.hour();
                Some(SlotForecast::new(
                    weekday,
                    hour_slot,
                    self.predict(weekday, hour_slot),
                ))
            })
            .collect()
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }
}
