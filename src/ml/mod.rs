//! Statistical models for congestion forecasting
//!
//! Training turns raw access events into an [`ArtifactBundle`] holding a 1-D
//! least-squares line over the weekday/hour slot index and a 1-D k-means model
//! that maps forecasts onto severity levels. Serving reads the bundle back and
//! answers (weekday, hour) queries.

pub mod clustering;
pub mod features;
pub mod persistence;
pub mod prediction;
pub mod regression;
pub mod smoothing;
pub mod training;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use clustering::ClusterModel;
pub use features::{FeatureRow, extract_features, extract_features_in, slot_index};
pub use persistence::{
    ArtifactBundle, ArtifactStore, BundleMetadata, FileArtifactStore, InMemoryArtifactStore,
    PersistenceError,
};
pub use prediction::{Prediction, Predictor, SlotForecast, predict};
pub use regression::RegressionModel;
pub use smoothing::moving_average;
pub use training::{TrainingConfig, train, train_on_rows, train_with_timezone};

/// Errors that can occur while training or serving a model
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    /// Malformed arguments, e.g. mismatched regression inputs
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Fewer values than requested clusters
    #[error("Insufficient data: {values} values for {clusters} clusters")]
    InsufficientData { values: usize, clusters: usize },
    /// No event fell into any weekday/hour slot
    #[error("No training data: no events with a usable timestamp")]
    NoTrainingData,
    /// A prediction was requested before any successful training run
    #[error("Model not trained")]
    ModelNotTrained,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    /// The upstream event store could not be read
    #[error("Event source error: {0}")]
    EventSource(String),
}

/// Ordinal congestion classification derived from cluster rank
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    /// Numeric rank used for threshold comparisons (low=0, medium=1, high=2)
    pub fn rank(self) -> u8 {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
        }
    }

    /// Label for the cluster at the given centroid rank; every rank past the
    /// second shares `High`.
    pub fn from_rank(rank: usize) -> Self {
        match rank {
            0 => Severity::Low,
            1 => Severity::Medium,
            _ => Severity::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Parse a level label, treating anything unrecognised as `Low` (rank 0).
    pub fn parse_or_low(label: &str) -> Self {
        label.parse().unwrap_or(Severity::Low)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(ForecastError::InvalidInput(format!(
                "unknown severity level: {other:?}"
            ))),
        }
    }
}
