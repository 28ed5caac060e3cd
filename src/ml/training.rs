//! Training pipeline for congestion models

use chrono::{DateTime, Local, TimeZone, Utc};
use tracing::{debug, info};

use crate::config::TrainingSettings;
use crate::events::AccessEvent;
use crate::traits::Clock;

use super::ForecastError;
use super::clustering::{ClusterModel, DEFAULT_MAX_ITERATIONS, cluster_count_for};
use super::features::{FeatureRow, extract_features_in};
use super::persistence::{ArtifactBundle, BundleMetadata};
use super::regression::RegressionModel;
use super::smoothing::moving_average;

/// Tunables for a training run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingConfig {
    /// Window of the diagnostic moving average
    pub smoothing_window: usize,
    /// Cap on k-means iterations
    pub max_iterations: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            smoothing_window: 3,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl From<&TrainingSettings> for TrainingConfig {
    fn from(settings: &TrainingSettings) -> Self {
        Self {
            smoothing_window: settings.smoothing_window,
            max_iterations: settings.max_iterations,
        }
    }
}

/// Train a bundle from raw events, bucketing them in the local timezone.
///
/// Pure apart from reading the clock: persisting the result is up to the caller.
pub fn train<C: Clock + ?Sized>(
    events: &[AccessEvent],
    clock: &C,
    config: &TrainingConfig,
) -> Result<ArtifactBundle, ForecastError> {
    train_with_timezone(events, &Local, clock.now_utc(), config)
}

pub fn train_with_timezone<Tz: TimeZone>(
    events: &[AccessEvent],
    tz: &Tz,
    now: DateTime<Utc>,
    config: &TrainingConfig,
) -> Result<ArtifactBundle, ForecastError> {
    let rows = extract_features_in(events, tz);
    debug!(events = events.len(), rows = rows.len(), "Extracted feature rows");
    train_on_rows(&rows, now, config)
}

/// Fit every model over pre-aggregated rows and assemble the bundle.
pub fn train_on_rows(
    rows: &[FeatureRow],
    now: DateTime<Utc>,
    config: &TrainingConfig,
) -> Result<ArtifactBundle, ForecastError> {
    if rows.is_empty() {
        return Err(ForecastError::NoTrainingData);
    }

    let xs: Vec<f64> = rows.iter().map(FeatureRow::x).collect();
    let ys: Vec<f64> = rows.iter().map(|row| row.count as f64).collect();

    let lin_model = RegressionModel::train(&xs, &ys)?;
    let ma_series = moving_average(&ys, config.smoothing_window);

    let k = cluster_count_for(rows.len());
    let kmeans = ClusterModel::train_with_max_iterations(&ys, k, config.max_iterations)?;

    info!(
        rows = rows.len(),
        k,
        slope = lin_model.slope,
        intercept = lin_model.intercept,
        mse = lin_model.mean_squared_error(&xs, &ys),
        "Trained congestion model"
    );

    Ok(ArtifactBundle {
        lin_model,
        ma_series,
        kmeans,
        metadata: BundleMetadata::new(now, rows.len()),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::ml::{Severity, predict};
    use crate::traits::MockClock;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 3, 0, 0).unwrap()
    }

    fn event_at(timestamp: &str) -> AccessEvent {
        AccessEvent {
            timestamp: Some(timestamp.to_string()),
            ..Default::default()
        }
    }

    /// Three Monday 08:00 entries and one Tuesday 09:00 entry
    fn commuter_events() -> Vec<AccessEvent> {
        vec![
            event_at("2024-06-17T08:00:00Z"),
            event_at("2024-06-17T08:00:00Z"),
            event_at("2024-06-17T08:00:00Z"),
            event_at("2024-06-18T09:00:00Z"),
        ]
    }

    #[test]
    fn test_train_no_events() {
        let result = train_with_timezone(&[], &Utc, now(), &TrainingConfig::default());
        assert!(matches!(result, Err(ForecastError::NoTrainingData)));
    }

    #[test]
    fn test_train_only_untimed_events() {
        let events = vec![AccessEvent::default(), event_at("garbage")];
        let result = train_with_timezone(&events, &Utc, now(), &TrainingConfig::default());

        assert!(matches!(result, Err(ForecastError::NoTrainingData)));
    }

    #[test]
    fn test_train_commuter_scenario() {
        let bundle =
            train_with_timezone(&commuter_events(), &Utc, now(), &TrainingConfig::default())
                .unwrap();

        assert_eq!(bundle.metadata.n, 2);
        assert_eq!(bundle.metadata.version, 1);
        assert_eq!(bundle.metadata.updated_at, now());
        assert_eq!(bundle.ma_series, vec![3.0, 2.0]);
        // floor(sqrt(2)) = 1 cluster
        assert_eq!(bundle.kmeans.k(), 1);

        let monday = predict(&bundle, 1, 8);
        let tuesday = predict(&bundle, 2, 9);

        assert!((monday.value - 3.0).abs() < (monday.value - 1.0).abs());
        assert!(monday.level.rank() >= tuesday.level.rank());
    }

    #[test]
    fn test_train_with_clock_stamps_updated_at() {
        let clock = MockClock::new(now());
        let bundle = train(&commuter_events(), &clock, &TrainingConfig::default()).unwrap();

        assert_eq!(bundle.metadata.updated_at, now());
    }

    #[test]
    fn test_train_full_week_uses_three_clusters() {
        // Busy mornings, quiet nights across the week
        let mut rows = Vec::new();
        for weekday in 0..7 {
            for hour_slot in 0..24 {
                let count = match hour_slot {
                    7..=9 => 40,
                    10..=18 => 15,
                    _ => 1,
                };
                rows.push(FeatureRow {
                    weekday,
                    hour_slot,
                    count,
                });
            }
        }

        let bundle = train_on_rows(&rows, now(), &TrainingConfig::default()).unwrap();

        assert_eq!(bundle.metadata.n, 168);
        assert_eq!(bundle.kmeans.k(), 3);
        assert_eq!(bundle.ma_series.len(), 168);
        assert_eq!(bundle.kmeans.classify(40.0), Severity::High);
        assert_eq!(bundle.kmeans.classify(15.0), Severity::Medium);
        assert_eq!(bundle.kmeans.classify(1.0), Severity::Low);
    }

    #[test]
    fn test_smoothing_window_is_configurable() {
        let rows = vec![
            FeatureRow {
                weekday: 1,
                hour_slot: 8,
                count: 4,
            },
            FeatureRow {
                weekday: 1,
                hour_slot: 9,
                count: 2,
            },
        ];
        let config = TrainingConfig {
            smoothing_window: 1,
            ..Default::default()
        };

        let bundle = train_on_rows(&rows, now(), &config).unwrap();
        assert_eq!(bundle.ma_series, vec![4.0, 2.0]);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = TrainingSettings {
            smoothing_window: 5,
            max_iterations: 20,
            ..Default::default()
        };
        let config = TrainingConfig::from(&settings);

        assert_eq!(config.smoothing_window, 5);
        assert_eq!(config.max_iterations, 20);
    }

    #[test]
    fn test_retrain_replaces_rather_than_merges() {
        let first = train_with_timezone(&commuter_events(), &Utc, now(), &TrainingConfig::default())
            .unwrap();

        let later = vec![event_at("2024-06-19T12:00:00Z")];
        let second = train_with_timezone(
            &later,
            &Utc,
            now() + Duration::weeks(1),
            &TrainingConfig::default(),
        )
        .unwrap();

        assert_eq!(first.metadata.n, 2);
        assert_eq!(second.metadata.n, 1);
        assert_eq!(second.lin_model.slope, 0.0);
        assert_eq!(second.lin_model.intercept, 1.0);
    }
}
