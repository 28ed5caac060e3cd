use chrono::{DateTime, Duration, Utc};

use crate::config::TrainingSettings;
use crate::ml::ForecastError;
use crate::traits::Clock;

/// Periodic retraining policy with a configurable interval and rolling window.
#[derive(Debug, Clone, Copy)]
pub struct RetrainSchedule {
    interval: Duration,
    window_days: i64,
}

impl RetrainSchedule {
    pub fn new(config: &TrainingSettings) -> Result<Self, ForecastError> {
        let days = config.retrain_interval_days;
        let interval = Duration::try_days(days)
            .filter(|interval| *interval > Duration::zero())
            .ok_or_else(|| {
                ForecastError::InvalidInput(format!(
                    "retrain_interval_days must be a positive number of days, got {days}"
                ))
            })?;

        Ok(Self {
            interval,
            window_days: config.rolling_window_days,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn window_days(&self) -> i64 {
        self.window_days
    }

    /// Check if a model trained at `last_trained` is due for retraining.
    pub fn is_due(&self, last_trained: Option<DateTime<Utc>>, clock: &dyn Clock) -> bool {
        match last_trained {
            None => true,
            Some(last) => clock.now_utc() - last >= self.interval,
        }
    }

    /// When the next retrain should run; immediately if nothing was trained.
    pub fn next_due(&self, last_trained: Option<DateTime<Utc>>, clock: &dyn Clock) -> DateTime<Utc> {
        match last_trained {
            None => clock.now_utc(),
            Some(last) => last
                .checked_add_signed(self.interval)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

impl Default for RetrainSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::weeks(1),
            window_days: 120,
        }
    }
}
