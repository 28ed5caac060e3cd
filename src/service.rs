//! Request surface tying an event source, an artifact store and a clock together

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::alerts::{Alert, build_alerts};
use crate::config::AppConfig;
use crate::events::TimeRange;
use crate::ml::features::{DAYS_PER_WEEK, HOURS_PER_DAY};
use crate::ml::{
    ArtifactStore, BundleMetadata, ForecastError, Prediction, Predictor, Severity, SlotForecast,
    TrainingConfig, train,
};
use crate::suggestions::{SuggestionOptions, top_suggestions};
use crate::traits::{Clock, EventSource};

/// Default history window for `weekly_update`
pub const DEFAULT_RANGE_DAYS: i64 = 120;

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub training: TrainingConfig,
    pub rolling_window_days: i64,
    pub suggestions: SuggestionOptions,
    pub alert_threshold: Severity,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            training: TrainingConfig::default(),
            rolling_window_days: DEFAULT_RANGE_DAYS,
            suggestions: SuggestionOptions::default(),
            alert_threshold: Severity::High,
        }
    }
}

impl From<&AppConfig> for ServiceSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            training: TrainingConfig::from(&config.training),
            rolling_window_days: config.training.rolling_window_days,
            suggestions: SuggestionOptions::from(&config.suggestions),
            alert_threshold: config.alerts.threshold_level(),
        }
    }
}

/// Train, predict, rank and alert over a single artifact store.
///
/// Training runs are serialised: each one holds the training lock across the
/// fetch, train and save steps. Read operations load one bundle snapshot per
/// call and never wait on training.
pub struct ForecastService<E, S, C> {
    source: E,
    store: S,
    clock: C,
    settings: ServiceSettings,
    training_lock: Mutex<()>,
}

impl<E, S, C> ForecastService<E, S, C>
where
    E: EventSource,
    S: ArtifactStore,
    C: Clock,
{
    pub fn new(source: E, store: S, clock: C) -> Self {
        Self::with_settings(source, store, clock, ServiceSettings::default())
    }

    pub fn with_settings(source: E, store: S, clock: C, settings: ServiceSettings) -> Self {
        Self {
            source,
            store,
            clock,
            settings,
            training_lock: Mutex::new(()),
        }
    }

    pub fn source(&self) -> &E {
        &self.source
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Train on events between `from` and `to` (inclusive, open when `None`)
    pub async fn train(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<BundleMetadata, ForecastError> {
        if let (Some(from), Some(to)) = (from, to)
            && from > to
        {
            return Err(ForecastError::InvalidInput(format!(
                "range start {from} is after range end {to}"
            )));
        }

        self.train_range(TimeRange::between(from, to)).await
    }

    /// Train on the full event history
    pub async fn train_historical(&self) -> Result<BundleMetadata, ForecastError> {
        self.train_range(TimeRange::all()).await
    }

    /// Retrain on the trailing window, `range_days` or the configured default
    pub async fn weekly_update(
        &self,
        range_days: Option<i64>,
    ) -> Result<BundleMetadata, ForecastError> {
        let days = range_days.unwrap_or(self.settings.rolling_window_days);
        if days <= 0 {
            return Err(ForecastError::InvalidInput(format!(
                "range_days must be positive, got {days}"
            )));
        }

        let range = TimeRange::last_days(self.clock.now_utc(), days).ok_or_else(|| {
            ForecastError::InvalidInput(format!(
                "range_days {days} reaches past the supported date range"
            ))
        })?;
        self.train_range(range).await
    }

    async fn train_range(&self, range: TimeRange) -> Result<BundleMetadata, ForecastError> {
        let _guard = self.training_lock.lock().await;

        let result = self.fetch_train_save(range).await;
        if let Err(e) = &result {
            warn!("Training failed, keeping previous bundle: {}", e);
        }
        result
    }

    async fn fetch_train_save(&self, range: TimeRange) -> Result<BundleMetadata, ForecastError> {
        let events = self
            .source
            .fetch_events(range)
            .await
            .map_err(|e| ForecastError::EventSource(format!("{e:#}")))?;
        debug!(
            events = events.len(),
            from = ?range.from,
            to = ?range.to,
            "Fetched training events"
        );

        let bundle = train(&events, &self.clock, &self.settings.training)?;
        self.store.save(&bundle)?;

        info!("Saved {}", bundle.summary());
        Ok(bundle.metadata)
    }

    /// Forecast a single slot from the current bundle
    pub fn predict(&self, weekday: u32, hour_slot: u32) -> Result<Prediction, ForecastError> {
        validate_slot(weekday, hour_slot)?;
        Ok(self.predictor()?.predict(weekday, hour_slot))
    }

    /// Busiest slots among the configured candidates
    pub fn suggestions(&self, top: Option<usize>) -> Result<Vec<SlotForecast>, ForecastError> {
        let mut options = self.settings.suggestions.clone();
        if let Some(top) = top {
            options.top = top;
        }
        self.rank(&options)
    }

    /// Alerts for every slot of the week at or above the threshold
    pub fn alerts(&self, threshold: Option<Severity>) -> Result<Vec<Alert>, ForecastError> {
        let threshold = threshold.unwrap_or(self.settings.alert_threshold);
        let forecasts = self.rank(&SuggestionOptions::full_week())?;
        Ok(build_alerts(&forecasts, threshold))
    }

    /// Forecasts for the next `hours` hour slots from now, in local time
    pub fn upcoming(&self, hours: u32) -> Result<Vec<SlotForecast>, ForecastError> {
        Ok(self.predictor()?.upcoming(&self.clock.now_local(), hours))
    }

    /// When the stored bundle was trained, if there is one
    pub fn last_trained(&self) -> Result<Option<DateTime<Utc>>, ForecastError> {
        Ok(self.store.load()?.map(|bundle| bundle.metadata.updated_at))
    }

    fn predictor(&self) -> Result<Predictor, ForecastError> {
        Predictor::from_store(&self.store)
    }

    fn rank(&self, options: &SuggestionOptions) -> Result<Vec<SlotForecast>, ForecastError> {
        let predictor = self.predictor()?;
        top_suggestions(
            |weekday, hour_slot| -> Result<Prediction, ForecastError> {
                validate_slot(weekday, hour_slot)?;
                Ok(predictor.predict(weekday, hour_slot))
            },
            options,
        )
    }
}

fn validate_slot(weekday: u32, hour_slot: u32) -> Result<(), ForecastError> {
    if weekday >= DAYS_PER_WEEK {
        return Err(ForecastError::InvalidInput(format!(
            "weekday must be 0-6, got {weekday}"
        )));
    }
    if hour_slot >= HOURS_PER_DAY {
        return Err(ForecastError::InvalidInput(format!(
            "hour must be 0-23, got {hour_slot}"
        )));
    }
    Ok(())
}
