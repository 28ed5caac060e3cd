use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::ml::Severity;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    pub events: EventsConfig,
    pub network: NetworkConfig,
    pub model: ModelConfig,
    pub training: TrainingSettings,
    pub suggestions: SuggestionConfig,
    pub alerts: AlertConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// PostgreSQL URL, usually provided through `DATABASE_URL`
    pub url: Option<String>,
}

/// Where raw access events are read from
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventSourceKind {
    #[default]
    Database,
    Api,
    Csv,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EventsConfig {
    pub source: EventSourceKind,
    /// Base URL of the HTTP event store
    pub api_url: Option<String>,
    /// CSV export with an `id,timestamp,type,location` header
    pub csv_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Location of the artifact bundle
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrainingSettings {
    /// Days of history used by the scheduled retrain
    pub rolling_window_days: i64,
    pub retrain_interval_days: i64,
    pub smoothing_window: usize,
    pub max_iterations: usize,
    /// How often the daemon checks whether a retrain is due
    pub check_interval_secs: u64,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            rolling_window_days: 120,
            retrain_interval_days: 7,
            smoothing_window: 3,
            max_iterations: 100,
            check_interval_secs: 3600,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SuggestionConfig {
    /// Candidate weekdays (0=Sunday)
    #[serde(default = "default_suggestion_days")]
    pub days: Vec<u32>,
    /// Candidate hours of day
    #[serde(default = "default_suggestion_hours")]
    pub hours: Vec<u32>,
    pub top: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            days: default_suggestion_days(),
            hours: default_suggestion_hours(),
            top: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertConfig {
    /// Minimum level that raises an alert; unknown labels mean "low"
    pub threshold: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold: "high".to_string(),
        }
    }
}

impl AlertConfig {
    pub fn threshold_level(&self) -> Severity {
        Severity::parse_or_low(&self.threshold)
    }
}

fn default_suggestion_days() -> Vec<u32> {
    vec![1, 2, 3, 4, 5]
}

fn default_suggestion_hours() -> Vec<u32> {
    vec![7, 8, 9, 16, 17, 18]
}

fn default_model_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("congestion-forecast")
        .join("model.json")
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // A missing .env is fine; deployments set the variables directly
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("congestion-forecast");

        let mut builder = Config::builder()
            // Built-in defaults
            // Events
            .set_default("events.source", "database")?
            // Network
            .set_default("network.request_timeout_secs", 30)?
            .set_default("network.connect_timeout_secs", 10)?
            // Model
            .set_default(
                "model.path",
                default_model_path().to_string_lossy().into_owned(),
            )?
            // Training
            .set_default("training.rolling_window_days", 120)?
            .set_default("training.retrain_interval_days", 7)?
            .set_default("training.smoothing_window", 3)?
            .set_default("training.max_iterations", 100)?
            .set_default("training.check_interval_secs", 3600)?
            // Suggestions
            .set_default("suggestions.top", 10)?
            // Alerts
            .set_default("alerts.threshold", "high")?;

        // Database URL is optional: only the database event source needs it
        if let Ok(database_url) = std::env::var("DATABASE_URL") {
            builder = builder.set_default("database.url", database_url)?;
        }

        let builder = builder
            // ./config.toml
            .add_source(File::from(PathBuf::from("config.toml")).required(false))
            // <config_dir>/congestion-forecast/config.toml, overrides ./config.toml
            .add_source(File::from(config_dir.join("config.toml")).required(false))
            // CONGESTION__MODEL__PATH=... and friends win over both files
            .add_source(Environment::with_prefix("CONGESTION").separator("__"));

        let s = builder.build().context("Failed to build configuration")?;
        s.try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
