//! Congestion Forecast Library
//!
//! Trains weekday/hour congestion models from access events and serves
//! predictions, ranked suggestions and alerts from the stored artifact.

pub mod alerts;
pub mod api;
pub mod config;
pub mod db;
pub mod events;
pub mod ml;
pub mod schedule;
pub mod service;
pub mod suggestions;
pub mod traits;

// Re-export commonly used types
pub use alerts::{Alert, AlertKind, build_alerts};
pub use api::EventApiClient;
pub use config::AppConfig;
pub use db::Database;
pub use events::{AccessEvent, CsvEventSource, StaticEventSource, TimeRange};
pub use ml::{
    ArtifactBundle, ArtifactStore, BundleMetadata, FileArtifactStore, ForecastError,
    InMemoryArtifactStore, Prediction, Predictor, Severity, SlotForecast,
};
pub use schedule::RetrainSchedule;
pub use service::{ForecastService, ServiceSettings};
pub use suggestions::{SuggestionOptions, top_suggestions};
pub use traits::{Clock, EventSource, MockClock, SystemClock};
