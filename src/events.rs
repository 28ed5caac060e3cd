//! Access events and the file/in-memory event sources
//!
//! Only the timestamp matters to the forecasting core; type and location are
//! carried through for callers that want them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::traits::EventSource;

/// A single entry/exit record from the event store.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AccessEvent {
    #[serde(default)]
    pub id: i64,
    /// RFC 3339 timestamp; events without a usable one are ignored
    #[serde(default, alias = "ts")]
    pub timestamp: Option<String>,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl AccessEvent {
    /// Create an event at the given instant with no type or location.
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: Some(timestamp.to_rfc3339()),
            ..Default::default()
        }
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Inclusive UTC time window; an open bound matches everything on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// The full history
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    /// The rolling window of `days` days ending at `now`, or `None` when the
    /// window start falls outside the representable date range
    pub fn last_days(now: DateTime<Utc>, days: i64) -> Option<Self> {
        let from = now.checked_sub_signed(Duration::try_days(days)?)?;
        Some(Self {
            from: Some(from),
            to: Some(now),
        })
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| timestamp >= from) && self.to.is_none_or(|to| timestamp <= to)
    }

    /// Keep events inside the range. With any bound set, events lacking a
    /// timestamp cannot be placed and are dropped.
    pub fn filter(&self, events: Vec<AccessEvent>) -> Vec<AccessEvent> {
        if self.is_unbounded() {
            return events;
        }

        events
            .into_iter()
            .filter(|event| event.datetime().is_some_and(|ts| self.contains(ts)))
            .collect()
    }
}

/// Events held in memory, e.g. already fetched by the caller
#[derive(Debug, Clone, Default)]
pub struct StaticEventSource {
    events: Vec<AccessEvent>,
}

impl StaticEventSource {
    pub fn new(events: Vec<AccessEvent>) -> Self {
        Self { events }
    }
}

impl EventSource for StaticEventSource {
    async fn fetch_events(&self, range: TimeRange) -> Result<Vec<AccessEvent>> {
        Ok(range.filter(self.events.clone()))
    }
}

/// Events exported to a CSV file with an `id,timestamp,type,location` header
#[derive(Debug, Clone)]
pub struct CsvEventSource {
    path: PathBuf,
}

impl CsvEventSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every event from a CSV file.
pub fn read_events_csv(path: &Path) -> Result<Vec<AccessEvent>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open event file {}", path.display()))?;

    reader
        .deserialize()
        .collect::<Result<Vec<AccessEvent>, csv::Error>>()
        .with_context(|| format!("Failed to parse event file {}", path.display()))
}

/// Write events to a CSV file in the layout `read_events_csv` expects.
pub fn write_events_csv(path: &Path, events: &[AccessEvent]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("Failed to create CSV writer")?;

    for event in events {
        writer
            .serialize(event)
            .context("Failed to serialize event")?;
    }

    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

impl EventSource for CsvEventSource {
    async fn fetch_events(&self, range: TimeRange) -> Result<Vec<AccessEvent>> {
        let path = self.path.clone();

        let events = tokio::task::spawn_blocking(move || read_events_csv(&path))
            .await
            .context("CSV read task failed")??;

        Ok(range.filter(events))
    }
}
