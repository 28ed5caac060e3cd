use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::events::{AccessEvent, TimeRange, write_events_csv};
use crate::traits::{Clock, EventSource};

/// PostgreSQL-backed event store.
///
/// Timestamps are stored as RFC 3339 text in UTC, so range filters compare
/// the text directly.
#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;

        Ok(Self { pool })
    }

    pub async fn insert_event(&self, event: &AccessEvent) -> Result<i64> {
        // Normalise to UTC so text comparison matches time order
        let timestamp = event
            .datetime()
            .map(|dt| dt.to_rfc3339())
            .or_else(|| event.timestamp.clone());

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO access_events (timestamp, event_type, location) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(timestamp)
        .bind(event.event_type.as_deref())
        .bind(event.location.as_deref())
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert access event")?;

        Ok(id)
    }

    /// Batch insert multiple events.
    pub async fn insert_events(&self, events: &[AccessEvent]) -> Result<()> {
        for event in events {
            self.insert_event(event).await?;
        }
        Ok(())
    }

    pub async fn get_events_range(&self, range: TimeRange) -> Result<Vec<AccessEvent>> {
        let from = range.from.map(|dt| dt.to_rfc3339());
        let to = range.to.map(|dt| dt.to_rfc3339());

        let events = sqlx::query_as::<_, AccessEvent>(
            r#"
            SELECT id, timestamp, event_type, location
            FROM access_events
            WHERE ($1::TEXT IS NULL OR timestamp >= $1)
              AND ($2::TEXT IS NULL OR timestamp <= $2)
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch access events")?;

        Ok(events)
    }

    pub async fn count_events(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM access_events")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count access events")?;

        Ok(count)
    }

    /// Export every stored event to a timestamped CSV file in `output_dir`.
    ///
    /// The file uses the `id,timestamp,type,location` layout that
    /// `CsvEventSource` reads back. Returns the path of the created file.
    pub async fn export_to_csv<C: Clock>(&self, output_dir: &Path, clock: &C) -> Result<PathBuf> {
        let events = self
            .get_events_range(TimeRange::all())
            .await
            .context("Failed to fetch events for export")?;

        let filename = format!(
            "congestion_events_export_{}.csv",
            clock.now_utc().format("%Y%m%d_%H%M%S")
        );
        let output_path = output_dir.join(filename);

        let path = output_path.clone();
        tokio::task::spawn_blocking(move || write_events_csv(&path, &events))
            .await
            .context("CSV export task failed")??;

        Ok(output_path)
    }
}

impl EventSource for Database {
    async fn fetch_events(&self, range: TimeRange) -> Result<Vec<AccessEvent>> {
        self.get_events_range(range).await
    }
}
