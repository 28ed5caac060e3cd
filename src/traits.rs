//! Seams for time and event input.
//!
//! Training stamps bundles with the current time and the retrain schedule
//! measures bundle age, so both read a [`Clock`] instead of the system time.
//! Training input arrives through an [`EventSource`].

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use chrono::{DateTime, Duration, Local, Utc};

use crate::events::{AccessEvent, TimeRange};

// ==================== Clock ====================

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current time in the host timezone, used for upcoming-hour forecasts.
    fn now_local(&self) -> DateTime<Local> {
        self.now_utc().with_timezone(&Local)
    }
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock. Clones share one instant, so a test can keep a
/// handle and move time forward under a service that owns another clone.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set_time(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    pub fn advance(&self, step: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += step;
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ==================== EventSource ====================

/// Read-only access to the external store of raw access events.
///
/// Implementations apply the inclusive `range` filter themselves; events
/// are never mutated.
pub trait EventSource: Send + Sync {
    fn fetch_events(
        &self,
        range: TimeRange,
    ) -> impl Future<Output = Result<Vec<AccessEvent>>> + Send;
}

impl<E: EventSource> EventSource for Arc<E> {
    fn fetch_events(
        &self,
        range: TimeRange,
    ) -> impl Future<Output = Result<Vec<AccessEvent>>> + Send {
        (**self).fetch_events(range)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sunday_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 16, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_system_clock_tracks_wall_time() {
        let lower = Utc::now();
        let reading = SystemClock.now_utc();

        assert!(reading >= lower);
        assert!(reading <= Utc::now());
    }

    #[test]
    fn test_mock_clock_is_frozen() {
        let clock = MockClock::new(sunday_noon());

        assert_eq!(clock.now_utc(), sunday_noon());
        assert_eq!(clock.now_utc(), sunday_noon());
        assert_eq!(clock.now_local().with_timezone(&Utc), sunday_noon());
    }

    #[test]
    fn test_mock_clock_set_time() {
        let clock = MockClock::new(sunday_noon());
        let later = sunday_noon() + Duration::days(30);

        clock.set_time(later);

        assert_eq!(clock.now_utc(), later);
    }

    #[test]
    fn test_mock_clock_advance_by_week() {
        let clock = MockClock::new(sunday_noon());

        clock.advance(Duration::weeks(1));

        assert_eq!(
            clock.now_utc(),
            Utc.with_ymd_and_hms(2024, 6, 23, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_mock_clock_shared_between_clones() {
        let clock = MockClock::new(sunday_noon());
        let handle = clock.clone();

        handle.advance(Duration::hours(1));

        assert_eq!(clock.now_utc(), sunday_noon() + Duration::hours(1));
    }

    #[tokio::test]
    async fn test_arc_source_delegates() {
        let source = Arc::new(crate::events::StaticEventSource::new(vec![
            AccessEvent::at(sunday_noon()),
        ]));

        let events = source.fetch_events(TimeRange::all()).await.unwrap();

        assert_eq!(events.len(), 1);
    }
}
