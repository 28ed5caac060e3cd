//! Feature extraction for congestion models
//!
//! Aggregates raw access events into one occupancy count per
//! (weekday, hour-of-day) slot. Weekdays are numbered from Sunday (0) to
//! Saturday (6).

use std::collections::BTreeMap;

use chrono::{Datelike, Local, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use crate::events::AccessEvent;

pub const HOURS_PER_DAY: u32 = 24;
pub const DAYS_PER_WEEK: u32 = 7;

/// Aggregated event count for a single (weekday, hour) slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRow {
    /// Day of week (0=Sunday, 6=Saturday)
    pub weekday: u32,
    /// Hour of day (0-23)
    pub hour_slot: u32,
    pub count: u64,
}

impl FeatureRow {
    /// Numeric encoding fed to the regression model
    pub fn x(&self) -> f64 {
        slot_index(self.weekday, self.hour_slot)
    }
}

/// Encode a weekday/hour pair as `weekday * 24 + hour_slot`.
pub fn slot_index(weekday: u32, hour_slot: u32) -> f64 {
    f64::from(weekday * HOURS_PER_DAY + hour_slot)
}

/// Aggregate events using the host's local timezone.
pub fn extract_features(events: &[AccessEvent]) -> Vec<FeatureRow> {
    extract_features_in(events, &Local)
}

/// Aggregate events by their day-of-week and hour in `tz`.
///
/// Events without a parseable timestamp are skipped. Rows come back sorted
/// by (weekday, hour_slot) with at most one row per slot.
pub fn extract_features_in<Tz: TimeZone>(events: &[AccessEvent], tz: &Tz) -> Vec<FeatureRow> {
    let mut buckets: BTreeMap<(u32, u32), u64> = BTreeMap::new();

    for event in events {
        let Some(timestamp) = event.datetime() else {
            continue;
        };

        let local = timestamp.with_timezone(tz);
        let key = (local.weekday().num_days_from_sunday(), local.hour());
        *buckets.entry(key).or_default() += 1;
    }

    buckets
        .into_iter()
        .map(|((weekday, hour_slot), count)| FeatureRow {
            weekday,
            hour_slot,
            count,
        })
        .collect()
}

/// Get the full name of a weekday (0=Sunday).
pub fn weekday_name(weekday: u32) -> &'static str {
    match weekday {
        0 => "Sunday",
        1 => "Monday",
        2 => "Tuesday",
        3 => "Wednesday",
        4 => "Thursday",
        5 => "Friday",
        6 => "Saturday",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Utc};

    use super::*;

    fn event_at(timestamp: &str) -> AccessEvent {
        AccessEvent {
            timestamp: Some(timestamp.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_input_yields_no_rows() {
        assert!(extract_features_in(&[], &Utc).is_empty());
    }

    #[test]
    fn test_counts_events_per_slot() {
        // 2024-06-17 is a Monday
        let events = vec![
            event_at("2024-06-17T08:00:00Z"),
            event_at("2024-06-17T08:15:00Z"),
            event_at("2024-06-17T08:59:59Z"),
            event_at("2024-06-18T09:00:00Z"),
        ];

        let rows = extract_features_in(&events, &Utc);

        assert_eq!(
            rows,
            vec![
                FeatureRow {
                    weekday: 1,
                    hour_slot: 8,
                    count: 3
                },
                FeatureRow {
                    weekday: 2,
                    hour_slot: 9,
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_rows_sorted_by_weekday_then_hour() {
        let events = vec![
            event_at("2024-06-22T10:00:00Z"), // Saturday
            event_at("2024-06-16T23:00:00Z"), // Sunday
            event_at("2024-06-17T07:00:00Z"), // Monday
            event_at("2024-06-16T01:00:00Z"), // Sunday
        ];

        let rows = extract_features_in(&events, &Utc);
        let slots: Vec<(u32, u32)> = rows.iter().map(|r| (r.weekday, r.hour_slot)).collect();

        assert_eq!(slots, vec![(0, 1), (0, 23), (1, 7), (6, 10)]);
    }

    #[test]
    fn test_skips_events_without_timestamp() {
        let events = vec![
            AccessEvent::default(),
            event_at("not a timestamp"),
            event_at("2024-06-17T08:00:00Z"),
        ];

        let rows = extract_features_in(&events, &Utc);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 1);
    }

    #[test]
    fn test_uses_supplied_timezone() {
        // 23:30 UTC on Monday is 01:30 Tuesday at UTC+2
        let events = vec![event_at("2024-06-17T23:30:00Z")];
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();

        let rows = extract_features_in(&events, &tz);

        assert_eq!(rows[0].weekday, 2);
        assert_eq!(rows[0].hour_slot, 1);
    }

    #[test]
    fn test_slot_index_encoding() {
        assert_eq!(slot_index(0, 0), 0.0);
        assert_eq!(slot_index(1, 8), 32.0);
        assert_eq!(slot_index(6, 23), 167.0);

        let row = FeatureRow {
            weekday: 2,
            hour_slot: 9,
            count: 4,
        };
        assert_eq!(row.x(), 57.0);
    }

    #[test]
    fn test_weekday_names_start_on_sunday() {
        assert_eq!(weekday_name(0), "Sunday");
        assert_eq!(weekday_name(1), "Monday");
        assert_eq!(weekday_name(6), "Saturday");
        assert_eq!(weekday_name(9), "Unknown");
    }

    // ==================== Property-Based Tests ====================

    mod proptest_tests {
        use chrono::{TimeZone, Utc};
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn rows_sorted_unique_and_complete(
                offsets in prop::collection::vec(0i64..(60 * 24 * 28), 0..100)
            ) {
                let base = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap();
                let events: Vec<AccessEvent> = offsets
                    .iter()
                    .map(|&minutes| AccessEvent::at(base + chrono::Duration::minutes(minutes)))
                    .collect();

                let rows = extract_features_in(&events, &Utc);

                prop_assert!(rows
                    .windows(2)
                    .all(|w| (w[0].weekday, w[0].hour_slot) < (w[1].weekday, w[1].hour_slot)));
                prop_assert!(rows.iter().all(|r| r.weekday < DAYS_PER_WEEK && r.hour_slot < HOURS_PER_DAY));
                prop_assert_eq!(rows.iter().map(|r| r.count).sum::<u64>(), events.len() as u64);
            }
        }
    }
}
