//! Temporal sales velocity.
//!
//! Turns raw sales events into an average units-per-day rate per product.
//! Inventory is a point-in-time snapshot, so only events strictly after the
//! snapshot date may explain stock movement; older events are discarded
//! before any aggregation.

use std::collections::{BTreeSet, HashMap};

use chrono::{Duration, NaiveDate, Utc};

/// Default lookback window when the context does not override it.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;

/// One sales event referencing a snapshot product.
#[derive(Clone, Debug, PartialEq)]
pub struct SalesEvent {
    pub product_id: String,
    pub date: NaiveDate,
    pub units_sold: f64,
}

/// Compute average daily sales per product.
///
/// 1. Events dated on or before `as_of_date` are discarded.
/// 2. Events older than `reference − lookback_days` are discarded, where the
///    reference is the as-of date when present, else today.
/// 3. Per product: total units divided by the number of *distinct* calendar
///    dates, so several entries on one day do not inflate the denominator.
///
/// Products with no surviving events get no entry at all: absence, not zero.
pub fn compute_velocity(
    events: &[SalesEvent],
    as_of_date: Option<NaiveDate>,
    lookback_days: i64,
) -> HashMap<String, f64> {
    let reference_date = as_of_date.unwrap_or_else(|| Utc::now().date_naive());
    let cutoff = reference_date - Duration::days(lookback_days);

    let mut grouped: HashMap<&str, (f64, BTreeSet<NaiveDate>)> = HashMap::new();
    for event in events {
        if let Some(as_of) = as_of_date {
            if event.date <= as_of {
                continue;
            }
        }
        if event.date < cutoff {
            continue;
        }
        let entry = grouped
            .entry(event.product_id.as_str())
            .or_insert_with(|| (0.0, BTreeSet::new()));
        entry.0 += event.units_sold;
        entry.1.insert(event.date);
    }

    grouped
        .into_iter()
        .map(|(product_id, (total_units, dates))| {
            (product_id.to_string(), total_units / dates.len() as f64)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(product_id: &str, d: NaiveDate, units: f64) -> SalesEvent {
        SalesEvent {
            product_id: product_id.into(),
            date: d,
            units_sold: units,
        }
    }

    #[test]
    fn averages_over_distinct_dates_not_event_count() {
        let as_of = date(2024, 1, 1);
        let events = vec![
            event("P1", date(2024, 1, 2), 3.0),
            event("P1", date(2024, 1, 2), 2.0), // same day: one denominator day
            event("P1", date(2024, 1, 3), 5.0),
        ];
        let velocity = compute_velocity(&events, Some(as_of), DEFAULT_LOOKBACK_DAYS);
        // (3 + 2 + 5) / 2 distinct dates
        assert!((velocity["P1"] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn events_on_or_before_as_of_date_are_excluded() {
        let as_of = date(2024, 1, 1);
        let events = vec![
            event("P1", date(2023, 12, 31), 100.0),
            event("P1", date(2024, 1, 1), 100.0), // exactly the snapshot date
            event("P1", date(2024, 1, 2), 5.0),
        ];
        let velocity = compute_velocity(&events, Some(as_of), DEFAULT_LOOKBACK_DAYS);
        assert!((velocity["P1"] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn products_with_no_surviving_events_are_absent() {
        let as_of = date(2024, 1, 1);
        let events = vec![event("P1", date(2023, 6, 1), 50.0)];
        let velocity = compute_velocity(&events, Some(as_of), DEFAULT_LOOKBACK_DAYS);
        assert!(velocity.is_empty());
    }

    #[test]
    fn lookback_window_drops_stale_events() {
        // Without an as-of date the reference is today, so events far in the
        // past fall outside any reasonable lookback.
        let today = Utc::now().date_naive();
        let events = vec![
            event("P1", today - Duration::days(2), 4.0),
            event("P1", today - Duration::days(90), 400.0),
        ];
        let velocity = compute_velocity(&events, None, DEFAULT_LOOKBACK_DAYS);
        assert!((velocity["P1"] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn groups_by_product() {
        let as_of = date(2024, 1, 1);
        let events = vec![
            event("P1", date(2024, 1, 2), 10.0),
            event("P2", date(2024, 1, 2), 2.0),
            event("P2", date(2024, 1, 3), 4.0),
        ];
        let velocity = compute_velocity(&events, Some(as_of), DEFAULT_LOOKBACK_DAYS);
        assert!((velocity["P1"] - 10.0).abs() < 1e-9);
        assert!((velocity["P2"] - 3.0).abs() < 1e-9);
    }
}
