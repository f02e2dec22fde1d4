use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::prices::normalize;
use crate::types::{MarketRow, MergedRow, PreviousPeriod};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub current: usize,
    pub previous: usize,
    pub matched: usize,
    pub new_markets: usize,
    /// Previous-snapshot rows skipped because their market_id was already seen.
    pub duplicate_previous_keys: usize,
}

/// Left-join current rows onto previous rows by `market_id`.
///
/// Every current row appears exactly once, in input order. When a market id
/// repeats in `previous`, the first occurrence wins.
pub fn merge(current: Vec<MarketRow>, previous: &[MarketRow]) -> (Vec<MergedRow>, MergeStats) {
    let mut stats = MergeStats {
        current: current.len(),
        previous: previous.len(),
        ..Default::default()
    };

    let mut carried: HashMap<&str, PreviousPeriod> = HashMap::with_capacity(previous.len());
    let mut duplicate_sample: Vec<&str> = Vec::new();
    for row in previous {
        match carried.entry(row.market_id.as_str()) {
            Entry::Occupied(_) => {
                stats.duplicate_previous_keys += 1;
                if duplicate_sample.len() < 5 {
                    duplicate_sample.push(&row.market_id);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(PreviousPeriod {
                    volume: row.market_volume,
                    best_bid: row.market_best_bid,
                    best_ask: row.market_best_ask,
                    prices: normalize(&row.market_outcome_prices),
                });
            }
        }
    }

    if stats.duplicate_previous_keys > 0 {
        warn!(
            duplicates = stats.duplicate_previous_keys,
            "[MERGE] previous snapshot has duplicate market ids, first occurrence wins: {duplicate_sample:?}"
        );
    }

    let merged: Vec<MergedRow> = current
        .into_iter()
        .map(|row| {
            let previous = carried.get(row.market_id.as_str()).copied();
            if previous.is_some() {
                stats.matched += 1;
            } else {
                stats.new_markets += 1;
            }
            MergedRow {
                prices: normalize(&row.market_outcome_prices),
                event_end: row.event_end_date.as_deref().and_then(parse_timestamp),
                previous,
                current: row,
            }
        })
        .collect();

    (merged, stats)
}

/// Parse an API or snapshot timestamp as UTC. Naive values are taken as UTC;
/// a bare date means midnight.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::market_row;
    use chrono::{Datelike, TimeZone};

    #[test]
    fn matched_row_carries_previous_fields() {
        let mut prev = market_row("m1", "[\"0.40\", \"0.60\"]");
        prev.market_volume = Some(900.0);
        prev.market_best_bid = Some(0.39);
        prev.market_best_ask = Some(0.41);
        let cur = market_row("m1", "[\"0.65\", \"0.35\"]");

        let (merged, stats) = merge(vec![cur], &[prev]);
        assert_eq!(merged.len(), 1);
        let row = &merged[0];
        assert_eq!(row.outcome_1(), Some(0.65));
        assert_eq!(row.outcome_1_t0(), Some(0.40));
        assert_eq!(row.outcome_2_t0(), Some(0.60));
        assert_eq!(row.volume_t0(), Some(900.0));
        assert_eq!(row.best_bid_t0(), Some(0.39));
        assert_eq!(row.best_ask_t0(), Some(0.41));
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.new_markets, 0);
    }

    #[test]
    fn new_market_has_no_previous_fields() {
        let (merged, stats) = merge(vec![market_row("new", "[\"0.65\", \"0.35\"]")], &[]);
        assert!(merged[0].previous.is_none());
        assert_eq!(merged[0].outcome_1_t0(), None);
        assert_eq!(merged[0].best_bid_t0(), None);
        assert_eq!(stats.new_markets, 1);
    }

    #[test]
    fn cardinality_follows_current_snapshot() {
        let current = vec![
            market_row("a", "[0.1, 0.9]"),
            market_row("b", "[0.2, 0.8]"),
            market_row("c", "[0.3, 0.7]"),
        ];
        let previous = vec![
            market_row("b", "[0.5, 0.5]"),
            market_row("z", "[0.5, 0.5]"),
            market_row("b", "[0.6, 0.4]"),
        ];
        let (merged, stats) = merge(current, &previous);
        assert_eq!(merged.len(), 3);
        let ids: Vec<&str> = merged.iter().map(|r| r.market_id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.new_markets, 2);
        assert_eq!(stats.duplicate_previous_keys, 1);
    }

    #[test]
    fn duplicate_previous_keys_first_wins() {
        let previous = vec![market_row("b", "[0.5, 0.5]"), market_row("b", "[0.6, 0.4]")];
        let (merged, _) = merge(vec![market_row("b", "[0.7, 0.3]")], &previous);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].outcome_1_t0(), Some(0.5));
    }

    #[test]
    fn malformed_previous_prices_stay_undefined() {
        let (merged, _) = merge(
            vec![market_row("m", "[0.7, 0.3]")],
            &[market_row("m", "garbage")],
        );
        assert!(merged[0].previous.is_some());
        assert_eq!(merged[0].outcome_1_t0(), None);
        assert_eq!(merged[0].outcome_2_t0(), None);
    }

    #[test]
    fn end_dates_are_parsed() {
        let (merged, _) = merge(vec![market_row("m", "[0.7, 0.3]")], &[]);
        assert_eq!(merged[0].event_end.map(|d| d.year()), Some(2099));
    }

    #[test]
    fn timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 11, 4, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-11-04T12:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-04T12:00:00.000Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-04T14:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-04 12:00:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-04T12:00:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2025-11-04"),
            Some(Utc.with_ymd_and_hms(2025, 11, 4, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("soon"), None);
    }
}
