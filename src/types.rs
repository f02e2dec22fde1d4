use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Snapshot rows
// ---------------------------------------------------------------------------

/// One market as captured in a snapshot. Event-level fields are repeated on
/// every market of the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRow {
    pub market_id: String,
    /// Comma-joined, sorted, de-duplicated tag slugs.
    pub tags: String,
    pub event_id: Option<String>,
    pub event_slug: String,
    pub event_title: Option<String>,
    pub event_creation_date: Option<String>,
    pub event_start_date: Option<String>,
    pub event_end_date: Option<String>,
    pub event_volume: Option<f64>,
    pub market_slug: Option<String>,
    pub market_question: String,
    pub market_start_date: Option<String>,
    pub market_end_date: Option<String>,
    pub market_volume: Option<f64>,
    pub market_outcomes: Option<String>,
    /// Raw outcome-price field: a native array or its textual encoding.
    pub market_outcome_prices: serde_json::Value,
    pub market_active: bool,
    pub market_closed: bool,
    pub market_best_bid: Option<f64>,
    pub market_best_ask: Option<f64>,
    /// Capture time, ISO-8601 seconds, UTC.
    pub created_at: String,
}

/// Textual form of a raw JSON field for storage. Strings are kept verbatim,
/// arrays and objects keep their JSON encoding.
pub fn raw_json_text(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl MarketRow {
    pub fn tag_slugs(&self) -> impl Iterator<Item = &str> {
        self.tags.split(',').filter(|t| !t.is_empty())
    }
}

/// Snapshot label: previous (t0) or current (t1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    T0,
    T1,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::T0 => "t0",
            Period::T1 => "t1",
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Derived per-row values
// ---------------------------------------------------------------------------

/// Two finite outcome prices. A row either has a full pair or none at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePair {
    pub outcome_1: f64,
    pub outcome_2: f64,
}

/// Previous-period (`_t0`) values carried onto a current row by the merger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PreviousPeriod {
    pub volume: Option<f64>,
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    pub prices: Option<PricePair>,
}

/// The four tracked deltas. Always finite after computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Deltas {
    pub outcome_1_change: f64,
    pub outcome_2_change: f64,
    pub best_bid_change: f64,
    pub best_ask_change: f64,
}

impl Deltas {
    pub fn channels(&self) -> [f64; 4] {
        [
            self.outcome_1_change,
            self.outcome_2_change,
            self.best_bid_change,
            self.best_ask_change,
        ]
    }

    /// Largest absolute move across all channels.
    pub fn max_abs(&self) -> f64 {
        self.channels().iter().fold(0.0_f64, |acc, d| acc.max(d.abs()))
    }

    pub fn any_at_least(&self, threshold: f64) -> bool {
        self.channels().iter().any(|d| d.abs() >= threshold)
    }
}

/// A current-period row joined with its previous-period (`_t0`) values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRow {
    pub current: MarketRow,
    pub prices: Option<PricePair>,
    /// `None` when the market did not exist in the previous snapshot.
    pub previous: Option<PreviousPeriod>,
    pub event_end: Option<DateTime<Utc>>,
}

/// A merged row with its deltas computed. One per current-snapshot market.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketChange {
    pub row: MergedRow,
    pub deltas: Deltas,
}

impl MarketChange {
    pub fn market_id(&self) -> &str {
        self.row.market_id()
    }
}

impl MergedRow {
    pub fn market_id(&self) -> &str {
        &self.current.market_id
    }

    pub fn outcome_1(&self) -> Option<f64> {
        self.prices.map(|p| p.outcome_1)
    }

    pub fn outcome_2(&self) -> Option<f64> {
        self.prices.map(|p| p.outcome_2)
    }

    pub fn volume_t0(&self) -> Option<f64> {
        self.previous.and_then(|p| p.volume)
    }

    pub fn best_bid_t0(&self) -> Option<f64> {
        self.previous.and_then(|p| p.best_bid)
    }

    pub fn best_ask_t0(&self) -> Option<f64> {
        self.previous.and_then(|p| p.best_ask)
    }

    pub fn outcome_1_t0(&self) -> Option<f64> {
        self.previous.and_then(|p| p.prices).map(|p| p.outcome_1)
    }

    pub fn outcome_2_t0(&self) -> Option<f64> {
        self.previous.and_then(|p| p.prices).map(|p| p.outcome_2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_abs_picks_largest_magnitude() {
        let d = Deltas {
            outcome_1_change: 0.1,
            outcome_2_change: -0.3,
            best_bid_change: 0.0,
            best_ask_change: 0.25,
        };
        assert!((d.max_abs() - 0.3).abs() < 1e-12);
        assert!(d.any_at_least(0.3));
        assert!(!d.any_at_least(0.31));
    }

    #[test]
    fn raw_json_text_keeps_strings_and_encodes_arrays() {
        use serde_json::json;
        assert_eq!(raw_json_text(&json!(null)), None);
        assert_eq!(raw_json_text(&json!("[\"0.4\", \"0.6\"]")).as_deref(), Some("[\"0.4\", \"0.6\"]"));
        assert_eq!(raw_json_text(&json!(["0.4", "0.6"])).as_deref(), Some("[\"0.4\",\"0.6\"]"));
    }

    #[test]
    fn zero_deltas_never_reach_a_positive_threshold() {
        assert!(!Deltas::default().any_at_least(0.2));
        assert_eq!(Deltas::default().max_abs(), 0.0);
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A live, untagged market with a textual price pair.
    pub fn market_row(id: &str, prices: &str) -> MarketRow {
        MarketRow {
            market_id: id.to_string(),
            tags: "politics".to_string(),
            event_id: Some(format!("ev-{id}")),
            event_slug: format!("event-{id}"),
            event_title: Some("Test event".to_string()),
            event_creation_date: None,
            event_start_date: Some("2025-01-01T00:00:00Z".to_string()),
            event_end_date: Some("2099-12-31T00:00:00Z".to_string()),
            event_volume: Some(2_500_000.0),
            market_slug: Some(format!("market-{id}")),
            market_question: format!("Will {id} happen?"),
            market_start_date: Some("2025-01-01T00:00:00Z".to_string()),
            market_end_date: Some("2099-12-31T00:00:00Z".to_string()),
            market_volume: Some(1_234_567.89),
            market_outcomes: Some(r#"["Yes", "No"]"#.to_string()),
            market_outcome_prices: serde_json::Value::String(prices.to_string()),
            market_active: true,
            market_closed: false,
            market_best_bid: Some(0.5),
            market_best_ask: Some(0.52),
            created_at: "2025-06-01T00:00:00".to_string(),
        }
    }
}
