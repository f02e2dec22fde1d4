//! Database row types for the snapshot and change tables.
//! Used by sqlx for typed queries.

use serde::Serialize;
use serde_json::Value;

use crate::types::MarketRow;

#[derive(Debug, sqlx::FromRow)]
pub struct SnapshotRow {
    pub market_id: String,
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
    pub market_outcome_prices: Option<String>,
    pub market_active: bool,
    pub market_closed: bool,
    pub market_best_bid: Option<f64>,
    pub market_best_ask: Option<f64>,
    pub created_at: String,
}

impl From<SnapshotRow> for MarketRow {
    /// The price field comes back in its textual encoding.
    fn from(r: SnapshotRow) -> Self {
        MarketRow {
            market_id: r.market_id,
            tags: r.tags,
            event_id: r.event_id,
            event_slug: r.event_slug,
            event_title: r.event_title,
            event_creation_date: r.event_creation_date,
            event_start_date: r.event_start_date,
            event_end_date: r.event_end_date,
            event_volume: r.event_volume,
            market_slug: r.market_slug,
            market_question: r.market_question,
            market_start_date: r.market_start_date,
            market_end_date: r.market_end_date,
            market_volume: r.market_volume,
            market_outcomes: r.market_outcomes,
            market_outcome_prices: r.market_outcome_prices.map(Value::String).unwrap_or(Value::Null),
            market_active: r.market_active,
            market_closed: r.market_closed,
            market_best_bid: r.market_best_bid,
            market_best_ask: r.market_best_ask,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChangeRow {
    pub run_at: String,
    pub market_id: String,
    pub event_slug: String,
    pub market_question: String,
    pub tags: String,
    pub market_active: bool,
    pub market_closed: bool,
    pub event_end_date: Option<String>,
    pub market_volume: Option<f64>,
    pub market_volume_t0: Option<f64>,
    pub market_best_bid: Option<f64>,
    pub market_best_bid_t0: Option<f64>,
    pub market_best_ask: Option<f64>,
    pub market_best_ask_t0: Option<f64>,
    pub outcome_1: Option<f64>,
    pub outcome_2: Option<f64>,
    pub outcome_1_t0: Option<f64>,
    pub outcome_2_t0: Option<f64>,
    pub outcome_1_change: f64,
    pub outcome_2_change: f64,
    pub best_bid_change: f64,
    pub best_ask_change: f64,
    pub max_abs_change: f64,
}
