use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::types::{raw_json_text, MarketRow};

// ---------------------------------------------------------------------------
// Gamma /events payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct GammaEvent {
    #[serde(default, deserialize_with = "de_string_opt")]
    pub id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "creationDate", default)]
    pub creation_date: Option<String>,
    #[serde(rename = "startDate", default)]
    pub start_date: Option<String>,
    #[serde(rename = "endDate", default)]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "de_f64_opt")]
    pub volume: Option<f64>,
    #[serde(default, deserialize_with = "de_tag_slugs")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "de_vec_or_null")]
    pub markets: Vec<GammaMarket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GammaMarket {
    #[serde(default, deserialize_with = "de_string_opt")]
    pub id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(rename = "startDate", default)]
    pub start_date: Option<String>,
    #[serde(rename = "endDate", default)]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "de_f64_opt")]
    pub volume: Option<f64>,
    /// Usually a JSON-encoded string, occasionally a native array.
    #[serde(default)]
    pub outcomes: Value,
    #[serde(rename = "outcomePrices", default)]
    pub outcome_prices: Value,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub closed: Option<bool>,
    #[serde(rename = "bestBid", default, deserialize_with = "de_f64_opt")]
    pub best_bid: Option<f64>,
    #[serde(rename = "bestAsk", default, deserialize_with = "de_f64_opt")]
    pub best_ask: Option<f64>,
    #[serde(default, deserialize_with = "de_tag_slugs")]
    pub tags: Vec<String>,
}

fn de_string_opt<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn de_f64_opt<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// Keeps the `slug` of every tag object that has one.
fn de_tag_slugs<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .iter()
            .filter_map(|t| t.get("slug").and_then(|s| s.as_str()))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    })
}

fn de_vec_or_null<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// Page through active, open events above the configured volume floor.
/// Stops at an empty page or once the offset reaches `max_offset`.
pub async fn fetch_all_events(cfg: &Config) -> Result<Vec<GammaEvent>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let mut events = Vec::new();
    let mut skipped = 0usize;
    let mut offset = 0usize;

    while offset < cfg.max_offset {
        let url = format!(
            "{}/events?limit={}&offset={}&volume_min={}&active=true&closed=false",
            cfg.gamma_api_url, cfg.page_size, offset, cfg.min_event_volume
        );
        info!("[FETCH] offset={offset}");

        let resp: Value = client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let items = match resp {
            Value::Array(items) => items,
            _ => {
                return Err(AppError::Fetch(
                    "GAMMA /events response was not an array".to_string(),
                ))
            }
        };

        if items.is_empty() {
            break;
        }

        for item in items {
            match serde_json::from_value::<GammaEvent>(item) {
                Ok(event) => events.push(event),
                Err(e) => {
                    skipped += 1;
                    debug!("[FETCH] skipping malformed event: {e}");
                }
            }
        }

        offset += cfg.page_size;
        if offset < cfg.max_offset && cfg.page_delay_secs > 0 {
            tokio::time::sleep(Duration::from_secs(cfg.page_delay_secs)).await;
        }
    }

    if skipped > 0 {
        warn!(skipped, "[FETCH] {skipped} events could not be parsed");
    }
    Ok(events)
}

// ---------------------------------------------------------------------------
// Flatten
// ---------------------------------------------------------------------------

/// One row per (event, market). Tags are the sorted union of event and market tags.
/// Markets without an id are dropped.
pub fn flatten_events(events: &[GammaEvent], captured_at: DateTime<Utc>) -> Vec<MarketRow> {
    let created_at = captured_at.format("%Y-%m-%dT%H:%M:%S").to_string();
    let mut rows = Vec::new();
    let mut missing_id = 0usize;

    for event in events {
        for market in &event.markets {
            let Some(market_id) = market.id.clone() else {
                missing_id += 1;
                continue;
            };

            let tags: BTreeSet<&str> = event
                .tags
                .iter()
                .chain(market.tags.iter())
                .map(String::as_str)
                .collect();

            rows.push(MarketRow {
                market_id,
                tags: tags.into_iter().collect::<Vec<_>>().join(","),
                event_id: event.id.clone(),
                event_slug: event.slug.clone().unwrap_or_default(),
                event_title: event.title.clone(),
                event_creation_date: event.creation_date.clone(),
                event_start_date: event.start_date.clone(),
                event_end_date: event.end_date.clone(),
                event_volume: event.volume,
                market_slug: market.slug.clone(),
                market_question: market.question.clone().unwrap_or_default(),
                market_start_date: market.start_date.clone(),
                market_end_date: market.end_date.clone(),
                market_volume: market.volume,
                market_outcomes: raw_json_text(&market.outcomes),
                market_outcome_prices: market.outcome_prices.clone(),
                // Unknown lifecycle flags are treated as not alertable.
                market_active: market.active.unwrap_or(false),
                market_closed: market.closed.unwrap_or(true),
                market_best_bid: market.best_bid,
                market_best_ask: market.best_ask,
                created_at: created_at.clone(),
            });
        }
    }

    if missing_id > 0 {
        warn!(missing_id, "[FLATTEN] dropped {missing_id} markets without an id");
    }
    rows
}
