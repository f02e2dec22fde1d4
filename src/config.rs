use std::str::FromStr;

use crate::error::{AppError, Result};

pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";
pub const EVENT_URL_BASE: &str = "https://polymarket.com/event";

/// Minimum absolute delta (probability units) for a market to be alert-eligible.
pub const DEFAULT_MOVE_THRESHOLD: f64 = 0.2;

/// Events below this lifetime volume (USD) are not requested from the API.
pub const DEFAULT_MIN_EVENT_VOLUME: f64 = 1_000_000.0;

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Pagination stops once the offset reaches this value.
pub const DEFAULT_MAX_OFFSET: usize = 600;

/// Pause between event pages (seconds).
pub const DEFAULT_PAGE_DELAY_SECS: u64 = 5;

/// Interval between cycles in service mode (seconds).
pub const DEFAULT_RUN_INTERVAL_SECS: u64 = 900;

/// Sport-related tag slugs excluded from alerting.
pub const DEFAULT_EXCLUDE_TAGS: &[&str] = &[
    "nba",
    "nba-champion",
    "nba-finals",
    "ncaa-football",
    "soccer",
    "hockey",
    "football",
    "champions-league",
    "2026-fifa-world-cup",
    "sports",
    "nfl",
];

/// Telegram bot credentials. Absent when no token is configured.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gamma_api_url: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Run a single cycle and exit (RUN_ONCE)
    pub run_once: bool,
    pub run_interval_secs: u64,
    /// `volume_min` sent to /events (MIN_EVENT_VOLUME)
    pub min_event_volume: f64,
    pub page_size: usize,
    pub max_offset: usize,
    pub page_delay_secs: u64,
    /// Materiality threshold applied to all four delta channels (MOVE_THRESHOLD)
    pub move_threshold: f64,
    /// Tag slugs that unconditionally exclude a market (EXCLUDE_TAGS, comma-separated)
    pub exclude_tags: Vec<String>,
    pub telegram: Option<TelegramConfig>,
    pub event_url_base: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup so tests don't touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let telegram = match lookup("TELEGRAM_TOKEN").filter(|t| !t.trim().is_empty()) {
            Some(token) => {
                let chat_id = lookup("GROUP_CHAT_ID")
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| {
                        AppError::Config("GROUP_CHAT_ID must be set when TELEGRAM_TOKEN is".to_string())
                    })?;
                Some(TelegramConfig {
                    token,
                    chat_id,
                    api_url: lookup("TELEGRAM_API_URL").unwrap_or_else(|| TELEGRAM_API_URL.to_string()),
                })
            }
            None => None,
        };

        let exclude_tags = match lookup("EXCLUDE_TAGS") {
            Some(raw) => split_csv(&raw),
            None => DEFAULT_EXCLUDE_TAGS.iter().map(|s| s.to_string()).collect(),
        };

        let move_threshold: f64 = parse_or(&lookup, "MOVE_THRESHOLD", DEFAULT_MOVE_THRESHOLD)?;
        if !move_threshold.is_finite() || move_threshold < 0.0 {
            return Err(AppError::Config(
                "MOVE_THRESHOLD must be a non-negative number".to_string(),
            ));
        }

        let page_size: usize = parse_or(&lookup, "FETCH_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(AppError::Config("FETCH_PAGE_SIZE must be positive".to_string()));
        }

        Ok(Self {
            gamma_api_url: lookup("GAMMA_API_URL").unwrap_or_else(|| GAMMA_API_URL.to_string()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            db_path: lookup("DB_PATH").unwrap_or_else(|| "mover.db".to_string()),
            api_port: parse_or(&lookup, "API_PORT", 3000u16)?,
            run_once: parse_or(&lookup, "RUN_ONCE", false)?,
            run_interval_secs: parse_or(&lookup, "RUN_INTERVAL_SECS", DEFAULT_RUN_INTERVAL_SECS)?,
            min_event_volume: parse_or(&lookup, "MIN_EVENT_VOLUME", DEFAULT_MIN_EVENT_VOLUME)?,
            page_size,
            max_offset: parse_or(&lookup, "FETCH_MAX_OFFSET", DEFAULT_MAX_OFFSET)?,
            page_delay_secs: parse_or(&lookup, "FETCH_PAGE_DELAY_SECS", DEFAULT_PAGE_DELAY_SECS)?,
            move_threshold,
            exclude_tags,
            telegram,
            event_url_base: lookup("EVENT_URL_BASE")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|| EVENT_URL_BASE.to_string()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw:?}"))),
        _ => Ok(default),
    }
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
