use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::MarketChange;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub total: usize,
    pub rejected_excluded_tag: usize,
    pub rejected_inactive: usize,
    pub rejected_ended: usize,
    pub rejected_below_threshold: usize,
    pub alertable: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ExcludedTag,
    /// Closed, or not active.
    Inactive,
    /// Event end date has passed or could not be parsed.
    Ended,
    BelowThreshold,
}

/// Decides which changed markets are worth an alert.
#[derive(Debug, Clone)]
pub struct MarketFilter {
    exclude_tags: HashSet<String>,
    threshold: f64,
}

impl MarketFilter {
    pub fn new<I, S>(exclude_tags: I, threshold: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclude_tags: exclude_tags.into_iter().map(Into::into).collect(),
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Check a single row against every condition, in order.
    pub fn check(&self, change: &MarketChange, now: DateTime<Utc>) -> Result<(), Rejection> {
        let row = &change.row.current;
        if row.tag_slugs().any(|t| self.exclude_tags.contains(t)) {
            return Err(Rejection::ExcludedTag);
        }
        if row.market_closed || !row.market_active {
            return Err(Rejection::Inactive);
        }
        match change.row.event_end {
            Some(end) if end >= now => {}
            _ => return Err(Rejection::Ended),
        }
        if !change.deltas.any_at_least(self.threshold) {
            return Err(Rejection::BelowThreshold);
        }
        Ok(())
    }

    /// Keep alert-eligible rows in their original order.
    pub fn apply(&self, changes: &[MarketChange], now: DateTime<Utc>) -> (Vec<MarketChange>, FilterStats) {
        let mut stats = FilterStats {
            total: changes.len(),
            ..Default::default()
        };
        let mut kept = Vec::new();

        for change in changes {
            match self.check(change, now) {
                Ok(()) => kept.push(change.clone()),
                Err(Rejection::ExcludedTag) => stats.rejected_excluded_tag += 1,
                Err(Rejection::Inactive) => stats.rejected_inactive += 1,
                Err(Rejection::Ended) => stats.rejected_ended += 1,
                Err(Rejection::BelowThreshold) => stats.rejected_below_threshold += 1,
            }
        }

        stats.alertable = kept.len();
        (kept, stats)
    }
}
