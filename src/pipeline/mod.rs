//! Snapshot diff-and-alert pipeline.
//!
//! Store -> price normalization -> merge -> deltas -> filter -> format -> dispatch.
//! Rows are processed sequentially in current-snapshot order.

pub mod delta;
pub mod filter;
pub mod merger;
pub mod prices;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::alert::{dispatch_all, AlertFormatter, DispatchReport, Notifier};
use crate::config::Config;
use crate::db::{ChangeStore, SnapshotStore};
use crate::error::Result;
use crate::fetcher::{fetch_all_events, flatten_events};
use crate::types::{MarketChange, MarketRow, Period};

pub use filter::{FilterStats, MarketFilter};
pub use merger::MergeStats;

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub events: usize,
    pub rows: usize,
    pub promoted_previous: bool,
    /// False when the change table could not be written this run.
    pub changes_persisted: bool,
    pub merge: MergeStats,
    pub filter: FilterStats,
    pub dispatch: DispatchReport,
}

/// Merge current onto previous and compute deltas for every current row.
pub fn compute_changes(current: Vec<MarketRow>, previous: &[MarketRow]) -> (Vec<MarketChange>, MergeStats) {
    let (merged, stats) = merger::merge(current, previous);
    (delta::apply(merged), stats)
}

pub struct Pipeline {
    cfg: Config,
    snapshots: SnapshotStore,
    changes: ChangeStore,
    filter: MarketFilter,
    formatter: AlertFormatter,
    notifier: Box<dyn Notifier>,
}

impl Pipeline {
    pub fn new(cfg: Config, pool: SqlitePool, notifier: Box<dyn Notifier>) -> Self {
        Self {
            snapshots: SnapshotStore::new(pool.clone()),
            changes: ChangeStore::new(pool),
            filter: MarketFilter::new(cfg.exclude_tags.iter().cloned(), cfg.move_threshold),
            formatter: AlertFormatter::new(cfg.event_url_base.clone()),
            notifier,
            cfg,
        }
    }

    /// Fetch a fresh snapshot from the API and run it through the pipeline.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let now = Utc::now();
        let events = fetch_all_events(&self.cfg).await?;
        let rows = flatten_events(&events, now);
        info!(
            events = events.len(),
            rows = rows.len(),
            "[CYCLE] fetched {} events, {} market rows",
            events.len(),
            rows.len(),
        );

        let mut report = self.process(rows, now).await?;
        report.events = events.len();
        Ok(report)
    }

    /// Store `rows` as the current snapshot, diff against the previous one and
    /// alert on qualifying markets. `now` is the clock reading for the whole run.
    pub async fn process(&self, rows: Vec<MarketRow>, now: DateTime<Utc>) -> Result<CycleReport> {
        let rotation = match self.snapshots.rotate(&rows).await {
            Ok(rotation) => rotation,
            Err(e) => {
                error!(
                    rows = rows.len(),
                    "[SNAPSHOT] failed to store {} fetched rows, snapshot not updated: {e}",
                    rows.len(),
                );
                return Err(e);
            }
        };

        let previous = self.snapshots.load(Period::T0).await?;
        let current = self.snapshots.load(Period::T1).await?;

        let (changes, merge_stats) = compute_changes(current, &previous);
        info!(
            current = merge_stats.current,
            previous = merge_stats.previous,
            matched = merge_stats.matched,
            new_markets = merge_stats.new_markets,
            "[MERGE] {} current rows, {} matched, {} new",
            merge_stats.current,
            merge_stats.matched,
            merge_stats.new_markets,
        );

        // The rotation is already committed; alerts still go out if this write fails.
        let changes_persisted = match self.changes.replace(&changes, now).await {
            Ok(_) => true,
            Err(e) => {
                error!(changes = changes.len(), "[CHANGES] failed to write change table: {e}");
                false
            }
        };

        let (alertable, filter_stats) = self.filter.apply(&changes, now);
        info!(
            "[FILTER] {} alertable of {} | rejected: excluded_tag={} inactive={} ended={} below_threshold={} (threshold={})",
            filter_stats.alertable,
            filter_stats.total,
            filter_stats.rejected_excluded_tag,
            filter_stats.rejected_inactive,
            filter_stats.rejected_ended,
            filter_stats.rejected_below_threshold,
            self.filter.threshold(),
        );

        let dispatch = dispatch_all(&alertable, &self.formatter, self.notifier.as_ref()).await;
        info!(
            sent = dispatch.sent,
            failed = dispatch.failed,
            "[ALERT] {} sent, {} failed",
            dispatch.sent,
            dispatch.failed,
        );

        Ok(CycleReport {
            started_at: now,
            events: 0,
            rows: rows.len(),
            promoted_previous: rotation.promoted,
            changes_persisted,
            merge: merge_stats,
            filter: filter_stats,
            dispatch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::memory_pool;
    use crate::error::Result as AppResult;
    use crate::types::fixtures::market_row;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl Notifier for Sink {
        async fn send(&self, text: &str) -> AppResult<()> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "sink"
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    async fn pipeline(sink: Sink) -> Pipeline {
        pipeline_on(memory_pool().await.unwrap(), sink)
    }

    fn pipeline_on(pool: SqlitePool, sink: Sink) -> Pipeline {
        let cfg = Config::from_lookup(|_| None).unwrap();
        Pipeline::new(cfg, pool, Box::new(sink))
    }

    #[tokio::test]
    async fn first_run_never_alerts() {
        let sink = Sink::default();
        let p = pipeline(sink.clone()).await;
        let report = p.process(vec![market_row("m", "[0.65, 0.35]")], now()).await.unwrap();
        assert!(!report.promoted_previous);
        assert_eq!(report.merge.new_markets, 1);
        assert_eq!(report.dispatch.sent, 0);
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_run_alerts_on_material_moves_only() {
        let sink = Sink::default();
        let p = pipeline(sink.clone()).await;

        let mut sport = market_row("sport", "[0.40, 0.60]");
        sport.tags = "nba,politics".to_string();
        p.process(
            vec![
                market_row("mover", "[\"0.40\", \"0.60\"]"),
                market_row("steady", "[0.50, 0.50]"),
                sport.clone(),
            ],
            now(),
        )
        .await
        .unwrap();

        let mut sport_now = market_row("sport", "[0.90, 0.10]");
        sport_now.tags = sport.tags.clone();
        let report = p
            .process(
                vec![
                    market_row("mover", "[\"0.65\", \"0.35\"]"),
                    market_row("steady", "[0.52, 0.48]"),
                    sport_now,
                    market_row("fresh", "[0.99, 0.01]"),
                ],
                now(),
            )
            .await
            .unwrap();

        assert!(report.promoted_previous);
        assert_eq!(report.merge.matched, 3);
        assert_eq!(report.merge.new_markets, 1);
        assert_eq!(report.filter.alertable, 1);
        assert_eq!(report.filter.rejected_excluded_tag, 1);
        assert_eq!(report.filter.rejected_below_threshold, 2);
        assert_eq!(report.dispatch.sent, 1);

        let sent = sink.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Will mover happen?"));
        assert!(sent[0].contains("Price went up by 25.00 percentage points"));
    }

    #[tokio::test]
    async fn failed_snapshot_write_is_an_error() {
        let pool = memory_pool().await.unwrap();
        let p = pipeline_on(pool.clone(), Sink::default());
        pool.close().await;
        assert!(p.process(vec![market_row("m", "[0.5, 0.5]")], now()).await.is_err());
    }

    #[tokio::test]
    async fn failed_change_write_still_alerts() {
        let sink = Sink::default();
        let pool = memory_pool().await.unwrap();
        let p = pipeline_on(pool.clone(), sink.clone());

        let first = p.process(vec![market_row("m", "[0.40, 0.60]")], now()).await.unwrap();
        assert!(first.changes_persisted);

        sqlx::query("DROP TABLE market_changes").execute(&pool).await.unwrap();
        let report = p.process(vec![market_row("m", "[0.65, 0.35]")], now()).await.unwrap();

        assert!(!report.changes_persisted);
        assert!(report.promoted_previous);
        assert_eq!(report.dispatch.sent, 1);
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn compute_changes_keeps_cardinality() {
        let (changes, stats) = compute_changes(
            vec![market_row("a", "[0.5, 0.5]"), market_row("b", "[0.5, 0.5]")],
            &[market_row("a", "[0.5, 0.5]"), market_row("a", "[0.1, 0.9]")],
        );
        assert_eq!(changes.len(), 2);
        assert_eq!(stats.duplicate_previous_keys, 1);
        assert_eq!(changes[0].deltas, Default::default());
    }
}
