use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::models::ChangeRow;
use crate::error::Result;
use crate::types::MarketChange;

/// Persists the per-run change table (every merged row with deltas, before filtering).
#[derive(Clone)]
pub struct ChangeStore {
    pool: SqlitePool,
}

impl ChangeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace the previous run's contents with `changes`.
    pub async fn replace(&self, changes: &[MarketChange], run_at: DateTime<Utc>) -> Result<()> {
        let run_at = run_at.to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM market_changes").execute(&mut *tx).await?;

        for change in changes {
            let row = &change.row;
            let cur = &row.current;
            let d = &change.deltas;
            sqlx::query(
                r#"
                INSERT INTO market_changes (
                    run_at, market_id, event_slug, market_question, tags,
                    market_active, market_closed, event_end_date,
                    market_volume, market_volume_t0,
                    market_best_bid, market_best_bid_t0,
                    market_best_ask, market_best_ask_t0,
                    outcome_1, outcome_2, outcome_1_t0, outcome_2_t0,
                    outcome_1_change, outcome_2_change, best_bid_change, best_ask_change,
                    max_abs_change
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&run_at)
            .bind(&cur.market_id)
            .bind(&cur.event_slug)
            .bind(&cur.market_question)
            .bind(&cur.tags)
            .bind(cur.market_active)
            .bind(cur.market_closed)
            .bind(&cur.event_end_date)
            .bind(cur.market_volume)
            .bind(row.volume_t0())
            .bind(cur.market_best_bid)
            .bind(row.best_bid_t0())
            .bind(cur.market_best_ask)
            .bind(row.best_ask_t0())
            .bind(row.outcome_1())
            .bind(row.outcome_2())
            .bind(row.outcome_1_t0())
            .bind(row.outcome_2_t0())
            .bind(d.outcome_1_change)
            .bind(d.outcome_2_change)
            .bind(d.best_bid_change)
            .bind(d.best_ask_change)
            .bind(d.max_abs())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Latest run's rows whose largest absolute delta is at least `min_abs`,
    /// biggest movers first.
    pub async fn latest(&self, min_abs: f64, limit: i64) -> Result<Vec<ChangeRow>> {
        let rows = sqlx::query_as::<_, ChangeRow>(
            r#"
            SELECT run_at, market_id, event_slug, market_question, tags,
                   market_active, market_closed, event_end_date,
                   market_volume, market_volume_t0,
                   market_best_bid, market_best_bid_t0,
                   market_best_ask, market_best_ask_t0,
                   outcome_1, outcome_2, outcome_1_t0, outcome_2_t0,
                   outcome_1_change, outcome_2_change, best_bid_change, best_ask_change,
                   max_abs_change
            FROM market_changes
            WHERE max_abs_change >= ?
            ORDER BY max_abs_change DESC, seq ASC
            LIMIT ?
            "#,
        )
        .bind(min_abs)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
