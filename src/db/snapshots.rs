use sqlx::SqlitePool;
use tracing::info;

use super::models::SnapshotRow;
use crate::error::Result;
use crate::types::{raw_json_text, MarketRow, Period};

/// Outcome of a snapshot rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    /// True when an existing t1 snapshot was relabelled as t0.
    pub promoted: bool,
    pub inserted: usize,
}

/// Holds the previous (t0) and current (t1) snapshots in SQLite.
#[derive(Clone)]
pub struct SnapshotStore {
    pool: SqlitePool,
}

impl SnapshotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Promote the current snapshot to previous and store `rows` as current,
    /// atomically. Without an existing t1, t0 is left untouched.
    pub async fn rotate(&self, rows: &[MarketRow]) -> Result<Rotation> {
        let mut tx = self.pool.begin().await?;

        let (t1_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM snapshot_markets WHERE period = 't1'")
                .fetch_one(&mut *tx)
                .await?;

        let promoted = t1_count > 0;
        if promoted {
            sqlx::query("DELETE FROM snapshot_markets WHERE period = 't0'")
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE snapshot_markets SET period = 't0' WHERE period = 't1'")
                .execute(&mut *tx)
                .await?;
        }

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO snapshot_markets (
                    period, market_id, tags,
                    event_id, event_slug, event_title, event_creation_date,
                    event_start_date, event_end_date, event_volume,
                    market_slug, market_question, market_start_date, market_end_date,
                    market_volume, market_outcomes, market_outcome_prices,
                    market_active, market_closed, market_best_bid, market_best_ask,
                    created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Period::T1.as_str())
            .bind(&row.market_id)
            .bind(&row.tags)
            .bind(&row.event_id)
            .bind(&row.event_slug)
            .bind(&row.event_title)
            .bind(&row.event_creation_date)
            .bind(&row.event_start_date)
            .bind(&row.event_end_date)
            .bind(row.event_volume)
            .bind(&row.market_slug)
            .bind(&row.market_question)
            .bind(&row.market_start_date)
            .bind(&row.market_end_date)
            .bind(row.market_volume)
            .bind(&row.market_outcomes)
            .bind(raw_json_text(&row.market_outcome_prices))
            .bind(row.market_active)
            .bind(row.market_closed)
            .bind(row.market_best_bid)
            .bind(row.market_best_ask)
            .bind(&row.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            promoted,
            inserted = rows.len(),
            "[SNAPSHOT] rotated: previous t1 {}, stored {} rows as t1",
            if promoted { "promoted to t0" } else { "absent, t0 kept" },
            rows.len(),
        );

        Ok(Rotation {
            promoted,
            inserted: rows.len(),
        })
    }

    /// Rows of one snapshot in insertion order.
    pub async fn load(&self, period: Period) -> Result<Vec<MarketRow>> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            r#"
            SELECT market_id, tags,
                   event_id, event_slug, event_title, event_creation_date,
                   event_start_date, event_end_date, event_volume,
                   market_slug, market_question, market_start_date, market_end_date,
                   market_volume, market_outcomes, market_outcome_prices,
                   market_active, market_closed, market_best_bid, market_best_ask,
                   created_at
            FROM snapshot_markets
            WHERE period = ?
            ORDER BY seq
            "#,
        )
        .bind(period.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MarketRow::from).collect())
    }

    pub async fn count(&self, period: Period) -> Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM snapshot_markets WHERE period = ?")
            .bind(period.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::pipeline::prices::normalize;
    use crate::types::fixtures::market_row;
    use serde_json::json;

    #[tokio::test]
    async fn first_rotation_only_fills_t1() {
        let store = SnapshotStore::new(memory_pool().await.unwrap());
        let r = store.rotate(&[market_row("a", "[0.1, 0.9]")]).await.unwrap();
        assert_eq!(r, Rotation { promoted: false, inserted: 1 });
        assert_eq!(store.count(Period::T0).await.unwrap(), 0);
        assert_eq!(store.count(Period::T1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn second_rotation_promotes_and_replaces() {
        let store = SnapshotStore::new(memory_pool().await.unwrap());
        store
            .rotate(&[market_row("a", "[0.1, 0.9]"), market_row("b", "[0.2, 0.8]")])
            .await
            .unwrap();
        store.rotate(&[market_row("c", "[0.3, 0.7]")]).await.unwrap();
        let r = store.rotate(&[market_row("d", "[0.4, 0.6]")]).await.unwrap();
        assert!(r.promoted);

        let t0 = store.load(Period::T0).await.unwrap();
        let t1 = store.load(Period::T1).await.unwrap();
        assert_eq!(t0.iter().map(|r| r.market_id.as_str()).collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(t1.iter().map(|r| r.market_id.as_str()).collect::<Vec<_>>(), vec!["d"]);
    }

    #[tokio::test]
    async fn rows_round_trip() {
        let store = SnapshotStore::new(memory_pool().await.unwrap());
        let mut native = market_row("n", "");
        native.market_outcome_prices = json!(["0.1234", "0.8766"]);
        native.market_best_bid = None;
        native.market_closed = true;
        let text = market_row("t", "[\"0.6543\", \"0.3457\"]");
        store.rotate(&[native.clone(), text.clone()]).await.unwrap();

        let loaded = store.load(Period::T1).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1], text);
        assert_eq!(loaded[0].market_best_bid, None);
        assert!(loaded[0].market_closed);
        assert_eq!(loaded[0].market_volume, native.market_volume);
        assert_eq!(normalize(&loaded[0].market_outcome_prices), normalize(&native.market_outcome_prices));
    }
}
