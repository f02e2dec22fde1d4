use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::health::HealthState;
use crate::db::models::ChangeRow;
use crate::db::{ChangeStore, SnapshotStore};
use crate::error::AppError;
use crate::pipeline::CycleReport;
use crate::types::Period;

#[derive(Clone)]
pub struct ApiState {
    pub snapshots: SnapshotStore,
    pub changes: ChangeStore,
    pub health: Arc<HealthState>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/changes", get(get_changes))
        .route("/snapshots/summary", get(get_snapshot_summary))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ChangesQuery {
    pub min_abs: Option<f64>,
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cycles_ok: u64,
    pub cycles_failed: u64,
    pub last_cycle_at: Option<String>,
    pub last_report: Option<CycleReport>,
    pub last_error: Option<String>,
}

#[derive(Serialize)]
pub struct SnapshotSummary {
    pub t0_rows: i64,
    pub t1_rows: i64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let last_report = state.health.last_report();
    Json(HealthResponse {
        status: "ok",
        cycles_ok: state.health.cycles_ok(),
        cycles_failed: state.health.cycles_failed(),
        last_cycle_at: last_report.as_ref().map(|r| r.started_at.to_rfc3339()),
        last_report,
        last_error: state.health.last_error(),
    })
}

async fn get_changes(
    State(state): State<ApiState>,
    Query(params): Query<ChangesQuery>,
) -> Result<Json<Vec<ChangeRow>>, AppError> {
    let min_abs = params.min_abs.unwrap_or(0.0);
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);
    let rows = state.changes.latest(min_abs, limit).await?;
    Ok(Json(rows))
}

async fn get_snapshot_summary(
    State(state): State<ApiState>,
) -> Result<Json<SnapshotSummary>, AppError> {
    Ok(Json(SnapshotSummary {
        t0_rows: state.snapshots.count(Period::T0).await?,
        t1_rows: state.snapshots.count(Period::T1).await?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::pipeline::compute_changes;
    use crate::types::fixtures::market_row;
    use chrono::Utc;

    async fn state() -> ApiState {
        let pool = memory_pool().await.unwrap();
        ApiState {
            snapshots: SnapshotStore::new(pool.clone()),
            changes: ChangeStore::new(pool),
            health: Arc::new(HealthState::new()),
        }
    }

    #[tokio::test]
    async fn health_before_first_cycle() {
        let Json(body) = get_health(State(state().await)).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.cycles_ok, 0);
        assert!(body.last_cycle_at.is_none());
    }

    #[tokio::test]
    async fn changes_are_filtered_and_limited() {
        let st = state().await;
        let (changes, _) = compute_changes(
            vec![market_row("a", "[0.9, 0.1]"), market_row("b", "[0.55, 0.45]")],
            &[market_row("a", "[0.5, 0.5]"), market_row("b", "[0.5, 0.5]")],
        );
        st.changes.replace(&changes, Utc::now()).await.unwrap();

        let Json(rows) = get_changes(
            State(st.clone()),
            Query(ChangesQuery { min_abs: Some(0.2), limit: None }),
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].market_id, "a");

        let Json(rows) = get_changes(State(st), Query(ChangesQuery { min_abs: None, limit: Some(1) }))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn snapshot_summary_counts_periods() {
        let st = state().await;
        st.snapshots.rotate(&[market_row("a", "[0.5, 0.5]")]).await.unwrap();
        st.snapshots.rotate(&[market_row("a", "[0.5, 0.5]"), market_row("b", "[0.5, 0.5]")]).await.unwrap();
        let Json(summary) = get_snapshot_summary(State(st)).await.unwrap();
        assert_eq!(summary.t0_rows, 1);
        assert_eq!(summary.t1_rows, 2);
    }
}
