mod alert;
mod api;
mod config;
mod db;
mod error;
mod fetcher;
mod pipeline;
mod scheduler;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::alert::{LogNotifier, Notifier, TelegramNotifier};
use crate::api::{router, ApiState, HealthState};
use crate::config::Config;
use crate::db::{ChangeStore, SnapshotStore};
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::scheduler::CycleScheduler;

#[tokio::main]
async fn main() {
    // A missing .env is fine; the process env may already carry everything.
    dotenv::dotenv().ok();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Notification transport ---
    let notifier: Box<dyn Notifier> = match &cfg.telegram {
        Some(tg) => Box::new(TelegramNotifier::new(tg)?),
        None => {
            warn!("TELEGRAM_TOKEN not set, alerts will only be logged");
            Box::new(LogNotifier)
        }
    };
    info!(
        notifier = notifier.name(),
        threshold = cfg.move_threshold,
        excluded_tags = cfg.exclude_tags.len(),
        "Alerting via {} (threshold={}, {} excluded tags)",
        notifier.name(),
        cfg.move_threshold,
        cfg.exclude_tags.len(),
    );

    let pipeline = Pipeline::new(cfg.clone(), pool.clone(), notifier);

    // --- Cron mode: one cycle, then exit ---
    if cfg.run_once {
        let report = pipeline.run_cycle().await?;
        info!(
            "Run complete: {} events, {} rows, {} alertable, {} sent, {} failed",
            report.events,
            report.rows,
            report.filter.alertable,
            report.dispatch.sent,
            report.dispatch.failed,
        );
        return Ok(());
    }

    // --- Service mode: scheduled cycles + read-only API ---
    let health = Arc::new(HealthState::new());
    let scheduler = CycleScheduler::new(
        pipeline,
        Duration::from_secs(cfg.run_interval_secs.max(1)),
        Arc::clone(&health),
    );
    tokio::spawn(async move { scheduler.run().await });
    info!("Cycle scheduler started (every {}s)", cfg.run_interval_secs);

    let api_state = ApiState {
        snapshots: SnapshotStore::new(pool.clone()),
        changes: ChangeStore::new(pool),
        health,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
