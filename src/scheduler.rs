use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::api::HealthState;
use crate::pipeline::Pipeline;

/// Runs a pipeline cycle on a fixed interval. A failed cycle is logged and
/// recorded; the loop keeps going.
pub struct CycleScheduler {
    pipeline: Pipeline,
    period: Duration,
    health: Arc<HealthState>,
}

impl CycleScheduler {
    pub fn new(pipeline: Pipeline, period: Duration, health: Arc<HealthState>) -> Self {
        Self {
            pipeline,
            period,
            health,
        }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.period);
        // Cycles include paced fetches and can overrun the period.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.pipeline.run_cycle().await {
                Ok(report) => {
                    info!(
                        rows = report.rows,
                        alertable = report.filter.alertable,
                        sent = report.dispatch.sent,
                        failed = report.dispatch.failed,
                        "Cycle complete: {} rows, {} alerts sent, {} failed",
                        report.rows,
                        report.dispatch.sent,
                        report.dispatch.failed,
                    );
                    self.health.record_success(report);
                }
                Err(e) => {
                    error!("Cycle failed: {e}");
                    self.health.record_failure(e.to_string());
                }
            }
        }
    }
}
