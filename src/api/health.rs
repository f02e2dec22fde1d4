//! Shared health state for the /health endpoint.
//! Updated by the cycle loop after every run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::pipeline::CycleReport;

/// Shared cycle metrics. Written by the scheduler, read by the API.
#[derive(Default)]
pub struct HealthState {
    pub cycles_ok: AtomicU64,
    pub cycles_failed: AtomicU64,
    last_report: RwLock<Option<CycleReport>>,
    last_error: RwLock<Option<String>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, report: CycleReport) {
        self.cycles_ok.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut slot) = self.last_report.write() {
            *slot = Some(report);
        }
    }

    pub fn record_failure(&self, err: String) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut slot) = self.last_error.write() {
            *slot = Some(err);
        }
    }

    pub fn cycles_ok(&self) -> u64 {
        self.cycles_ok.load(Ordering::Relaxed)
    }

    pub fn cycles_failed(&self) -> u64 {
        self.cycles_failed.load(Ordering::Relaxed)
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().ok().and_then(|r| r.clone())
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().ok().and_then(|e| e.clone())
    }
}
