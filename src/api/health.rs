//! Shared health state for the /health endpoint. Updated by the
//! scheduler, read by the API.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::Utc;

#[derive(Default)]
pub struct HealthState {
    /// Completed scheduler ticks since startup.
    scheduler_ticks: AtomicU64,
    /// Rounds fully scored since startup.
    rounds_scored: AtomicU64,
    /// Millisecond UTC epoch of the last tick (0 = none yet).
    last_tick_at_ms: AtomicI64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self) {
        self.scheduler_ticks.fetch_add(1, Ordering::Relaxed);
        self.last_tick_at_ms.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn record_round_scored(&self) {
        self.rounds_scored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn scheduler_ticks(&self) -> u64 {
        self.scheduler_ticks.load(Ordering::Relaxed)
    }

    pub fn rounds_scored(&self) -> u64 {
        self.rounds_scored.load(Ordering::Relaxed)
    }

    pub fn last_tick_at_ms(&self) -> i64 {
        self.last_tick_at_ms.load(Ordering::Relaxed)
    }
}
