use crate::types::TelemetrySnapshot;
use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;

/// Size of the rolling latency window
pub const LATENCY_WINDOW: usize = 5;

#[derive(Debug, Default)]
pub struct TelemetryTracker {
    requests: u64,
    cache_hits: u64,
    errors: u64,
    last_latency_ms: VecDeque<u64>,
}

impl TelemetryTracker {
    pub const fn new() -> Self {
        TelemetryTracker {
            requests: 0,
            cache_hits: 0,
            errors: 0,
            last_latency_ms: VecDeque::new(),
        }
    }

    pub fn track_request(&mut self, latency_ms: u64) {
        self.requests += 1;
        if self.last_latency_ms.len() == LATENCY_WINDOW {
            self.last_latency_ms.pop_front();
        }
        self.last_latency_ms.push_back(latency_ms);
    }

    pub fn track_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn track_error(&mut self) {
        self.errors += 1;
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            requests: self.requests,
            cache_hits: self.cache_hits,
            errors: self.errors,
            last_latency_ms: self.last_latency_ms.iter().copied().collect(),
        }
    }

    pub fn reset(&mut self) {
        *self = TelemetryTracker::new();
    }
}

/// Process-wide counters, only ever read through snapshots
static TELEMETRY: Mutex<TelemetryTracker> = parking_lot::const_mutex(TelemetryTracker::new());

fn tracker() -> MutexGuard<'static, TelemetryTracker> {
    TELEMETRY.lock()
}

pub fn track_request(latency_ms: u64) {
    tracker().track_request(latency_ms);
}

pub fn track_cache_hit() {
    tracker().track_cache_hit();
}

pub fn track_error() {
    tracker().track_error();
}

/// Snapshot of the process-wide counters
pub fn get_telemetry() -> TelemetrySnapshot {
    tracker().snapshot()
}

pub fn reset_telemetry() {
    tracker().reset();
}
