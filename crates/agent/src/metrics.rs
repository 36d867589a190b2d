use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-process turn counters.
#[derive(Debug, Default)]
pub struct RuntimeMetrics {
    turns: AtomicU64,
    bypassed: AtomicU64,
    blocked: AtomicU64,
    reasoning_calls: AtomicU64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub turns: u64,
    pub bypassed: u64,
    pub blocked: u64,
    pub reasoning_calls: u64,
    pub bypass_rate: f64,
}

impl RuntimeMetrics {
    pub fn record_turn(&self, bypassed: bool) {
        self.turns.fetch_add(1, Ordering::Relaxed);
        if bypassed {
            self.bypassed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reasoning_calls.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_blocked(&self) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let turns = self.turns.load(Ordering::Relaxed);
        let bypassed = self.bypassed.load(Ordering::Relaxed);
        let bypass_rate = if turns == 0 { 0.0 } else { bypassed as f64 / turns as f64 };

        MetricsSnapshot {
            turns,
            bypassed,
            blocked: self.blocked.load(Ordering::Relaxed),
            reasoning_calls: self.reasoning_calls.load(Ordering::Relaxed),
            bypass_rate,
        }
    }
}
