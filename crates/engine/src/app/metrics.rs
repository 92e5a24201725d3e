use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub tps: f32,
    pub tick_time_ms: f32,
    pub max_tick_time_ms: f32,
    pub total_ticks: u64,
}

/// Shared read side of the loop metrics; cheap to clone.
#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    ticks: u32,
    total_ticks: u64,
    tick_time_sum: Duration,
    tick_time_max: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval_start: now,
            interval,
            ticks: 0,
            total_ticks: 0,
            tick_time_sum: Duration::ZERO,
            tick_time_max: Duration::ZERO,
        }
    }

    pub(crate) fn record_tick(&mut self, tick_duration: Duration) {
        self.ticks = self.ticks.saturating_add(1);
        self.total_ticks = self.total_ticks.saturating_add(1);
        self.tick_time_sum = self.tick_time_sum.saturating_add(tick_duration);
        self.tick_time_max = self.tick_time_max.max(tick_duration);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let tick_time_ms = if self.ticks == 0 {
            0.0
        } else {
            (self.tick_time_sum.as_secs_f32() / self.ticks as f32) * 1000.0
        };

        let snapshot = LoopMetricsSnapshot {
            tps: self.ticks as f32 / elapsed_seconds,
            tick_time_ms,
            max_tick_time_ms: self.tick_time_max.as_secs_f32() * 1000.0,
            total_ticks: self.total_ticks,
        };

        self.interval_start = now;
        self.ticks = 0;
        self.tick_time_sum = Duration::ZERO;
        self.tick_time_max = Duration::ZERO;

        Some(snapshot)
    }
}
