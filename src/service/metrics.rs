//! Observability for the store service: every handler records a
//! cycle-time sample and the in-flight request count is tracked with a
//! lock-free atomic gauge. Instrumentation is applied directly in the
//! service, which is the one subject-dispatch chokepoint, rather than
//! through a swappable wrapper type.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use metrics::{counter, gauge, histogram};

/// Lock-free counters/gauges for the store service's message handling.
#[derive(Default)]
pub struct ServiceMetrics {
    pending: AtomicI64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of messages accepted but not yet replied to.
    pub fn pending(&self) -> i64 {
        self.pending.load(Ordering::Relaxed)
    }

    /// Call at the start of handling a message; returns a guard whose
    /// drop (via [`Self::finish`]) records the cycle time.
    pub fn start(&self, subject: &str) -> Instant {
        let depth = self.pending.fetch_add(1, Ordering::Relaxed) + 1;
        gauge!("simple_iot_pending_messages").set(depth as f64);
        counter!("simple_iot_messages_received_total", "subject" => subject.to_string())
            .increment(1);
        Instant::now()
    }

    pub fn finish(&self, subject: &str, started: Instant, ok: bool) {
        let depth = self.pending.fetch_sub(1, Ordering::Relaxed) - 1;
        gauge!("simple_iot_pending_messages").set(depth as f64);
        histogram!("simple_iot_cycle_time_seconds", "subject" => subject.to_string())
            .record(started.elapsed().as_secs_f64());
        if !ok {
            counter!("simple_iot_messages_failed_total", "subject" => subject.to_string())
                .increment(1);
        }
    }
}
