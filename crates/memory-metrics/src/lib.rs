//! Process-wide counters for captures, recalls, dedups, and lifecycle
//! actions. The only global mutable state in the engine: everywhere
//! else, the store/embedder/capturer/etc. are constructor-injected
//! rather than singletons. `Metrics` itself is constructor-injected too
//! (wrapped in `Arc` and cloned into every subsystem that increments
//! it) so tests can observe isolated counts.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct Metrics {
    captures_total: AtomicU64,
    captures_dedup_skipped: AtomicU64,
    captures_conflict_skipped: AtomicU64,
    captures_stored: AtomicU64,
    recalls_total: AtomicU64,
    lifecycle_ttl_expired: AtomicU64,
    lifecycle_session_decayed: AtomicU64,
    lifecycle_consolidated: AtomicU64,
    lifecycle_validity_retired: AtomicU64,
}

/// Point-in-time, read-only snapshot of every counter, suitable for
/// the `/stats` handler and the CLI's `stats` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct MetricsSnapshot {
    pub captures_total: u64,
    pub captures_dedup_skipped: u64,
    pub captures_conflict_skipped: u64,
    pub captures_stored: u64,
    pub recalls_total: u64,
    pub lifecycle_ttl_expired: u64,
    pub lifecycle_session_decayed: u64,
    pub lifecycle_consolidated: u64,
    pub lifecycle_validity_retired: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_capture_attempt(&self) {
        self.captures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dedup_skipped(&self) {
        self.captures_dedup_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict_skipped(&self) {
        self.captures_conflict_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capture_stored(&self) {
        self.captures_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recall(&self) {
        self.recalls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ttl_expired(&self) {
        self.lifecycle_ttl_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_decayed(&self) {
        self.lifecycle_session_decayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_consolidated(&self) {
        self.lifecycle_consolidated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validity_retired(&self) {
        self.lifecycle_validity_retired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            captures_total: self.captures_total.load(Ordering::Relaxed),
            captures_dedup_skipped: self.captures_dedup_skipped.load(Ordering::Relaxed),
            captures_conflict_skipped: self.captures_conflict_skipped.load(Ordering::Relaxed),
            captures_stored: self.captures_stored.load(Ordering::Relaxed),
            recalls_total: self.recalls_total.load(Ordering::Relaxed),
            lifecycle_ttl_expired: self.lifecycle_ttl_expired.load(Ordering::Relaxed),
            lifecycle_session_decayed: self.lifecycle_session_decayed.load(Ordering::Relaxed),
            lifecycle_consolidated: self.lifecycle_consolidated.load(Ordering::Relaxed),
            lifecycle_validity_retired: self.lifecycle_validity_retired.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = Metrics::new();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn recording_increments_the_right_counter_only() {
        let m = Metrics::new();
        m.record_dedup_skipped();
        m.record_dedup_skipped();
        let snap = m.snapshot();
        assert_eq!(snap.captures_dedup_skipped, 2);
        assert_eq!(snap.captures_stored, 0);
    }

    #[test]
    fn concurrent_increments_are_all_observed() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(Metrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.record_recall();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(metrics.snapshot().recalls_total, 800);
    }
}
