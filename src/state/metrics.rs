use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the sync engine
#[derive(Clone, Default)]
pub struct SyncMetrics {
    /// Descriptors accepted by `publish`
    publishes: Arc<AtomicU64>,

    /// Descriptors rejected by validation
    rejected: Arc<AtomicU64>,

    /// Descriptors queued to a connection (handshakes included)
    deliveries: Arc<AtomicU64>,

    /// Connections dropped because their queue overflowed
    evictions: Arc<AtomicU64>,

    /// Sessions currently attached
    active_sessions: Arc<AtomicU64>,

    playback_reports: Arc<AtomicU64>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_publish(&self) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deliveries(&self, count: usize) {
        self.deliveries.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_playback_report(&self) {
        self.playback_reports.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_opened(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        // saturate so a stray close never wraps the gauge
        let _ = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            publishes: self.publishes.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            playback_reports: self.playback_reports.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub publishes: u64,
    pub rejected: u64,
    pub deliveries: u64,
    pub evictions: u64,
    pub active_sessions: u64,
    pub playback_reports: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = SyncMetrics::new();
        metrics.record_publish();
        metrics.record_publish();
        metrics.record_rejected();
        metrics.record_deliveries(3);
        metrics.record_eviction();

        let snapshot = metrics.get_snapshot();
        assert_eq!(snapshot.publishes, 2);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.deliveries, 3);
        assert_eq!(snapshot.evictions, 1);
    }

    #[test]
    fn test_session_gauge_never_underflows() {
        let metrics = SyncMetrics::new();
        metrics.session_opened();
        metrics.session_closed();
        metrics.session_closed();

        assert_eq!(metrics.get_snapshot().active_sessions, 0);
    }
}
