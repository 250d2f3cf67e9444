//! Delivery statistics for the running SDK.
//!
//! Counters are updated from the capture, manager and network threads and can
//! be read at any time without locking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for recorded input and delivered segments.
#[derive(Debug)]
pub struct SdkStats {
    motion_events: AtomicU64,
    key_events: AtomicU64,
    segments_to_callback: AtomicU64,
    segments_to_network: AtomicU64,
    payloads_sent: AtomicU64,
    payloads_dropped: AtomicU64,
    started_at: DateTime<Utc>,
}

impl SdkStats {
    pub fn new() -> Self {
        Self {
            motion_events: AtomicU64::new(0),
            key_events: AtomicU64::new(0),
            segments_to_callback: AtomicU64::new(0),
            segments_to_network: AtomicU64::new(0),
            payloads_sent: AtomicU64::new(0),
            payloads_dropped: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn record_motion_event(&self) {
        self.motion_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_key_event(&self) {
        self.key_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_callback_delivery(&self) {
        self.segments_to_callback.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_delivery(&self) {
        self.segments_to_network.fetch_add(1, Ordering::Relaxed);
    }

    /// A request finished with a non-retryable response.
    pub fn record_payload_sent(&self) {
        self.payloads_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// A request was dropped (queue full or past its deadline).
    pub fn record_payload_dropped(&self) {
        self.payloads_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            motion_events: self.motion_events.load(Ordering::Relaxed),
            key_events: self.key_events.load(Ordering::Relaxed),
            segments_to_callback: self.segments_to_callback.load(Ordering::Relaxed),
            segments_to_network: self.segments_to_network.load(Ordering::Relaxed),
            payloads_sent: self.payloads_sent.load(Ordering::Relaxed),
            payloads_dropped: self.payloads_dropped.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "SDK Statistics:\n\
             - Motion events recorded: {}\n\
             - Key events recorded: {}\n\
             - Segments delivered to callback: {}\n\
             - Segments queued for network: {}\n\
             - Payloads sent: {}\n\
             - Payloads dropped: {}\n\
             - Uptime: {} seconds",
            stats.motion_events,
            stats.key_events,
            stats.segments_to_callback,
            stats.segments_to_network,
            stats.payloads_sent,
            stats.payloads_dropped,
            stats.uptime_secs
        )
    }
}

impl Default for SdkStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`SdkStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub motion_events: u64,
    pub key_events: u64,
    pub segments_to_callback: u64,
    pub segments_to_network: u64,
    pub payloads_sent: u64,
    pub payloads_dropped: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Thread-safe shared stats.
pub type SharedStats = Arc<SdkStats>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = SdkStats::new();
        stats.record_motion_event();
        stats.record_motion_event();
        stats.record_key_event();
        stats.record_callback_delivery();
        stats.record_payload_dropped();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.motion_events, 2);
        assert_eq!(snapshot.key_events, 1);
        assert_eq!(snapshot.segments_to_callback, 1);
        assert_eq!(snapshot.segments_to_network, 0);
        assert_eq!(snapshot.payloads_dropped, 1);
    }

    #[test]
    fn test_summary() {
        let stats = SdkStats::new();
        stats.record_key_event();
        let summary = stats.summary();
        assert!(summary.contains("Key events recorded: 1"));
        assert!(summary.contains("Payloads dropped: 0"));
    }
}
