//! Lock-free stream counters.
//!
//! One [`StreamStats`] is shared (via `Arc`) between the pipeline
//! stages of a stream and whatever owns observability. All fields are
//! atomics so the send and receive loops never contend on a lock.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for one logical stream.
#[derive(Debug, Default)]
pub struct StreamStats {
    /// Packets handed to the network adapter.
    pub packets_sent: AtomicU64,
    /// Packets accepted from the network adapter.
    pub packets_received: AtomicU64,
    /// Duplicate packets dropped by the jitter buffer.
    pub duplicates_dropped: AtomicU64,
    /// Packets that arrived after their window had been delivered.
    pub late_dropped: AtomicU64,
    /// Datagrams that failed header validation.
    pub malformed_dropped: AtomicU64,
    /// Valid packets from a foreign payload type or SSRC.
    pub foreign_dropped: AtomicU64,
    /// Media units delivered complete to the sink.
    pub units_delivered: AtomicU64,
    /// Media units lost (incomplete at deadline, or gap between units).
    pub units_lost: AtomicU64,
    /// Current number of pending jitter buffer entries (gauge).
    pub jitter_occupancy: AtomicUsize,
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            late_dropped: self.late_dropped.load(Ordering::Relaxed),
            malformed_dropped: self.malformed_dropped.load(Ordering::Relaxed),
            foreign_dropped: self.foreign_dropped.load(Ordering::Relaxed),
            units_delivered: self.units_delivered.load(Ordering::Relaxed),
            units_lost: self.units_lost.load(Ordering::Relaxed),
            jitter_occupancy: self.jitter_occupancy.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`StreamStats`] at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub duplicates_dropped: u64,
    pub late_dropped: u64,
    pub malformed_dropped: u64,
    pub foreign_dropped: u64,
    pub units_delivered: u64,
    pub units_lost: u64,
    pub jitter_occupancy: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = StreamStats::new();
        stats.packets_sent.fetch_add(3, Ordering::Relaxed);
        stats.units_lost.fetch_add(1, Ordering::Relaxed);
        stats.jitter_occupancy.store(7, Ordering::Relaxed);

        let snap = stats.snapshot();
        assert_eq!(snap.packets_sent, 3);
        assert_eq!(snap.units_lost, 1);
        assert_eq!(snap.jitter_occupancy, 7);
        assert_eq!(snap.packets_received, 0);
    }
}
