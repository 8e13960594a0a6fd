//! Jitter buffer: reorders and paces arriving packets.
//!
//! Arriving fragments are held in a bounded, sequence-ordered window
//! and released downstream either when they are next in sequence or
//! when their playout deadline elapses, whichever comes first. Gaps
//! that are skipped at a deadline are signaled explicitly, in order,
//! before the packet that follows them — the consumer sees loss as
//! data, never as silence.
//!
//! The buffer trades latency for smoothness: a larger target latency
//! tolerates more reordering at the cost of end-to-end delay.
//!
//! Nothing here blocks. [`JitterBuffer::poll`] is a deadline check
//! against a caller-supplied instant, and [`JitterBuffer::next_deadline`]
//! tells a cooperative scheduler when the next tick is worth taking.
//! The pending map is confined to the receive loop; no locking.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::buffer::{MediaBuffer, seq_after, seq_distance};
use crate::stats::StreamStats;

const SEQ_CYCLE: u64 = 1 << 16;

/// Jitter buffer tuning knobs.
#[derive(Debug, Clone)]
pub struct JitterConfig {
    /// How long a packet may wait for its predecessors before the gap
    /// is skipped. Also the initial buffering delay of the stream.
    pub target_latency: Duration,
    /// Bound on pending entries; the oldest is evicted beyond this.
    pub max_entries: usize,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            target_latency: Duration::from_millis(50),
            max_entries: 64,
        }
    }
}

/// What a scheduling tick can yield, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JitterEvent {
    /// The next fragment, in strictly increasing sequence order.
    Packet(MediaBuffer),
    /// `count` sequence numbers starting at `first_seq` were given up
    /// on. Emitted once per gap, before the packet that follows it.
    Gap { first_seq: u16, count: u16 },
}

struct Entry {
    buffer: MediaBuffer,
    deadline: Instant,
}

/// Sequence-ordered holding window for one receive direction.
///
/// Keys are RFC 3550-style extended sequence numbers (cycle count in
/// the high bits), so ordering and gap arithmetic stay correct across
/// the 2^16 wrap. No entry is ever delivered twice: anything at or
/// below the delivery cursor is dropped on arrival.
pub struct JitterBuffer {
    config: JitterConfig,
    entries: BTreeMap<u64, Entry>,
    /// Extended sequence of the last delivered packet.
    last_delivered: Option<u64>,
    /// Highest extended sequence observed, reference for extension.
    highest_ext: Option<u64>,
    stats: Arc<StreamStats>,
}

impl JitterBuffer {
    pub fn new(config: JitterConfig, stats: Arc<StreamStats>) -> Self {
        Self {
            config,
            entries: BTreeMap::new(),
            last_delivered: None,
            highest_ext: None,
            stats,
        }
    }

    /// Number of pending entries.
    pub fn occupancy(&self) -> usize {
        self.entries.len()
    }

    /// Earliest instant at which [`poll`](Self::poll) could deliver
    /// more than it would right now. `None` when nothing is pending.
    ///
    /// Only the lowest pending sequence gates delivery, so this is the
    /// head entry's deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.first_key_value().map(|(_, e)| e.deadline)
    }

    /// Accept an arriving fragment. Returns false when it was dropped
    /// as stale, duplicate, or invalid.
    ///
    /// `now` is the arrival time; the entry's playout deadline is
    /// `now + target_latency`.
    pub fn push(&mut self, buffer: MediaBuffer, now: Instant) -> bool {
        if !buffer.is_valid() {
            return false;
        }

        let seq = buffer.sequence();
        let ext = self.extend(seq);

        if let Some(last) = self.last_delivered
            && ext <= last
        {
            // Stale duplicate or too-late arrival; the cursor has passed it.
            self.stats
                .late_dropped
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            tracing::trace!(seq, "late packet dropped");
            return false;
        }

        if self.entries.contains_key(&ext) {
            self.stats
                .duplicates_dropped
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            tracing::trace!(seq, "duplicate packet dropped");
            return false;
        }

        if self.entries.len() >= self.config.max_entries {
            // Bound memory: give up on the oldest pending entry. The
            // resulting gap is signaled when delivery passes it.
            if let Some((evicted, _)) = self.entries.pop_first() {
                self.stats
                    .late_dropped
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                tracing::warn!(
                    evicted_seq = (evicted % SEQ_CYCLE) as u16,
                    max_entries = self.config.max_entries,
                    "window full, evicted oldest entry"
                );
            }
        }

        self.entries.insert(
            ext,
            Entry {
                buffer,
                deadline: now + self.config.target_latency,
            },
        );
        self.publish_occupancy();
        true
    }

    /// One scheduling tick: drain everything deliverable at `now`.
    ///
    /// Delivers the lowest pending sequence while it is either exactly
    /// one past the delivery cursor or past its deadline. A skipped
    /// range is emitted as a [`JitterEvent::Gap`] immediately before
    /// the packet that follows it. Events are strictly
    /// sequence-ordered.
    pub fn poll(&mut self, now: Instant) -> Vec<JitterEvent> {
        let mut events = Vec::new();

        while let Some((&head, entry)) = self.entries.first_key_value() {
            let in_sequence = self.last_delivered.is_some_and(|last| head == last + 1);
            if !in_sequence && entry.deadline > now {
                break;
            }

            if let Some(last) = self.last_delivered
                && head > last + 1
            {
                let first_seq = ((last + 1) % SEQ_CYCLE) as u16;
                let count = u16::try_from(head - last - 1).unwrap_or(u16::MAX);
                tracing::debug!(first_seq, count, "sequence gap given up");
                events.push(JitterEvent::Gap { first_seq, count });
            }

            let (ext, entry) = self.entries.pop_first().expect("head exists");
            self.last_delivered = Some(ext);
            events.push(JitterEvent::Packet(entry.buffer));
        }

        if !events.is_empty() {
            self.publish_occupancy();
        }
        events
    }

    /// Release every pending entry (stream teardown). Nothing is
    /// delivered afterwards until new packets arrive.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.publish_occupancy();
    }

    fn publish_occupancy(&self) {
        self.stats
            .jitter_occupancy
            .store(self.entries.len(), std::sync::atomic::Ordering::Relaxed);
    }

    /// Map a 16-bit sequence number onto the extended sequence space
    /// relative to the highest sequence seen so far (RFC 3550 §A.1):
    /// forward if the modular comparison says "after", backward
    /// otherwise. Starts one cycle up so predecessors of the first
    /// packet still order below it.
    fn extend(&mut self, seq: u16) -> u64 {
        let ext = match self.highest_ext {
            None => SEQ_CYCLE | u64::from(seq),
            Some(highest) => {
                let reference = (highest % SEQ_CYCLE) as u16;
                if seq_after(seq, reference) {
                    highest + u64::from(seq_distance(reference, seq))
                } else {
                    highest - u64::from(seq_distance(seq, reference))
                }
            }
        };
        if self.highest_ext.is_none_or(|h| ext > h) {
            self.highest_ext = Some(ext);
        }
        ext
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    const LATENCY: Duration = Duration::from_millis(50);

    fn make_buffer(seq: u16, ts: u32, marker: bool) -> MediaBuffer {
        MediaBuffer::new(Bytes::from(vec![seq as u8; 4]), ts, seq, marker)
    }

    fn make_jitter() -> JitterBuffer {
        JitterBuffer::new(
            JitterConfig {
                target_latency: LATENCY,
                max_entries: 64,
            },
            Arc::new(StreamStats::new()),
        )
    }

    fn sequences(events: &[JitterEvent]) -> Vec<u16> {
        events
            .iter()
            .filter_map(|e| match e {
                JitterEvent::Packet(b) => Some(b.sequence()),
                JitterEvent::Gap { .. } => None,
            })
            .collect()
    }

    #[test]
    fn first_packet_waits_for_deadline() {
        let mut jb = make_jitter();
        let now = Instant::now();
        assert!(jb.push(make_buffer(100, 0, true), now));

        assert!(jb.poll(now).is_empty());
        assert_eq!(sequences(&jb.poll(now + LATENCY)), vec![100]);
    }

    #[test]
    fn in_order_packets_flow_without_extra_delay() {
        let mut jb = make_jitter();
        let now = Instant::now();
        jb.push(make_buffer(100, 0, true), now);
        jb.poll(now + LATENCY);

        // Cursor established; the next-in-sequence packet needs no deadline.
        jb.push(make_buffer(101, 3000, true), now + LATENCY);
        assert_eq!(sequences(&jb.poll(now + LATENCY)), vec![101]);
    }

    #[test]
    fn reordered_arrivals_deliver_in_sequence_order() {
        let mut jb = make_jitter();
        let now = Instant::now();
        for seq in [101u16, 100, 102] {
            jb.push(make_buffer(seq, 9000, seq == 102), now);
        }
        assert_eq!(sequences(&jb.poll(now + LATENCY)), vec![100, 101, 102]);
    }

    #[test]
    fn duplicate_dropped_and_counted() {
        let stats = Arc::new(StreamStats::new());
        let mut jb = JitterBuffer::new(JitterConfig::default(), stats.clone());
        let now = Instant::now();

        assert!(jb.push(make_buffer(100, 0, true), now));
        assert!(!jb.push(make_buffer(100, 0, true), now));
        assert_eq!(stats.snapshot().duplicates_dropped, 1);
        assert_eq!(jb.occupancy(), 1);
    }

    #[test]
    fn stale_arrival_dropped_after_delivery() {
        let stats = Arc::new(StreamStats::new());
        let mut jb = JitterBuffer::new(
            JitterConfig {
                target_latency: LATENCY,
                max_entries: 64,
            },
            stats.clone(),
        );
        let now = Instant::now();
        jb.push(make_buffer(100, 0, true), now);
        jb.poll(now + LATENCY);

        assert!(!jb.push(make_buffer(100, 0, true), now + LATENCY));
        assert!(!jb.push(make_buffer(99, 0, true), now + LATENCY));
        assert_eq!(stats.snapshot().late_dropped, 2);
    }

    #[test]
    fn gap_signaled_before_following_packet() {
        let mut jb = make_jitter();
        let now = Instant::now();
        jb.push(make_buffer(49, 0, true), now);
        jb.poll(now + LATENCY);

        // 50 never arrives; 51 waits out its own deadline, then the gap
        // is signaled and delivery resumes.
        let arrival = now + LATENCY;
        jb.push(make_buffer(51, 6000, true), arrival);
        assert!(jb.poll(arrival).is_empty());

        let events = jb.poll(arrival + LATENCY);
        assert_eq!(
            events[0],
            JitterEvent::Gap {
                first_seq: 50,
                count: 1
            }
        );
        assert!(matches!(&events[1], JitterEvent::Packet(b) if b.sequence() == 51));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn multi_packet_gap_coalesced() {
        let mut jb = make_jitter();
        let now = Instant::now();
        jb.push(make_buffer(10, 0, true), now);
        jb.poll(now + LATENCY);

        jb.push(make_buffer(14, 0, true), now + LATENCY);
        let events = jb.poll(now + LATENCY + LATENCY);
        assert_eq!(
            events[0],
            JitterEvent::Gap {
                first_seq: 11,
                count: 3
            }
        );
    }

    #[test]
    fn capacity_bound_evicts_oldest() {
        let stats = Arc::new(StreamStats::new());
        let mut jb = JitterBuffer::new(
            JitterConfig {
                target_latency: LATENCY,
                max_entries: 3,
            },
            stats.clone(),
        );
        let now = Instant::now();
        for seq in 100u16..104 {
            jb.push(make_buffer(seq, 0, false), now);
        }

        assert_eq!(jb.occupancy(), 3);
        assert_eq!(stats.snapshot().late_dropped, 1);

        // 100 was evicted and is never delivered.
        let events = jb.poll(now + LATENCY);
        assert_eq!(sequences(&events), vec![101, 102, 103]);
    }

    #[test]
    fn wraparound_is_not_a_gap() {
        let mut jb = make_jitter();
        let now = Instant::now();
        jb.push(make_buffer(65534, 0, true), now);
        jb.poll(now + LATENCY);

        for (i, seq) in [65535u16, 0, 1].into_iter().enumerate() {
            jb.push(make_buffer(seq, i as u32, true), now + LATENCY);
        }
        let events = jb.poll(now + LATENCY);
        assert_eq!(sequences(&events), vec![65535, 0, 1]);
        assert!(
            events
                .iter()
                .all(|e| !matches!(e, JitterEvent::Gap { .. })),
            "no spurious gap across the wrap"
        );
    }

    #[test]
    fn predecessor_of_first_packet_still_orders_below() {
        let mut jb = make_jitter();
        let now = Instant::now();
        jb.push(make_buffer(3, 0, true), now);
        jb.push(make_buffer(2, 0, true), now);
        assert_eq!(sequences(&jb.poll(now + LATENCY)), vec![2, 3]);
    }

    #[test]
    fn next_deadline_tracks_head_entry() {
        let mut jb = make_jitter();
        let now = Instant::now();
        assert!(jb.next_deadline().is_none());

        jb.push(make_buffer(7, 0, true), now);
        assert_eq!(jb.next_deadline(), Some(now + LATENCY));
    }

    #[test]
    fn clear_releases_pending_entries() {
        let mut jb = make_jitter();
        let now = Instant::now();
        jb.push(make_buffer(5, 0, true), now);
        jb.push(make_buffer(6, 0, true), now);
        jb.clear();

        assert_eq!(jb.occupancy(), 0);
        assert!(jb.poll(now + LATENCY).is_empty());
    }
}
