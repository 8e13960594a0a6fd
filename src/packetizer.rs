//! Media-unit packetization.
//!
//! The packetizer turns one encoded media unit (e.g. one video frame)
//! into one or more wire-sized fragments. Fragmentation is purely
//! size-based: this layer is told the maximum payload per packet and
//! slices accordingly; codec-specific boundaries are the encoder's
//! concern. The last fragment is sized to the remainder, never padded.
//!
//! Stamping rules (RFC 3550 §5.1):
//! - every fragment consumes one sequence number from the clock;
//! - all fragments of a unit share the unit's timestamp;
//! - the marker flag is set only on the last fragment;
//! - the timestamp advances by the unit's duration only between units.
//!
//! Fragments are handed downstream in strictly increasing sequence
//! order by construction.

use std::sync::Arc;

use bytes::Bytes;

use crate::buffer::MediaBuffer;
use crate::session::{RtpClock, RtpSession};

/// Fragments media units into packet-sized [`MediaBuffer`]s.
///
/// Owns the stream's [`RtpClock`] — the sequence and timestamp counters
/// are mutated here and nowhere else. One packetizer per send direction,
/// confined to the send loop.
#[derive(Debug)]
pub struct Packetizer {
    session: Arc<RtpSession>,
    clock: RtpClock,
}

impl Packetizer {
    pub fn new(session: Arc<RtpSession>) -> Self {
        Self {
            session,
            clock: RtpClock::new(),
        }
    }

    /// Read-only view of the running counters.
    pub fn clock(&self) -> &RtpClock {
        &self.clock
    }

    /// Fragment one media unit into stamped packet payloads.
    ///
    /// `duration_ticks` is the unit's duration in media-clock ticks
    /// (e.g. 3000 for one frame at 30 fps on a 90 kHz clock); the
    /// timestamp advances by it after this unit. An empty unit yields
    /// no fragments and does not advance the clock.
    ///
    /// Fragment payloads are zero-copy slices of the unit.
    pub fn packetize(&mut self, unit: Bytes, duration_ticks: u32) -> Vec<MediaBuffer> {
        if unit.is_empty() {
            return Vec::new();
        }

        let timestamp = self.clock.timestamp();
        let max_payload = self.session.max_payload();
        let mut fragments = Vec::with_capacity(unit.len().div_ceil(max_payload));

        let mut offset = 0usize;
        while offset < unit.len() {
            let end = usize::min(offset + max_payload, unit.len());
            let marker = end == unit.len();
            let sequence = self.clock.next_sequence();
            fragments.push(MediaBuffer::new(unit.slice(offset..end), timestamp, sequence, marker));
            offset = end;
        }

        self.clock.advance_timestamp(duration_ticks);

        tracing::trace!(
            unit_bytes = unit.len(),
            fragments = fragments.len(),
            ts = timestamp,
            next_seq = self.clock.sequence(),
            "unit packetized"
        );

        fragments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;

    fn make_packetizer(max_payload: usize) -> Packetizer {
        let config = SessionConfig {
            max_payload,
            ..Default::default()
        };
        Packetizer::new(Arc::new(RtpSession::new(&config)))
    }

    #[test]
    fn small_unit_single_fragment() {
        let mut p = make_packetizer(1400);
        let frags = p.packetize(Bytes::from_static(b"frame"), 3000);
        assert_eq!(frags.len(), 1);
        assert!(frags[0].marker());
        assert_eq!(frags[0].payload().as_ref(), b"frame");
    }

    #[test]
    fn oversized_unit_fragmented() {
        let mut p = make_packetizer(10);
        let unit = Bytes::from(vec![0xAB; 25]);
        let frags = p.packetize(unit.clone(), 3000);

        assert_eq!(frags.len(), 3);
        assert_eq!(frags[0].len(), 10);
        assert_eq!(frags[1].len(), 10);
        assert_eq!(frags[2].len(), 5); // remainder, not padded

        // Concatenating fragments reproduces the unit
        let rebuilt: Vec<u8> = frags
            .iter()
            .flat_map(|f| f.payload().iter().copied())
            .collect();
        assert_eq!(rebuilt, unit.as_ref());
    }

    #[test]
    fn exact_multiple_has_maximal_last_fragment() {
        let mut p = make_packetizer(10);
        let frags = p.packetize(Bytes::from(vec![1u8; 30]), 3000);
        assert_eq!(frags.len(), 3);
        assert_eq!(frags[2].len(), 10);
    }

    #[test]
    fn marker_only_on_last_fragment() {
        let mut p = make_packetizer(10);
        let frags = p.packetize(Bytes::from(vec![1u8; 25]), 3000);
        assert!(!frags[0].marker());
        assert!(!frags[1].marker());
        assert!(frags[2].marker());
    }

    #[test]
    fn fragments_share_timestamp_and_increment_sequence() {
        let mut p = make_packetizer(10);
        let first_seq = p.clock().sequence();
        let frags = p.packetize(Bytes::from(vec![1u8; 25]), 3000);

        for (i, frag) in frags.iter().enumerate() {
            assert_eq!(frag.timestamp(), frags[0].timestamp());
            assert_eq!(frag.sequence(), first_seq.wrapping_add(i as u16));
        }
    }

    #[test]
    fn timestamp_advances_between_units() {
        let mut p = make_packetizer(1400);
        let a = p.packetize(Bytes::from_static(b"one"), 3000);
        let b = p.packetize(Bytes::from_static(b"two"), 3000);
        assert_eq!(b[0].timestamp(), a[0].timestamp().wrapping_add(3000));
    }

    #[test]
    fn empty_unit_no_fragments_no_advance() {
        let mut p = make_packetizer(1400);
        let ts = p.clock().timestamp();
        let seq = p.clock().sequence();
        assert!(p.packetize(Bytes::new(), 3000).is_empty());
        assert_eq!(p.clock().timestamp(), ts);
        assert_eq!(p.clock().sequence(), seq);
    }
}
