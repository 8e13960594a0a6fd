//! Media-unit reassembly.
//!
//! The depacketizer consumes the jitter buffer's ordered event stream
//! (fragments interleaved with gap signals) and rebuilds media units.
//! Fragments sharing a timestamp belong to one unit; the unit is
//! complete when its marker fragment arrives with no gap inside it.
//! Completed units come out in non-decreasing timestamp order because
//! the input is in sequence order.
//!
//! Loss policy: a gap inside a unit poisons it — the partial unit is
//! discarded when its timestamp ends and exactly one [`UnitLoss`]
//! carries its timestamp. A gap between units yields exactly one
//! timestamp-less [`UnitLoss`]. Partial or damaged units are never
//! forwarded to the sink. Duplicates never reach this layer; the
//! jitter buffer drops them.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use bytes::{Bytes, BytesMut};

use crate::buffer::MediaBuffer;
use crate::jitter::JitterEvent;
use crate::stats::StreamStats;

/// What the receive chain delivers to the media sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverEvent {
    /// A complete reassembled media unit. The buffer's timestamp is the
    /// unit's, its sequence is the first fragment's, marker is set.
    Unit(MediaBuffer),
    /// A unit could not be completed; loss is data, not a fault.
    Lost(UnitLoss),
}

/// Notification that a media unit was given up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitLoss {
    /// The unit's timestamp when any of it was received; `None` when
    /// the loss fell entirely between observed units.
    pub timestamp: Option<u32>,
}

struct UnitInProgress {
    timestamp: u32,
    first_sequence: u16,
    fragments: Vec<Bytes>,
    damaged: bool,
}

/// Rebuilds media units from the jitter buffer's event stream.
///
/// Confined to the receive loop; one per receive direction.
pub struct Depacketizer {
    current: Option<UnitInProgress>,
    stats: Arc<StreamStats>,
}

impl Depacketizer {
    pub fn new(stats: Arc<StreamStats>) -> Self {
        Self {
            current: None,
            stats,
        }
    }

    /// Process one jitter buffer event, yielding zero or more sink
    /// events (a timestamp change can close one unit and complete the
    /// next in a single call).
    pub fn handle(&mut self, event: JitterEvent) -> Vec<ReceiverEvent> {
        match event {
            JitterEvent::Gap { first_seq, count } => self.handle_gap(first_seq, count),
            JitterEvent::Packet(buffer) => self.handle_fragment(buffer),
        }
    }

    /// Discard any unit under assembly (stream teardown).
    pub fn reset(&mut self) {
        self.current = None;
    }

    fn handle_gap(&mut self, first_seq: u16, count: u16) -> Vec<ReceiverEvent> {
        match &mut self.current {
            Some(unit) => {
                // The gap ate part of this unit; it is discarded (with
                // one loss notice) when its timestamp ends.
                tracing::debug!(ts = unit.timestamp, first_seq, count, "unit damaged by gap");
                unit.damaged = true;
                Vec::new()
            }
            None => {
                // Loss fell between units we observed.
                tracing::debug!(first_seq, count, "unit lost between units");
                self.stats.units_lost.fetch_add(1, Ordering::Relaxed);
                vec![ReceiverEvent::Lost(UnitLoss { timestamp: None })]
            }
        }
    }

    fn handle_fragment(&mut self, buffer: MediaBuffer) -> Vec<ReceiverEvent> {
        let mut events = Vec::new();

        // A new timestamp closes the previous unit; without its marker
        // it never completed.
        if let Some(unit) = &self.current
            && unit.timestamp != buffer.timestamp()
        {
            events.push(self.abandon_current());
        }

        let unit = self.current.get_or_insert_with(|| UnitInProgress {
            timestamp: buffer.timestamp(),
            first_sequence: buffer.sequence(),
            fragments: Vec::new(),
            damaged: false,
        });

        let marker = buffer.marker();
        unit.fragments.push(buffer.into_payload());

        if marker {
            let unit = self.current.take().expect("unit in progress");
            if unit.damaged {
                tracing::debug!(ts = unit.timestamp, "damaged unit discarded at marker");
                self.stats.units_lost.fetch_add(1, Ordering::Relaxed);
                events.push(ReceiverEvent::Lost(UnitLoss {
                    timestamp: Some(unit.timestamp),
                }));
            } else {
                events.push(ReceiverEvent::Unit(assemble(unit)));
                self.stats.units_delivered.fetch_add(1, Ordering::Relaxed);
            }
        }

        events
    }

    fn abandon_current(&mut self) -> ReceiverEvent {
        let unit = self.current.take().expect("unit in progress");
        tracing::debug!(
            ts = unit.timestamp,
            fragments = unit.fragments.len(),
            "incomplete unit discarded"
        );
        self.stats.units_lost.fetch_add(1, Ordering::Relaxed);
        ReceiverEvent::Lost(UnitLoss {
            timestamp: Some(unit.timestamp),
        })
    }
}

/// Concatenate fragments in sequence order into one unit buffer.
fn assemble(unit: UnitInProgress) -> MediaBuffer {
    let total: usize = unit.fragments.iter().map(Bytes::len).sum();
    let mut payload = BytesMut::with_capacity(total);
    for fragment in &unit.fragments {
        payload.extend_from_slice(fragment);
    }
    tracing::trace!(
        ts = unit.timestamp,
        fragments = unit.fragments.len(),
        bytes = total,
        "unit reassembled"
    );
    MediaBuffer::new(payload.freeze(), unit.timestamp, unit.first_sequence, true)
}
