//! Media buffers and modular sequence arithmetic.
//!
//! A [`MediaBuffer`] is the unit of data moving through the pipeline:
//! payload bytes plus the timing metadata every stage needs (RTP
//! timestamp, sequence number, marker flag). Buffers are value-like —
//! filled once at construction, then only moved between stages. Payloads
//! are [`Bytes`], so fragmenting or reassembling never copies the
//! underlying allocation.

use bytes::Bytes;

/// Half of the 16-bit sequence space. A sequence number is "after"
/// another when the forward modular distance is below this bound.
const SEQ_HALF: u16 = 0x8000;

/// An owned chunk of media plus its timing metadata.
///
/// Constructed by a producer stage (media source, packetizer, or the
/// receive path) and handed downstream by move. There is no in-place
/// mutation after construction — only accessors and ownership transfer.
///
/// The empty sentinel ([`MediaBuffer::empty`]) is the one explicitly
/// invalid state; it stands in for "no data" where a buffer value is
/// required and is never passed to a consumer as media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBuffer {
    payload: Bytes,
    timestamp: u32,
    sequence: u16,
    marker: bool,
}

impl MediaBuffer {
    /// Construct a buffer from a payload and its metadata.
    ///
    /// An empty payload yields the explicit empty sentinel (metadata is
    /// discarded), not an error.
    pub fn new(payload: Bytes, timestamp: u32, sequence: u16, marker: bool) -> Self {
        if payload.is_empty() {
            return Self::empty();
        }
        Self {
            payload,
            timestamp,
            sequence,
            marker,
        }
    }

    /// A source media unit: payload only. Timestamp, sequence, and
    /// marker are stamped later by the packetizer.
    pub fn from_payload(payload: Bytes) -> Self {
        Self::new(payload, 0, 0, false)
    }

    /// The explicit "no data" sentinel. `is_valid()` is false only here.
    pub fn empty() -> Self {
        Self {
            payload: Bytes::new(),
            timestamp: 0,
            sequence: 0,
            marker: false,
        }
    }

    /// False only for the empty sentinel.
    pub fn is_valid(&self) -> bool {
        !self.payload.is_empty()
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the buffer, yielding its payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Media-clock timestamp (wraps modulo 2^32 on the wire).
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Sequence number (wraps modulo 2^16).
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Frame-boundary indicator: set on the last fragment of a unit.
    pub fn marker(&self) -> bool {
        self.marker
    }
}

/// Whether sequence number `a` comes after `b`, modulo 2^16.
///
/// True when the forward modular distance from `b` to `a` is nonzero
/// and less than half the sequence space, so 0 is after 65535 and no
/// spurious gap appears across a wrap (RFC 3550 §A.1).
pub fn seq_after(a: u16, b: u16) -> bool {
    a != b && a.wrapping_sub(b) < SEQ_HALF
}

/// Forward modular distance from `from` to `to` (0 when equal).
pub fn seq_distance(from: u16, to: u16) -> u16 {
    to.wrapping_sub(from)
}
