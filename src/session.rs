//! Per-stream session parameters and the media clock.
//!
//! One [`RtpSession`] exists per logical direction of one media stream.
//! Its parameters come from session establishment (signaling is an
//! external collaborator) and are immutable for the stream's lifetime,
//! so it can be shared freely across the send and receive loops behind
//! an `Arc` with no locking.
//!
//! The running counters live in [`RtpClock`], a separate type owned
//! exclusively by the send-side packetizer — mutation rights are
//! enforced by ownership rather than convention.

use std::net::{Ipv4Addr, SocketAddr};

use rand::RngExt;

/// Parameters negotiated at session establishment (all immutable).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Destination address for outbound packets.
    pub remote_addr: SocketAddr,
    /// Local bind address (`0.0.0.0:0` picks an ephemeral port).
    pub local_addr: SocketAddr,
    /// Negotiated payload type identifier (RFC 3551; dynamic 96–127).
    pub payload_type: u8,
    /// Media clock rate in ticks per second (90 kHz for video, RFC 3551 §4).
    pub clock_rate: u32,
    /// Maximum payload bytes per packet; oversized units are fragmented.
    pub max_payload: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            remote_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 5004)),
            local_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            payload_type: 96,
            clock_rate: 90_000,
            max_payload: 1400,
        }
    }
}

/// Immutable per-direction session state.
///
/// The SSRC is chosen randomly at creation (RFC 3550 §8.1) and stays
/// stable for the stream's lifetime.
#[derive(Debug)]
pub struct RtpSession {
    ssrc: u32,
    payload_type: u8,
    clock_rate: u32,
    max_payload: usize,
}

impl RtpSession {
    pub fn new(config: &SessionConfig) -> Self {
        let ssrc = rand::rng().random::<u32>();
        tracing::debug!(
            ssrc = format_args!("{:#010X}", ssrc),
            payload_type = config.payload_type,
            clock_rate = config.clock_rate,
            max_payload = config.max_payload,
            "session created"
        );
        Self {
            ssrc,
            payload_type: config.payload_type,
            clock_rate: config.clock_rate,
            max_payload: config.max_payload,
        }
    }

    /// Synchronization source identifier for this stream.
    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    /// Media clock rate in ticks per second.
    pub fn clock_rate(&self) -> u32 {
        self.clock_rate
    }

    /// Maximum payload bytes per packet.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }
}

/// Running sequence and timestamp counters for the send side.
///
/// The sequence number starts at a random value (RFC 3550 §5.1) and
/// increments by one per packet, wrapping at 2^16. The timestamp is
/// held as u64 internally so duration arithmetic never has to reason
/// about the 2^32 wrap; the lower 32 bits go on the wire.
#[derive(Debug)]
pub struct RtpClock {
    sequence: u16,
    timestamp: u64,
}

impl RtpClock {
    pub fn new() -> Self {
        Self {
            sequence: rand::rng().random::<u16>(),
            timestamp: 0,
        }
    }

    /// Sequence number of the next packet (not yet consumed).
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Wire timestamp for the current media unit.
    pub fn timestamp(&self) -> u32 {
        self.timestamp as u32
    }

    /// Consume and return the next sequence number.
    pub fn next_sequence(&mut self) -> u16 {
        let seq = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        seq
    }

    /// Advance the timestamp by a media unit's duration in clock ticks.
    pub fn advance_timestamp(&mut self, ticks: u32) {
        self.timestamp = self.timestamp.wrapping_add(ticks as u64);
    }
}

impl Default for RtpClock {
    fn default() -> Self {
        Self::new()
    }
}
