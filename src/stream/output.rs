//! Send pipeline: media units in, datagrams out.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::buffer::MediaBuffer;
use crate::error::{Result, RtpError};
use crate::packet::RtpPacket;
use crate::packetizer::Packetizer;
use crate::session::{RtpSession, SessionConfig};
use crate::stats::StreamStats;
use crate::stream::{ProcessorOutputStream, WriteOutcome};
use crate::transport::{RtpSocket, SendOutcome};

/// The composed send chain: Packetizer → wire serialization → socket.
///
/// Once a unit is packetized its sequence numbers are spent, so
/// fragments the socket would not take are kept in a FIFO and drained
/// before anything newer — the adapter always sees strictly increasing
/// sequence numbers. Backpressure is only reported *before* a new unit
/// is committed: [`WriteOutcome::WouldBlock`] hands the unit back
/// untouched and nothing is re-stamped on retry.
///
/// Confined to the send loop; the only state shared with other threads
/// is the immutable session and the atomic counters.
pub struct RtpOutputStream {
    config: SessionConfig,
    session: Arc<RtpSession>,
    packetizer: Packetizer,
    socket: Option<RtpSocket>,
    pending: VecDeque<Vec<u8>>,
    stats: Arc<StreamStats>,
}

impl RtpOutputStream {
    pub fn new(config: SessionConfig, session: Arc<RtpSession>, stats: Arc<StreamStats>) -> Self {
        let packetizer = Packetizer::new(session.clone());
        Self {
            config,
            session,
            packetizer,
            socket: None,
            pending: VecDeque::new(),
            stats,
        }
    }

    /// Sequence number the next packet will carry.
    pub fn next_sequence(&self) -> u16 {
        self.packetizer.clock().sequence()
    }

    /// Timestamp the next media unit will carry.
    pub fn next_timestamp(&self) -> u32 {
        self.packetizer.clock().timestamp()
    }

    /// Serialized fragments waiting for socket room.
    pub fn pending_packets(&self) -> usize {
        self.pending.len()
    }

    /// Try to drain the pending FIFO. Returns true once it is empty.
    ///
    /// The caller's retry schedule decides when to call this after a
    /// [`WriteOutcome::WouldBlock`].
    pub fn flush(&mut self) -> Result<bool> {
        let socket = self.socket.as_ref().ok_or(RtpError::NotOpen)?;
        while let Some(datagram) = self.pending.front() {
            match socket.try_send(datagram)? {
                SendOutcome::Sent(_) => {
                    self.pending.pop_front();
                    self.stats.packets_sent.fetch_add(1, Ordering::Relaxed);
                }
                SendOutcome::WouldBlock => return Ok(false),
            }
        }
        Ok(true)
    }

    fn serialize(&self, fragment: &MediaBuffer) -> Vec<u8> {
        RtpPacket {
            marker: fragment.marker(),
            payload_type: self.session.payload_type(),
            sequence: fragment.sequence(),
            timestamp: fragment.timestamp(),
            ssrc: self.session.ssrc(),
            payload: fragment.payload().clone(),
        }
        .serialize()
    }
}

impl ProcessorOutputStream for RtpOutputStream {
    fn open(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Err(RtpError::AlreadyOpen);
        }
        let socket = RtpSocket::connect(self.config.local_addr, self.config.remote_addr)?;
        tracing::info!(
            remote = %self.config.remote_addr,
            ssrc = format_args!("{:#010X}", self.session.ssrc()),
            "output stream open"
        );
        self.socket = Some(socket);
        Ok(())
    }

    fn write(&mut self, unit: MediaBuffer, duration_ticks: u32) -> Result<WriteOutcome> {
        if self.socket.is_none() {
            return Err(RtpError::NotOpen);
        }

        // Earlier fragments first; if the transport is still saturated
        // the unit goes back to the caller unconsumed.
        if !self.flush()? {
            return Ok(WriteOutcome::WouldBlock(unit));
        }

        if !unit.is_valid() {
            return Ok(WriteOutcome::Sent);
        }

        let fragments = self.packetizer.packetize(unit.into_payload(), duration_ticks);
        let socket = self.socket.as_ref().ok_or(RtpError::NotOpen)?;

        for fragment in &fragments {
            let datagram = self.serialize(fragment);
            if !self.pending.is_empty() {
                self.pending.push_back(datagram);
                continue;
            }
            match socket.try_send(&datagram)? {
                SendOutcome::Sent(_) => {
                    self.stats.packets_sent.fetch_add(1, Ordering::Relaxed);
                }
                SendOutcome::WouldBlock => self.pending.push_back(datagram),
            }
        }

        if !self.pending.is_empty() {
            tracing::trace!(queued = self.pending.len(), "socket full, fragments queued");
        }
        Ok(WriteOutcome::Sent)
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            tracing::info!("output stream closed");
        }
        self.pending.clear();
    }
}
