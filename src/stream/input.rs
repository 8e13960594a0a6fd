//! Receive pipeline: datagrams in, media units out.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use crate::buffer::MediaBuffer;
use crate::depacketizer::{Depacketizer, ReceiverEvent};
use crate::error::{Result, RtpError};
use crate::jitter::{JitterBuffer, JitterConfig};
use crate::packet::RtpPacket;
use crate::session::{RtpSession, SessionConfig};
use crate::stats::StreamStats;
use crate::stream::ProcessorInputStream;
use crate::transport::{RecvOutcome, RtpSocket};

/// The composed receive chain: socket → validate → JitterBuffer →
/// Depacketizer.
///
/// Each [`read`](ProcessorInputStream::read) is one cooperative tick:
/// drain whatever the socket has, run the jitter buffer against the
/// current instant, feed the depacketizer, and hand out the next queued
/// event. Malformed datagrams are dropped and counted, never fatal.
/// The stream locks onto the first SSRC it sees and drops packets from
/// foreign sources or payload types.
///
/// Confined to the receive loop. After [`close`](ProcessorInputStream::close)
/// returns, pending jitter entries are released and nothing more is
/// delivered.
pub struct RtpInputStream {
    config: SessionConfig,
    session: Arc<RtpSession>,
    socket: Option<RtpSocket>,
    jitter: JitterBuffer,
    depacketizer: Depacketizer,
    queue: VecDeque<ReceiverEvent>,
    recv_buf: Vec<u8>,
    remote_ssrc: Option<u32>,
    stats: Arc<StreamStats>,
}

impl RtpInputStream {
    pub fn new(
        config: SessionConfig,
        session: Arc<RtpSession>,
        jitter_config: JitterConfig,
        stats: Arc<StreamStats>,
    ) -> Self {
        // Room for the fixed header plus contributing-source entries
        // and an extension from less frugal peers.
        let recv_buf = vec![0u8; config.max_payload + 128];
        Self {
            config,
            session,
            socket: None,
            jitter: JitterBuffer::new(jitter_config, stats.clone()),
            depacketizer: Depacketizer::new(stats.clone()),
            queue: VecDeque::new(),
            recv_buf,
            remote_ssrc: None,
            stats,
        }
    }

    /// When the next tick could deliver more than now; `None` while
    /// nothing is pending. Lets a cooperative scheduler sleep instead
    /// of spinning.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.jitter.next_deadline()
    }

    /// Pending entries currently held for reordering.
    pub fn jitter_occupancy(&self) -> usize {
        self.jitter.occupancy()
    }

    fn accept(&mut self, packet: RtpPacket, now: Instant) {
        if packet.payload_type != self.session.payload_type() {
            self.stats.foreign_dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(pt = packet.payload_type, "foreign payload type dropped");
            return;
        }
        match self.remote_ssrc {
            None => {
                self.remote_ssrc = Some(packet.ssrc);
                tracing::debug!(
                    ssrc = format_args!("{:#010X}", packet.ssrc),
                    "locked onto remote source"
                );
            }
            Some(ssrc) if ssrc != packet.ssrc => {
                self.stats.foreign_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(
                    ssrc = format_args!("{:#010X}", packet.ssrc),
                    "foreign source dropped"
                );
                return;
            }
            Some(_) => {}
        }

        let buffer = MediaBuffer::new(
            packet.payload,
            packet.timestamp,
            packet.sequence,
            packet.marker,
        );
        self.jitter.push(buffer, now);
    }

    /// Drain the socket into the jitter buffer.
    fn drain_socket(&mut self, now: Instant) -> Result<()> {
        loop {
            let outcome = match self.socket.as_ref() {
                Some(socket) => socket.try_recv(&mut self.recv_buf)?,
                None => break,
            };
            let n = match outcome {
                RecvOutcome::Empty => break,
                RecvOutcome::Datagram(n) => n,
            };
            self.stats.packets_received.fetch_add(1, Ordering::Relaxed);
            match RtpPacket::parse(&self.recv_buf[..n]) {
                Ok(packet) => self.accept(packet, now),
                Err(e) => {
                    self.stats.malformed_dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(error = %e, bytes = n, "datagram dropped");
                }
            }
        }
        Ok(())
    }
}

impl ProcessorInputStream for RtpInputStream {
    fn open(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Err(RtpError::AlreadyOpen);
        }
        let socket = RtpSocket::bind(self.config.local_addr)?;
        tracing::info!(local = %socket.local_addr()?, "input stream open");
        self.socket = Some(socket);
        Ok(())
    }

    fn read(&mut self) -> Result<Option<ReceiverEvent>> {
        if self.socket.is_none() {
            return Err(RtpError::NotOpen);
        }

        let now = Instant::now();
        self.drain_socket(now)?;
        for event in self.jitter.poll(now) {
            self.queue.extend(self.depacketizer.handle(event));
        }
        Ok(self.queue.pop_front())
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            tracing::info!("input stream closed");
        }
        self.jitter.clear();
        self.depacketizer.reset();
        self.queue.clear();
    }
}
