use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use crate::error::{Result, RtpError};

/// Result of a non-blocking send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The datagram was handed to the OS (`n` bytes).
    Sent(usize),
    /// The socket buffer is full; retry is the caller's job.
    WouldBlock,
}

/// Result of a non-blocking receive attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    /// One datagram of `n` bytes was read into the caller's buffer.
    Datagram(usize),
    /// Nothing waiting.
    Empty,
}

/// Non-blocking UDP socket for one direction of one stream.
///
/// Deliberately address-only: it knows nothing about sessions or
/// packet contents. Bind/connect failures are
/// [`TransportUnavailable`](RtpError::TransportUnavailable) (fatal to
/// the stream instance); per-call I/O errors are
/// [`NetworkFailure`](RtpError::NetworkFailure), reported and never
/// retried here.
#[derive(Debug)]
pub struct RtpSocket {
    socket: UdpSocket,
}

impl RtpSocket {
    /// Bind a receive socket on `local`. Accepts datagrams from any
    /// source; the pipeline filters by SSRC and payload type.
    pub fn bind(local: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local).map_err(RtpError::TransportUnavailable)?;
        socket
            .set_nonblocking(true)
            .map_err(RtpError::TransportUnavailable)?;
        let local = socket.local_addr().map_err(RtpError::TransportUnavailable)?;
        tracing::debug!(%local, "receive socket bound");
        Ok(Self { socket })
    }

    /// Bind on `local` and connect to `remote` for a send socket.
    pub fn connect(local: SocketAddr, remote: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local).map_err(RtpError::TransportUnavailable)?;
        socket
            .connect(remote)
            .map_err(RtpError::TransportUnavailable)?;
        socket
            .set_nonblocking(true)
            .map_err(RtpError::TransportUnavailable)?;
        tracing::debug!(%remote, "send socket connected");
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(RtpError::NetworkFailure)
    }

    /// Attempt to send one datagram without blocking.
    pub fn try_send(&self, datagram: &[u8]) -> Result<SendOutcome> {
        match self.socket.send(datagram) {
            Ok(n) => Ok(SendOutcome::Sent(n)),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(SendOutcome::WouldBlock),
            Err(e) => Err(RtpError::NetworkFailure(e)),
        }
    }

    /// Attempt to receive one datagram into `buf` without blocking.
    pub fn try_recv(&self, buf: &mut [u8]) -> Result<RecvOutcome> {
        match self.socket.recv_from(buf) {
            Ok((n, _src)) => Ok(RecvOutcome::Datagram(n)),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(RecvOutcome::Empty),
            Err(e) => Err(RtpError::NetworkFailure(e)),
        }
    }
}
