//! Error types for the RTP streaming engine.

use std::fmt;

/// Errors that can occur in the streaming pipeline.
///
/// Variants map to the failure modes of the stack:
///
/// - **Transport acquisition**: [`TransportUnavailable`](Self::TransportUnavailable) —
///   the socket could not be bound at `open()`. Fatal to the stream
///   instance; the caller must recreate it.
/// - **Transport I/O**: [`NetworkFailure`](Self::NetworkFailure) — a single
///   send/receive attempt failed. Reported per call, never retried here;
///   retry policy belongs to the session layer.
/// - **Protocol**: [`MalformedPacket`](Self::MalformedPacket) — received
///   bytes failed header validation. The packet is dropped and counted;
///   the stream keeps running.
/// - **Lifecycle**: [`AlreadyOpen`](Self::AlreadyOpen),
///   [`NotOpen`](Self::NotOpen) — violations of the open/write/close
///   contract.
///
/// Backpressure (`WouldBlock`) is deliberately *not* an error — it is the
/// expected non-blocking signal, carried in
/// [`WriteOutcome`](crate::stream::WriteOutcome) and
/// [`SendOutcome`](crate::transport::SendOutcome).
#[derive(Debug, thiserror::Error)]
pub enum RtpError {
    /// Socket acquisition failed at `open()`.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(#[source] std::io::Error),

    /// A single send/receive attempt was rejected by the transport.
    #[error("network failure: {0}")]
    NetworkFailure(#[source] std::io::Error),

    /// Received bytes failed RTP header validation (RFC 3550 §5.1).
    #[error("malformed packet: {kind}")]
    MalformedPacket { kind: MalformedKind },

    /// `open()` was called twice without an intervening `close()`.
    #[error("stream already open")]
    AlreadyOpen,

    /// `write()`/`read()` was called before `open()`.
    #[error("stream not open")]
    NotOpen,
}

/// Specific kind of RTP header validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedKind {
    /// Datagram shorter than the 12-byte fixed header.
    Truncated,
    /// Version field was not 2.
    BadVersion,
    /// CSRC list or header extension extends past the datagram.
    BadExtension,
}

impl fmt::Display for MalformedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated header"),
            Self::BadVersion => write!(f, "unsupported version"),
            Self::BadExtension => write!(f, "bad csrc/extension length"),
        }
    }
}

/// Convenience alias for `Result<T, RtpError>`.
pub type Result<T> = std::result::Result<T, RtpError>;
