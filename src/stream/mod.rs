//! Stream processor contracts and the composed pipelines.
//!
//! A stream processor is one pipeline stage: it consumes buffers from
//! an upstream source and/or produces buffers for a downstream sink.
//! Concrete stages are composed into a typed chain once at session
//! start — [`output::RtpOutputStream`] for the send direction
//! (packetize → serialize → socket) and [`input::RtpInputStream`] for
//! the receive direction (socket → validate → jitter buffer →
//! depacketize).
//!
//! Both contracts are strictly non-blocking: `write` never waits for
//! network readiness and `read` never waits for data. Backpressure and
//! data starvation are ordinary return values, not errors.

pub mod input;
pub mod output;

pub use input::RtpInputStream;
pub use output::RtpOutputStream;

use crate::buffer::MediaBuffer;
use crate::depacketizer::ReceiverEvent;
use crate::error::Result;

/// Result of a non-blocking media-unit write.
#[derive(Debug)]
pub enum WriteOutcome {
    /// The unit was packetized and accepted (fully sent or queued for
    /// the next flush).
    Sent,
    /// The transport is saturated; the unit is handed back untouched
    /// and the caller schedules the retry.
    WouldBlock(MediaBuffer),
}

/// Send side of a media stream.
///
/// `open` acquires the transport (fails with
/// [`TransportUnavailable`](crate::RtpError::TransportUnavailable);
/// calling it twice without `close` is
/// [`AlreadyOpen`](crate::RtpError::AlreadyOpen)). `write` returns
/// immediately — success does not mean the bytes left the process.
/// A [`NetworkFailure`](crate::RtpError::NetworkFailure) is reported
/// per call, never retried internally: retry policy belongs to the
/// session layer. `close` is best-effort and safe to repeat; release
/// errors are swallowed since the resource is being discarded.
pub trait ProcessorOutputStream: Send {
    fn open(&mut self) -> Result<()>;

    /// Write one media unit with its duration in media-clock ticks.
    fn write(&mut self, unit: MediaBuffer, duration_ticks: u32) -> Result<WriteOutcome>;

    fn close(&mut self);
}

/// Receive side of a media stream.
///
/// `read` yields the next reassembled unit or loss notification, or
/// `None` when nothing is ready — the caller must not block on it.
/// `open`/`close` as on [`ProcessorOutputStream`].
pub trait ProcessorInputStream: Send {
    fn open(&mut self) -> Result<()>;

    fn read(&mut self) -> Result<Option<ReceiverEvent>>;

    fn close(&mut self);
}
