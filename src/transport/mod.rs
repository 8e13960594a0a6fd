//! Network adapter for RTP media delivery.
//!
//! Media travels over UDP ([`udp`]): one non-blocking socket per
//! direction. The adapter exposes exactly two capabilities —
//! try-send and try-receive — and never buffers on the pipeline's
//! behalf beyond the OS socket buffer; backpressure is surfaced to
//! the caller as [`SendOutcome::WouldBlock`].

pub mod udp;

pub use udp::{RecvOutcome, RtpSocket, SendOutcome};
