pub mod buffer;
pub mod depacketizer;
pub mod error;
pub mod jitter;
pub mod packet;
pub mod packetizer;
pub mod session;
pub mod stats;
pub mod stream;
pub mod transport;

pub use buffer::MediaBuffer;
pub use depacketizer::{ReceiverEvent, UnitLoss};
pub use error::{Result, RtpError};
pub use jitter::JitterConfig;
pub use session::{RtpSession, SessionConfig};
pub use stats::{StatsSnapshot, StreamStats};
pub use stream::{
    ProcessorInputStream, ProcessorOutputStream, RtpInputStream, RtpOutputStream, WriteOutcome,
};
