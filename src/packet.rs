//! RTP wire packet serialization and validation (RFC 3550 §5.1).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                             SSRC                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! All header fields are transmitted in network byte order. Packets we
//! emit always have padding, extension, and CSRC count zero; packets we
//! receive may carry CSRC entries or a header extension from other
//! stacks, which [`RtpPacket::parse`] skips over.

use bytes::Bytes;

use crate::error::{MalformedKind, Result, RtpError};

/// Protocol version, always 2.
pub const RTP_VERSION: u8 = 2;

/// Length of the fixed header in bytes.
pub const FIXED_HEADER_LEN: usize = 12;

/// One RTP packet: the fixed-header fields plus the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// Marker bit — last fragment of a media unit.
    pub marker: bool,
    /// 7-bit payload type identifier (RFC 3551).
    pub payload_type: u8,
    /// 16-bit sequence number, wraps per packet.
    pub sequence: u16,
    /// 32-bit media-clock timestamp.
    pub timestamp: u32,
    /// Synchronization source identifier.
    pub ssrc: u32,
    /// Payload bytes (fragment of a media unit).
    pub payload: Bytes,
}

impl RtpPacket {
    /// Serialize the 12-byte fixed header followed by the payload.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FIXED_HEADER_LEN + self.payload.len());
        out.push(RTP_VERSION << 6);
        out.push(((self.marker as u8) << 7) | (self.payload_type & 0x7f));
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.ssrc.to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse and validate a received datagram.
    ///
    /// Rejects datagrams shorter than the fixed header and versions
    /// other than 2. CSRC entries (CC field) and a header extension
    /// (X bit), which this stack never emits but peers may, are skipped;
    /// padding (P bit) is stripped. A length that doesn't add up is
    /// [`MalformedKind::BadExtension`] — the caller drops the packet and
    /// counts it, the stream keeps running.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FIXED_HEADER_LEN {
            return Err(RtpError::MalformedPacket {
                kind: MalformedKind::Truncated,
            });
        }
        if data[0] >> 6 != RTP_VERSION {
            return Err(RtpError::MalformedPacket {
                kind: MalformedKind::BadVersion,
            });
        }

        let padding = data[0] & 0x20 != 0;
        let extension = data[0] & 0x10 != 0;
        let csrc_count = (data[0] & 0x0f) as usize;

        let marker = data[1] & 0x80 != 0;
        let payload_type = data[1] & 0x7f;
        let sequence = u16::from_be_bytes([data[2], data[3]]);
        let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let mut offset = FIXED_HEADER_LEN + 4 * csrc_count;
        if extension {
            // Extension header: 16-bit profile id, 16-bit length in words
            if data.len() < offset + 4 {
                return Err(RtpError::MalformedPacket {
                    kind: MalformedKind::BadExtension,
                });
            }
            let words = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            offset += 4 + 4 * words;
        }

        let mut end = data.len();
        if padding {
            let pad = *data.last().unwrap_or(&0) as usize;
            if pad == 0 || pad > end {
                return Err(RtpError::MalformedPacket {
                    kind: MalformedKind::BadExtension,
                });
            }
            end -= pad;
        }
        if offset > end {
            return Err(RtpError::MalformedPacket {
                kind: MalformedKind::BadExtension,
            });
        }

        Ok(Self {
            marker,
            payload_type,
            sequence,
            timestamp,
            ssrc,
            payload: Bytes::copy_from_slice(&data[offset..end]),
        })
    }
}
