//! Encapsulation frame format.
//!
//! Frame layout (24-byte header + payload, all fields little-endian):
//!
//! ```text
//! +---------+--------+----------------+--------+----------------+---------+
//! | command | length | session_handle | status | sender_context | options |
//! | 2 bytes | 2 bytes|    4 bytes     | 4 bytes|    8 bytes     | 4 bytes |
//! +---------+--------+----------------+--------+----------------+---------+
//! | payload: length bytes                                                 |
//! +-----------------------------------------------------------------------+
//! ```

use crate::command::EncapCommand;
use crate::error::ProtocolError;
use crate::MAX_PACKET_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the fixed encapsulation header in bytes.
pub const HEADER_SIZE: usize = 24;

/// The 24-byte encapsulation header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncapHeader {
    pub command: EncapCommand,
    /// Number of payload bytes following the header.
    pub length: u16,
    pub session_handle: u32,
    pub status: u32,
    /// Opaque context, echoed unchanged in the reply.
    pub sender_context: [u8; 8],
    pub options: u32,
}

impl EncapHeader {
    pub fn new(command: EncapCommand, session_handle: u32, length: u16) -> Self {
        Self {
            command,
            length,
            session_handle,
            status: 0,
            sender_context: [0; 8],
            options: 0,
        }
    }

    /// Writes the header fields in wire order.
    pub fn put(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.command.0);
        buf.put_u16_le(self.length);
        buf.put_u32_le(self.session_handle);
        buf.put_u32_le(self.status);
        buf.put_slice(&self.sender_context);
        buf.put_u32_le(self.options);
    }

    /// Parses a header from exactly [`HEADER_SIZE`] bytes.
    pub fn from_bytes(raw: &[u8; HEADER_SIZE]) -> Self {
        let mut ctx = [0u8; 8];
        ctx.copy_from_slice(&raw[12..20]);
        Self {
            command: EncapCommand(u16::from_le_bytes([raw[0], raw[1]])),
            length: u16::from_le_bytes([raw[2], raw[3]]),
            session_handle: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
            status: u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
            sender_context: ctx,
            options: u32::from_le_bytes([raw[20], raw[21], raw[22], raw[23]]),
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        self.put(&mut buf);
        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(&buf);
        out
    }
}

impl std::fmt::Display for EncapHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cmd={} ({:#06X}) len={} session={:#010X} status={:#010X}",
            self.command, self.command.0, self.length, self.session_handle, self.status
        )
    }
}

/// A full encapsulation frame: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: EncapHeader,
    pub payload: Bytes,
}

impl Packet {
    /// Creates a request packet; `length` is derived from the payload.
    pub fn new(command: EncapCommand, session_handle: u32, payload: Bytes) -> Self {
        Self {
            header: EncapHeader::new(command, session_handle, payload.len() as u16),
            payload,
        }
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        if self.payload.len() > MAX_PACKET_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: self.payload.len(),
                max: MAX_PACKET_SIZE,
            });
        }
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        let mut header = self.header;
        header.length = self.payload.len() as u16;
        header.put(&mut buf);
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    /// Decodes a frame from a streaming buffer.
    ///
    /// Returns `Ok(Some(packet))` if a complete frame was consumed,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let length = u16::from_le_bytes([buf[2], buf[3]]) as usize;
        if length > MAX_PACKET_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: length,
                max: MAX_PACKET_SIZE,
            });
        }
        if buf.len() < HEADER_SIZE + length {
            return Ok(None);
        }

        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&buf[..HEADER_SIZE]);
        buf.advance(HEADER_SIZE);
        let payload = buf.split_to(length).freeze();

        Ok(Some(Self {
            header: EncapHeader::from_bytes(&raw),
            payload,
        }))
    }

    /// Decodes a frame from a complete byte slice, failing on truncation.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::ShortRead {
                needed: HEADER_SIZE - data.len(),
            });
        }
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&data[..HEADER_SIZE]);
        let header = EncapHeader::from_bytes(&raw);

        let want = HEADER_SIZE + header.length as usize;
        if data.len() < want {
            return Err(ProtocolError::ShortRead {
                needed: want - data.len(),
            });
        }

        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(&data[HEADER_SIZE..want]),
        })
    }
}
