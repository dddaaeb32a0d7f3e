//! Message-router request and response records.

use crate::path::EPath;
use crate::types::service;
use bytes::{BufMut, Bytes, BytesMut};
use eipkit_protocol::ProtocolError;

/// A request routed to a CIP object.
///
/// Wire layout: `service:u8, path_words:u8, path bytes, service data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRouterRequest {
    pub service: u8,
    pub path: EPath,
    pub data: Bytes,
}

impl MessageRouterRequest {
    pub fn new(service: u8, path: EPath, data: impl Into<Bytes>) -> Self {
        Self {
            service,
            path,
            data: data.into(),
        }
    }

    /// A Get_Attribute_Single request for the given path.
    pub fn get_attribute_single(path: EPath) -> Self {
        Self::new(service::GET_ATTRIBUTE_SINGLE, path, Bytes::new())
    }

    /// A Set_Attribute_Single request for the given path.
    pub fn set_attribute_single(path: EPath, data: impl Into<Bytes>) -> Self {
        Self::new(service::SET_ATTRIBUTE_SINGLE, path, data)
    }

    /// A Logix Read Tag request (`element_count` elements).
    pub fn read_tag(path: EPath, element_count: u16) -> Self {
        Self::new(
            service::READ_TAG,
            path,
            Bytes::copy_from_slice(&element_count.to_le_bytes()),
        )
    }

    /// A Logix Write Tag request.
    pub fn write_tag(path: EPath, type_code: u16, element_count: u16, value: &[u8]) -> Self {
        let mut data = BytesMut::with_capacity(4 + value.len());
        data.put_u16_le(type_code);
        data.put_u16_le(element_count);
        data.put_slice(value);
        Self::new(service::WRITE_TAG, path, data.freeze())
    }

    pub fn encode(&self) -> BytesMut {
        let path = self.path.as_bytes();
        let mut buf = BytesMut::with_capacity(2 + path.len() + self.data.len());
        buf.put_u8(self.service);
        buf.put_u8(self.path.len_words());
        buf.put_slice(path);
        buf.put_slice(&self.data);
        buf
    }

    /// Decodes a request from a complete byte slice (target side).
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < 2 {
            return Err(ProtocolError::ShortRead {
                needed: 2 - data.len(),
            });
        }
        let service = data[0];
        let path_len = data[1] as usize * 2;
        if data.len() < 2 + path_len {
            return Err(ProtocolError::ShortRead {
                needed: 2 + path_len - data.len(),
            });
        }
        Ok(Self {
            service,
            path: EPath::from(&data[2..2 + path_len]),
            data: Bytes::copy_from_slice(&data[2 + path_len..]),
        })
    }
}

/// A response from a CIP object.
///
/// Wire layout: `service|0x80, reserved:u8, general_status:u8,
/// ext_status_size:u8, ext_status words, response data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRouterResponse {
    pub service: u8,
    pub general_status: u8,
    pub ext_status: Vec<u16>,
    pub data: Bytes,
}

impl MessageRouterResponse {
    pub fn is_success(&self) -> bool {
        self.general_status == 0
    }

    /// Returns a structured error if the response carries a non-zero status.
    pub fn cip_error(&self) -> Result<(), crate::error::CipError> {
        if self.is_success() {
            return Ok(());
        }
        Err(crate::error::CipError {
            status: self.general_status,
            ext_status: self.ext_status.clone(),
        })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf =
            BytesMut::with_capacity(4 + self.ext_status.len() * 2 + self.data.len());
        buf.put_u8(self.service);
        buf.put_u8(0); // reserved
        buf.put_u8(self.general_status);
        buf.put_u8(self.ext_status.len() as u8);
        for word in &self.ext_status {
            buf.put_u16_le(*word);
        }
        buf.put_slice(&self.data);
        buf
    }

    /// Decodes a response from a complete byte slice (originator side).
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < 4 {
            return Err(ProtocolError::ShortRead {
                needed: 4 - data.len(),
            });
        }
        let service = data[0];
        let general_status = data[2];
        let ext_count = data[3] as usize;
        let ext_end = 4 + ext_count * 2;
        if data.len() < ext_end {
            return Err(ProtocolError::ShortRead {
                needed: ext_end - data.len(),
            });
        }
        let ext_status = data[4..ext_end]
            .chunks_exact(2)
            .map(|w| u16::from_le_bytes([w[0], w[1]]))
            .collect();
        Ok(Self {
            service,
            general_status,
            ext_status,
            data: Bytes::copy_from_slice(&data[ext_end..]),
        })
    }
}
