//! Common Packet Format container.
//!
//! A CPF is `item_count:u16` followed by `item_count` records of
//! `{type_id:u16, length:u16, data:length bytes}`, little-endian.

use crate::error::ProtocolError;
use bytes::{BufMut, Bytes, BytesMut};

/// Recognised CPF item type ids.
pub mod item_type {
    pub const NULL_ADDRESS: u16 = 0x0000;
    pub const LIST_IDENTITY: u16 = 0x000C;
    pub const CONNECTED_ADDRESS: u16 = 0x00A1;
    pub const CONNECTED_DATA: u16 = 0x00B1;
    pub const UNCONNECTED_MESSAGE: u16 = 0x00B2;
    pub const LIST_SERVICES: u16 = 0x0100;
    pub const SOCKADDR_INFO: u16 = 0x8000;
    pub const SEQUENCED_ADDRESS: u16 = 0x8002;
}

/// A single CPF item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpfItem {
    pub type_id: u16,
    pub data: Bytes,
}

impl CpfItem {
    pub fn new(type_id: u16, data: impl Into<Bytes>) -> Self {
        Self {
            type_id,
            data: data.into(),
        }
    }

    /// A zero-length Null Address item.
    pub fn null_address() -> Self {
        Self::new(item_type::NULL_ADDRESS, Bytes::new())
    }

    /// A Connected Address item carrying a 4-byte connection id.
    pub fn connected_address(connection_id: u32) -> Self {
        Self::new(
            item_type::CONNECTED_ADDRESS,
            Bytes::copy_from_slice(&connection_id.to_le_bytes()),
        )
    }

    /// Reads this item's payload as a 4-byte connection id.
    pub fn connection_id(&self) -> Option<u32> {
        let raw: [u8; 4] = self.data.as_ref().try_into().ok()?;
        Some(u32::from_le_bytes(raw))
    }

    fn put(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.type_id);
        buf.put_u16_le(self.data.len() as u16);
        buf.put_slice(&self.data);
    }
}

/// An ordered CPF item list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cpf {
    pub items: Vec<CpfItem>,
}

impl Cpf {
    pub fn new(items: Vec<CpfItem>) -> Self {
        Self { items }
    }

    /// Encodes the item list.
    pub fn encode(&self) -> BytesMut {
        let body: usize = self.items.iter().map(|i| 4 + i.data.len()).sum();
        let mut buf = BytesMut::with_capacity(2 + body);
        buf.put_u16_le(self.items.len() as u16);
        for item in &self.items {
            item.put(&mut buf);
        }
        buf
    }

    /// Decodes an item list, enforcing that every declared item length is
    /// consumable from the input.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < 2 {
            return Err(ProtocolError::MalformedCpf);
        }
        let count = u16::from_le_bytes([data[0], data[1]]) as usize;
        let mut offset = 2;
        let mut items = Vec::with_capacity(count);

        for _ in 0..count {
            if data.len() < offset + 4 {
                return Err(ProtocolError::MalformedCpf);
            }
            let type_id = u16::from_le_bytes([data[offset], data[offset + 1]]);
            let length = u16::from_le_bytes([data[offset + 2], data[offset + 3]]) as usize;
            offset += 4;

            if data.len() < offset + length {
                return Err(ProtocolError::MalformedCpf);
            }
            items.push(CpfItem::new(
                type_id,
                Bytes::copy_from_slice(&data[offset..offset + length]),
            ));
            offset += length;
        }

        Ok(Self { items })
    }

    /// Returns the first item with the given type id.
    pub fn find(&self, type_id: u16) -> Option<&CpfItem> {
        self.items.iter().find(|item| item.type_id == type_id)
    }
}
