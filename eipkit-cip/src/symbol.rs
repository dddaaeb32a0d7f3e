//! Symbol object (class 0x6B) enumeration helpers.
//!
//! Logix controllers expose their tag table as Symbol instances. Listing
//! walks instance 0 (class attributes: revision, max instance) and then
//! each instance's name/type attributes via Get_Attribute_List.

use crate::message::MessageRouterRequest;
use crate::path::EPath;
use crate::types::{service, DataType};
use bytes::{BufMut, BytesMut};
use eipkit_protocol::ProtocolError;

/// One enumerated controller tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInstance {
    pub instance_id: u32,
    pub name: String,
    pub data_type: DataType,
}

fn attribute_list(path: EPath, attributes: &[u16]) -> MessageRouterRequest {
    let mut data = BytesMut::with_capacity(2 + attributes.len() * 2);
    data.put_u16_le(attributes.len() as u16);
    for attr in attributes {
        data.put_u16_le(*attr);
    }
    MessageRouterRequest::new(service::GET_ATTRIBUTE_LIST, path, data.freeze())
}

/// Get_Attribute_List {1: revision, 2: max instance} on instance 0.
pub fn class_attributes_request() -> MessageRouterRequest {
    attribute_list(EPath::to_object(crate::class::SYMBOL, 0, 0), &[1, 2])
}

/// Get_Attribute_List {1: name, 2: type} on one symbol instance.
pub fn instance_attributes_request(instance_id: u32) -> MessageRouterRequest {
    attribute_list(EPath::to_object(crate::class::SYMBOL, instance_id, 0), &[1, 2])
}

struct AttrReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> AttrReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.data.len() < self.offset + n {
            return Err(ProtocolError::MalformedItem("attribute list"));
        }
        let out = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        let raw = self.take(2)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }
}

/// Decodes the class-level reply into `(revision, max_instance)`.
///
/// Reply layout: `attr_count:u16`, then per attribute
/// `{attr_id:u16, status:u16, value}`. Attributes with a non-zero status
/// carry no value and are skipped.
pub fn decode_class_attributes(data: &[u8]) -> Result<(u16, u16), ProtocolError> {
    let mut r = AttrReader { data, offset: 0 };
    let count = r.u16()?;
    let mut revision = 0;
    let mut max_instance = 0;

    for _ in 0..count {
        let attr_id = r.u16()?;
        let status = r.u16()?;
        if status != 0 {
            continue;
        }
        match attr_id {
            1 => revision = r.u16()?,
            2 => max_instance = r.u16()?,
            _ => return Err(ProtocolError::MalformedItem("attribute list")),
        }
    }

    Ok((revision, max_instance))
}

/// Decodes an instance-level reply into `(name, type_code)`.
pub fn decode_instance_attributes(data: &[u8]) -> Result<(String, DataType), ProtocolError> {
    let mut r = AttrReader { data, offset: 0 };
    let count = r.u16()?;
    let mut name = String::new();
    let mut type_code = DataType(0);

    for _ in 0..count {
        let attr_id = r.u16()?;
        let status = r.u16()?;
        if status != 0 {
            continue;
        }
        match attr_id {
            1 => {
                let len = r.u16()? as usize;
                let raw = r.take(len)?;
                name = String::from_utf8_lossy(raw).into_owned();
            }
            2 => type_code = DataType(r.u16()?),
            _ => return Err(ProtocolError::MalformedItem("attribute list")),
        }
    }

    Ok((name, type_code))
}
