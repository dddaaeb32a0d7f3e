//! ListIdentity and ListServices reply item layouts.

use crate::cpf::item_type;
use crate::error::ProtocolError;
use bytes::{BufMut, BytesMut};

/// One CIP identity item from a ListIdentity reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityItem {
    pub encap_version: u16,
    /// BSD-style `sockaddr_in`: family LE u16, port BE u16, address BE u32,
    /// eight zero bytes.
    pub socket_addr: [u8; 16],
    pub vendor_id: u16,
    pub device_type: u16,
    pub product_code: u16,
    pub revision_major: u8,
    pub revision_minor: u8,
    pub status: u16,
    pub serial_number: u32,
    pub product_name: String,
    pub state: u8,
}

impl IdentityItem {
    /// Encodes this item including its type id and length prefix.
    pub fn put(&self, buf: &mut BytesMut) {
        let name = self.product_name.as_bytes();
        let body_len = 2 + 16 + 2 + 2 + 2 + 2 + 2 + 4 + 1 + name.len() + 1;
        buf.put_u16_le(item_type::LIST_IDENTITY);
        buf.put_u16_le(body_len as u16);
        buf.put_u16_le(self.encap_version);
        buf.put_slice(&self.socket_addr);
        buf.put_u16_le(self.vendor_id);
        buf.put_u16_le(self.device_type);
        buf.put_u16_le(self.product_code);
        buf.put_u8(self.revision_major);
        buf.put_u8(self.revision_minor);
        buf.put_u16_le(self.status);
        buf.put_u32_le(self.serial_number);
        buf.put_u8(name.len() as u8);
        buf.put_slice(name);
        buf.put_u8(self.state);
    }
}

/// One service item from a ListServices reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicesItem {
    pub version: u16,
    pub capability_flags: u16,
    /// NUL-trimmed service name (16 bytes on the wire).
    pub name: String,
}

impl ServicesItem {
    pub fn put(&self, buf: &mut BytesMut) {
        buf.put_u16_le(item_type::LIST_SERVICES);
        buf.put_u16_le(2 + 2 + 16);
        buf.put_u16_le(self.version);
        buf.put_u16_le(self.capability_flags);
        let mut name = [0u8; 16];
        let n = self.name.as_bytes().len().min(16);
        name[..n].copy_from_slice(&self.name.as_bytes()[..n]);
        buf.put_slice(&name);
    }
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], ProtocolError> {
        if self.data.len() < self.offset + n {
            return Err(ProtocolError::MalformedItem(what));
        }
        let out = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(out)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, ProtocolError> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, ProtocolError> {
        let raw = self.take(2, what)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, ProtocolError> {
        let raw = self.take(4, what)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }
}

/// Decodes a ListIdentity reply payload. Items with unrecognised type ids
/// are skipped by their declared length.
pub fn decode_identity_items(data: &[u8]) -> Result<Vec<IdentityItem>, ProtocolError> {
    let mut r = Reader::new(data);
    let count = r.u16("identity")?;
    let mut items = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let type_id = r.u16("identity")?;
        let length = r.u16("identity")?;

        if type_id != item_type::LIST_IDENTITY {
            r.take(length as usize, "identity")?;
            continue;
        }

        let encap_version = r.u16("identity")?;
        let socket_addr: [u8; 16] = r
            .take(16, "identity")?
            .try_into()
            .expect("slice length checked");
        let vendor_id = r.u16("identity")?;
        let device_type = r.u16("identity")?;
        let product_code = r.u16("identity")?;
        let revision_major = r.u8("identity")?;
        let revision_minor = r.u8("identity")?;
        let status = r.u16("identity")?;
        let serial_number = r.u32("identity")?;
        let name_len = r.u8("identity")? as usize;
        let name = r.take(name_len, "identity")?;
        let state = r.u8("identity")?;

        items.push(IdentityItem {
            encap_version,
            socket_addr,
            vendor_id,
            device_type,
            product_code,
            revision_major,
            revision_minor,
            status,
            serial_number,
            product_name: String::from_utf8_lossy(name).into_owned(),
            state,
        });
    }

    Ok(items)
}

/// Decodes a ListServices reply payload.
pub fn decode_services_items(data: &[u8]) -> Result<Vec<ServicesItem>, ProtocolError> {
    let mut r = Reader::new(data);
    let count = r.u16("services")?;
    let mut items = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let _type_id = r.u16("services")?;
        let _length = r.u16("services")?;
        let version = r.u16("services")?;
        let capability_flags = r.u16("services")?;
        let name = r.take(16, "services")?;
        let end = name.iter().position(|&b| b == 0).unwrap_or(16);
        items.push(ServicesItem {
            version,
            capability_flags,
            name: String::from_utf8_lossy(&name[..end]).into_owned(),
        });
    }

    Ok(items)
}
