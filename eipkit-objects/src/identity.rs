//! Identity object (class 0x01).

use eipkit_cip::error::status;
use eipkit_cip::path::{parse_segments, PathSegment};
use eipkit_cip::types::service;
use eipkit_cip::{CipError, CipObject};

/// Device identity served on class 0x01, instance 1.
#[derive(Debug, Clone)]
pub struct IdentityObject {
    pub vendor_id: u16,
    pub device_type: u16,
    pub product_code: u16,
    pub revision_major: u8,
    pub revision_minor: u8,
    pub status: u16,
    pub serial_number: u32,
    pub product_name: String,
}

impl IdentityObject {
    pub fn new(vendor_id: u16, product_code: u16, product_name: impl Into<String>) -> Self {
        Self {
            vendor_id,
            device_type: 0x000C, // communications adapter
            product_code,
            revision_major: 1,
            revision_minor: 0,
            status: 0,
            serial_number: 0,
            product_name: product_name.into(),
        }
    }

    fn attribute(&self, id: u16) -> Result<Vec<u8>, CipError> {
        Ok(match id {
            1 => self.vendor_id.to_le_bytes().to_vec(),
            2 => self.device_type.to_le_bytes().to_vec(),
            3 => self.product_code.to_le_bytes().to_vec(),
            4 => vec![self.revision_major, self.revision_minor],
            5 => self.status.to_le_bytes().to_vec(),
            6 => self.serial_number.to_le_bytes().to_vec(),
            7 => {
                let name = self.product_name.as_bytes();
                let mut out = Vec::with_capacity(1 + name.len());
                out.push(name.len() as u8);
                out.extend_from_slice(name);
                out
            }
            _ => return Err(CipError::new(status::ATTRIBUTE_NOT_SUPPORTED)),
        })
    }

    fn all_attributes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for id in 1..=7 {
            out.extend(self.attribute(id).expect("attributes 1..=7 exist"));
        }
        out
    }
}

impl CipObject for IdentityObject {
    fn handle(&self, svc: u8, path: &[u8], _data: &[u8]) -> Result<Vec<u8>, CipError> {
        let segments = parse_segments(path)?;
        let mut iter = segments.into_iter();

        match iter.next() {
            Some(PathSegment::Instance(1)) => {}
            Some(PathSegment::Instance(_)) => return Err(CipError::object_does_not_exist()),
            _ => return Err(CipError::path_segment_error()),
        }

        match svc {
            service::GET_ATTRIBUTES_ALL => Ok(self.all_attributes()),
            service::GET_ATTRIBUTE_SINGLE => match iter.next() {
                Some(PathSegment::Attribute(attr)) => self.attribute(attr),
                _ => Err(CipError::path_segment_error()),
            },
            _ => Err(CipError::service_not_supported()),
        }
    }
}
