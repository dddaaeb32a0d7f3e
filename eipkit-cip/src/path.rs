//! EPATH building and parsing.
//!
//! Logical segments are self-describing: the segment byte selects the kind
//! (class/instance/member/connection-point/attribute) and width, followed by
//! the value in the narrowest little-endian encoding that admits it. The
//! ANSI extended symbolic segment (0x91) carries a length-prefixed tag name
//! padded to even length.

use crate::error::CipError;

const SEG_CLASS_8: u8 = 0x20;
const SEG_CLASS_16: u8 = 0x21;
const SEG_INSTANCE_8: u8 = 0x24;
const SEG_INSTANCE_16: u8 = 0x25;
const SEG_INSTANCE_32: u8 = 0x26;
const SEG_MEMBER_8: u8 = 0x28;
const SEG_MEMBER_16: u8 = 0x29;
const SEG_CONN_POINT_8: u8 = 0x2C;
const SEG_CONN_POINT_16: u8 = 0x2D;
const SEG_ATTRIBUTE_8: u8 = 0x30;
const SEG_ATTRIBUTE_16: u8 = 0x31;
const SEG_SYMBOLIC: u8 = 0x91;

/// A decoded logical or symbolic path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Class(u16),
    Instance(u32),
    Member(u16),
    ConnectionPoint(u32),
    Attribute(u16),
    Symbolic(String),
}

/// An encoded CIP path. The builder is purely additive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EPath {
    bytes: Vec<u8>,
}

impl EPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a standard class/instance(/attribute) path.
    pub fn to_object(class_id: u16, instance_id: u32, attribute_id: u16) -> Self {
        let mut path = Self::new();
        path.add_class(class_id);
        path.add_instance(instance_id);
        if attribute_id != 0 {
            path.add_attribute(attribute_id);
        }
        path
    }

    /// Builds a symbolic path addressing a controller tag.
    pub fn to_tag(tag: &str) -> Self {
        let mut path = Self::new();
        path.add_symbolic(tag);
        path
    }

    pub fn add_class(&mut self, class_id: u16) -> &mut Self {
        if class_id <= 0xFF {
            self.bytes.extend_from_slice(&[SEG_CLASS_8, class_id as u8]);
        } else {
            self.bytes.extend_from_slice(&[SEG_CLASS_16, 0x00]);
            self.bytes.extend_from_slice(&class_id.to_le_bytes());
        }
        self
    }

    pub fn add_instance(&mut self, instance_id: u32) -> &mut Self {
        if instance_id <= 0xFF {
            self.bytes
                .extend_from_slice(&[SEG_INSTANCE_8, instance_id as u8]);
        } else if instance_id <= 0xFFFF {
            self.bytes.extend_from_slice(&[SEG_INSTANCE_16, 0x00]);
            self.bytes
                .extend_from_slice(&(instance_id as u16).to_le_bytes());
        } else {
            self.bytes.extend_from_slice(&[SEG_INSTANCE_32, 0x00]);
            self.bytes.extend_from_slice(&instance_id.to_le_bytes());
        }
        self
    }

    pub fn add_attribute(&mut self, attribute_id: u16) -> &mut Self {
        if attribute_id <= 0xFF {
            self.bytes
                .extend_from_slice(&[SEG_ATTRIBUTE_8, attribute_id as u8]);
        } else {
            self.bytes.extend_from_slice(&[SEG_ATTRIBUTE_16, 0x00]);
            self.bytes.extend_from_slice(&attribute_id.to_le_bytes());
        }
        self
    }

    pub fn add_member(&mut self, member_id: u16) -> &mut Self {
        if member_id <= 0xFF {
            self.bytes.extend_from_slice(&[SEG_MEMBER_8, member_id as u8]);
        } else {
            self.bytes.extend_from_slice(&[SEG_MEMBER_16, 0x00]);
            self.bytes.extend_from_slice(&member_id.to_le_bytes());
        }
        self
    }

    pub fn add_connection_point(&mut self, point: u16) -> &mut Self {
        if point <= 0xFF {
            self.bytes
                .extend_from_slice(&[SEG_CONN_POINT_8, point as u8]);
        } else {
            self.bytes.extend_from_slice(&[SEG_CONN_POINT_16, 0x00]);
            self.bytes.extend_from_slice(&point.to_le_bytes());
        }
        self
    }

    /// Adds an ANSI extended symbolic segment, zero-padded to even length.
    pub fn add_symbolic(&mut self, symbol: &str) -> &mut Self {
        self.bytes.push(SEG_SYMBOLIC);
        self.bytes.push(symbol.len() as u8);
        self.bytes.extend_from_slice(symbol.as_bytes());
        if symbol.len() % 2 != 0 {
            self.bytes.push(0x00);
        }
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Path length in 16-bit words, rounded up.
    pub fn len_words(&self) -> u8 {
        ((self.bytes.len() + 1) / 2) as u8
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Parses the path into segments.
    pub fn segments(&self) -> Result<Vec<PathSegment>, CipError> {
        parse_segments(&self.bytes)
    }
}

impl From<&[u8]> for EPath {
    fn from(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }
}

impl From<Vec<u8>> for EPath {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

fn take<'a>(bytes: &'a [u8], offset: &mut usize, n: usize) -> Result<&'a [u8], CipError> {
    if bytes.len() < *offset + n {
        return Err(CipError::path_segment_error());
    }
    let out = &bytes[*offset..*offset + n];
    *offset += n;
    Ok(out)
}

fn take_u16(bytes: &[u8], offset: &mut usize) -> Result<u16, CipError> {
    let raw = take(bytes, offset, 2)?;
    Ok(u16::from_le_bytes([raw[0], raw[1]]))
}

fn take_u32(bytes: &[u8], offset: &mut usize) -> Result<u32, CipError> {
    let raw = take(bytes, offset, 4)?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Parses raw EPATH bytes into segments. Any unrecognised or truncated
/// segment yields a path-segment error.
pub fn parse_segments(bytes: &[u8]) -> Result<Vec<PathSegment>, CipError> {
    let mut segments = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let seg = bytes[offset];
        offset += 1;
        let segment = match seg {
            SEG_CLASS_8 => PathSegment::Class(take(bytes, &mut offset, 1)?[0] as u16),
            SEG_CLASS_16 => {
                take(bytes, &mut offset, 1)?; // pad
                PathSegment::Class(take_u16(bytes, &mut offset)?)
            }
            SEG_INSTANCE_8 => PathSegment::Instance(take(bytes, &mut offset, 1)?[0] as u32),
            SEG_INSTANCE_16 => {
                take(bytes, &mut offset, 1)?;
                PathSegment::Instance(take_u16(bytes, &mut offset)? as u32)
            }
            SEG_INSTANCE_32 => {
                take(bytes, &mut offset, 1)?;
                PathSegment::Instance(take_u32(bytes, &mut offset)?)
            }
            SEG_MEMBER_8 => PathSegment::Member(take(bytes, &mut offset, 1)?[0] as u16),
            SEG_MEMBER_16 => {
                take(bytes, &mut offset, 1)?;
                PathSegment::Member(take_u16(bytes, &mut offset)?)
            }
            SEG_CONN_POINT_8 => {
                PathSegment::ConnectionPoint(take(bytes, &mut offset, 1)?[0] as u32)
            }
            SEG_CONN_POINT_16 => {
                take(bytes, &mut offset, 1)?;
                PathSegment::ConnectionPoint(take_u16(bytes, &mut offset)? as u32)
            }
            SEG_ATTRIBUTE_8 => PathSegment::Attribute(take(bytes, &mut offset, 1)?[0] as u16),
            SEG_ATTRIBUTE_16 => {
                take(bytes, &mut offset, 1)?;
                PathSegment::Attribute(take_u16(bytes, &mut offset)?)
            }
            SEG_SYMBOLIC => {
                let len = take(bytes, &mut offset, 1)?[0] as usize;
                let name = take(bytes, &mut offset, len)?;
                if len % 2 != 0 {
                    take(bytes, &mut offset, 1)?; // pad byte
                }
                PathSegment::Symbolic(
                    std::str::from_utf8(name)
                        .map_err(|_| CipError::path_segment_error())?
                        .to_string(),
                )
            }
            _ => return Err(CipError::path_segment_error()),
        };
        segments.push(segment);
    }

    Ok(segments)
}

/// Splits a leading class segment off raw path bytes, returning the class id
/// and the remaining path. This is the router's entry parse.
pub fn split_class(bytes: &[u8]) -> Result<(u16, &[u8]), CipError> {
    match bytes.first() {
        Some(&SEG_CLASS_8) if bytes.len() >= 2 => Ok((bytes[1] as u16, &bytes[2..])),
        Some(&SEG_CLASS_16) if bytes.len() >= 4 => {
            Ok((u16::from_le_bytes([bytes[2], bytes[3]]), &bytes[4..]))
        }
        _ => Err(CipError::path_segment_error()),
    }
}
