//! CIP application error: general status plus extended-status words.

use std::fmt;

/// General status codes returned in message-router responses.
pub mod status {
    pub const SUCCESS: u8 = 0x00;
    pub const CONNECTION_FAILURE: u8 = 0x01;
    pub const RESOURCE_UNAVAILABLE: u8 = 0x02;
    pub const PATH_SEGMENT_ERROR: u8 = 0x04;
    pub const PATH_DESTINATION_UNKNOWN: u8 = 0x05;
    pub const PARTIAL_TRANSFER: u8 = 0x06;
    pub const SERVICE_NOT_SUPPORTED: u8 = 0x08;
    pub const INVALID_ATTRIBUTE_VALUE: u8 = 0x09;
    pub const ATTRIBUTE_NOT_SETTABLE: u8 = 0x0E;
    pub const PRIVILEGE_VIOLATION: u8 = 0x10;
    pub const DEVICE_STATE_CONFLICT: u8 = 0x11;
    pub const NOT_ENOUGH_DATA: u8 = 0x13;
    pub const ATTRIBUTE_NOT_SUPPORTED: u8 = 0x14;
    pub const TOO_MUCH_DATA: u8 = 0x15;
    pub const OBJECT_DOES_NOT_EXIST: u8 = 0x16;
}

/// Extended status words for `CONNECTION_FAILURE` responses from the
/// connection manager.
pub mod ext_status {
    pub const CONNECTION_IN_USE: u16 = 0x0100;
    pub const TRANSPORT_NOT_SUPPORTED: u16 = 0x0103;
    pub const OWNERSHIP_CONFLICT: u16 = 0x0106;
    pub const CONNECTION_NOT_FOUND: u16 = 0x0107;
    pub const INVALID_CONNECTION_SIZE: u16 = 0x0109;
    pub const OUT_OF_CONNECTIONS: u16 = 0x0113;
    pub const INVALID_SEGMENT_IN_PATH: u16 = 0x0315;
    pub const VENDOR_SPECIFIC: u16 = 0x031C;
}

/// A structured CIP application error.
///
/// These errors are never connection-fatal; the router folds them into a
/// response with a non-zero general status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipError {
    pub status: u8,
    pub ext_status: Vec<u16>,
}

impl CipError {
    pub fn new(status: u8) -> Self {
        Self {
            status,
            ext_status: Vec::new(),
        }
    }

    pub fn with_ext(status: u8, ext: u16) -> Self {
        Self {
            status,
            ext_status: vec![ext],
        }
    }

    pub fn path_segment_error() -> Self {
        Self::new(status::PATH_SEGMENT_ERROR)
    }

    pub fn object_does_not_exist() -> Self {
        Self::new(status::OBJECT_DOES_NOT_EXIST)
    }

    pub fn service_not_supported() -> Self {
        Self::new(status::SERVICE_NOT_SUPPORTED)
    }
}

impl fmt::Display for CipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CIP error: status={:#04X}", self.status)?;
        if !self.ext_status.is_empty() {
            write!(f, " ext={:#06X?}", self.ext_status)?;
        }
        Ok(())
    }
}

impl std::error::Error for CipError {}
