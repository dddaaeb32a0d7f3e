//! Elementary CIP data types and service codes.

use std::fmt;

/// CIP service codes.
pub mod service {
    pub const GET_ATTRIBUTES_ALL: u8 = 0x01;
    pub const GET_ATTRIBUTE_LIST: u8 = 0x03;
    pub const SET_ATTRIBUTE_LIST: u8 = 0x04;
    pub const RESET: u8 = 0x05;
    pub const GET_ATTRIBUTE_SINGLE: u8 = 0x0E;
    pub const SET_ATTRIBUTE_SINGLE: u8 = 0x10;
    /// Logix Read Tag service.
    pub const READ_TAG: u8 = 0x4C;
    /// Logix Write Tag service.
    pub const WRITE_TAG: u8 = 0x4D;
    pub const FORWARD_CLOSE: u8 = 0x4E;
    pub const UNCONNECTED_SEND: u8 = 0x52;
    pub const FORWARD_OPEN: u8 = 0x54;
    pub const LARGE_FORWARD_OPEN: u8 = 0x5B;

    /// Bit set on the service code in every reply.
    pub const REPLY_FLAG: u8 = 0x80;
}

/// A 16-bit CIP data type code. Bit 15 marks an array of the base type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataType(pub u16);

impl DataType {
    pub const BOOL: Self = Self(0x00C1);
    pub const SINT: Self = Self(0x00C2);
    pub const INT: Self = Self(0x00C3);
    pub const DINT: Self = Self(0x00C4);
    pub const LINT: Self = Self(0x00C5);
    pub const USINT: Self = Self(0x00C6);
    pub const UINT: Self = Self(0x00C7);
    pub const UDINT: Self = Self(0x00C8);
    pub const ULINT: Self = Self(0x00C9);
    pub const REAL: Self = Self(0x00CA);
    pub const LREAL: Self = Self(0x00CB);
    pub const STRING: Self = Self(0x00D0);
    pub const BYTE: Self = Self(0x00D1);
    pub const WORD: Self = Self(0x00D2);
    pub const DWORD: Self = Self(0x00D3);
    pub const LWORD: Self = Self(0x00D4);
    pub const SHORT_STRING: Self = Self(0x00DA);
    pub const EPATH: Self = Self(0x00DC);
    /// Template/structure marker used by Logix controllers.
    pub const STRUCT: Self = Self(0x02A0);

    const ARRAY_BIT: u16 = 0x8000;

    /// Returns true if the array bit is set.
    pub fn is_array(&self) -> bool {
        self.0 & Self::ARRAY_BIT != 0
    }

    /// Returns the base type with the array bit masked off.
    pub fn base(&self) -> Self {
        Self(self.0 & !Self::ARRAY_BIT)
    }

    fn name(&self) -> Option<&'static str> {
        Some(match self.base().0 {
            0x00C1 => "BOOL",
            0x00C2 => "SINT",
            0x00C3 => "INT",
            0x00C4 => "DINT",
            0x00C5 => "LINT",
            0x00C6 => "USINT",
            0x00C7 => "UINT",
            0x00C8 => "UDINT",
            0x00C9 => "ULINT",
            0x00CA => "REAL",
            0x00CB => "LREAL",
            0x00D0 => "STRING",
            0x00D1 => "BYTE",
            0x00D2 => "WORD",
            0x00D3 => "DWORD",
            0x00D4 => "LWORD",
            0x00DA => "SHORT_STRING",
            0x00DC => "EPATH",
            0x02A0 => "STRUCT",
            _ => return None,
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) if self.is_array() => write!(f, "{}[]", name),
            Some(name) => write!(f, "{}", name),
            None if self.is_array() => write!(f, "UNKNOWN({:#06X})[]", self.base().0),
            None => write!(f, "UNKNOWN({:#06X})", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_bit() {
        let dint_array = DataType(DataType::DINT.0 | 0x8000);
        assert!(dint_array.is_array());
        assert_eq!(dint_array.base(), DataType::DINT);
        assert!(!DataType::DINT.is_array());
    }

    #[test]
    fn test_display() {
        assert_eq!(DataType::DINT.to_string(), "DINT");
        assert_eq!(DataType(0x80C4).to_string(), "DINT[]");
        assert_eq!(DataType(0x0042).to_string(), "UNKNOWN(0x0042)");
        assert_eq!(DataType(0x8042).to_string(), "UNKNOWN(0x0042)[]");
    }
}
