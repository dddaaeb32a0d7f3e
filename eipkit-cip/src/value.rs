//! Fixed-width CIP value codecs.
//!
//! `CipValue` is the little-endian decode/encode seam used by typed tag
//! reads and writes; `ElementaryValue` additionally pins the elementary
//! type code sent in Write Tag requests.

use crate::counter::Counter;
use crate::timer::Timer;
use crate::types::DataType;
use eipkit_protocol::ProtocolError;

/// A value with a fixed CIP byte representation.
pub trait CipValue: Sized {
    fn from_cip_bytes(data: &[u8]) -> Result<Self, ProtocolError>;
    fn to_cip_bytes(&self) -> Vec<u8>;
}

/// An elementary (atomic) CIP value with a wire type code.
pub trait ElementaryValue: CipValue {
    const TYPE_CODE: DataType;
}

macro_rules! impl_numeric_value {
    ($($ty:ty => $code:expr),* $(,)?) => {
        $(
            impl CipValue for $ty {
                fn from_cip_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
                    const N: usize = std::mem::size_of::<$ty>();
                    if data.len() < N {
                        return Err(ProtocolError::ShortRead { needed: N - data.len() });
                    }
                    let raw: [u8; N] = data[..N].try_into().expect("length checked");
                    Ok(<$ty>::from_le_bytes(raw))
                }

                fn to_cip_bytes(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }

            impl ElementaryValue for $ty {
                const TYPE_CODE: DataType = $code;
            }
        )*
    };
}

impl_numeric_value! {
    i8 => DataType::SINT,
    i16 => DataType::INT,
    i32 => DataType::DINT,
    i64 => DataType::LINT,
    u8 => DataType::USINT,
    u16 => DataType::UINT,
    u32 => DataType::UDINT,
    u64 => DataType::ULINT,
    f32 => DataType::REAL,
    f64 => DataType::LREAL,
}

impl CipValue for bool {
    fn from_cip_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        match data.first() {
            Some(b) => Ok(*b != 0),
            None => Err(ProtocolError::ShortRead { needed: 1 }),
        }
    }

    fn to_cip_bytes(&self) -> Vec<u8> {
        vec![if *self { 0x01 } else { 0x00 }]
    }
}

impl ElementaryValue for bool {
    const TYPE_CODE: DataType = DataType::BOOL;
}

impl CipValue for Timer {
    fn from_cip_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        Timer::decode(data)
    }

    fn to_cip_bytes(&self) -> Vec<u8> {
        self.encode().to_vec()
    }
}

impl CipValue for Counter {
    fn from_cip_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        Counter::decode(data)
    }

    fn to_cip_bytes(&self) -> Vec<u8> {
        self.encode().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dint_decode() {
        let value = i32::from_cip_bytes(&[0xEF, 0xBE, 0xAD, 0xDE]).unwrap();
        assert_eq!(value, -559038737);
        assert_eq!(value.to_cip_bytes(), vec![0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(<i32 as ElementaryValue>::TYPE_CODE, DataType::DINT);
    }

    #[test]
    fn test_real_roundtrip() {
        let value = 98.6f32;
        let decoded = f32::from_cip_bytes(&value.to_cip_bytes()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_bool() {
        assert!(bool::from_cip_bytes(&[0xFF]).unwrap());
        assert!(!bool::from_cip_bytes(&[0x00]).unwrap());
        assert_eq!(true.to_cip_bytes(), vec![0x01]);
    }

    #[test]
    fn test_short_input() {
        assert!(i32::from_cip_bytes(&[0x01, 0x02]).is_err());
        assert!(bool::from_cip_bytes(&[]).is_err());
    }

    #[test]
    fn test_timer_through_trait() {
        let timer = Timer {
            pre: 1000,
            acc: 500,
            en: true,
            tt: true,
            dn: true,
        };
        let decoded = Timer::from_cip_bytes(&timer.to_cip_bytes()).unwrap();
        assert_eq!(decoded, timer);
    }

    #[test]
    fn test_extra_trailing_bytes_ignored() {
        // Element reads may return more than one element; the scalar decode
        // consumes only its own width.
        let value = i16::from_cip_bytes(&[0x2A, 0x00, 0xFF, 0xFF]).unwrap();
        assert_eq!(value, 42);
    }
}
