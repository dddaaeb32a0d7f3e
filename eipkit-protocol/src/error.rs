//! Protocol error types.

use thiserror::Error;

/// Errors raised by the encapsulation and CPF codecs.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("short read: need {needed} more bytes")]
    ShortRead { needed: usize },

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("malformed CPF item list")]
    MalformedCpf,

    #[error("malformed {0} item")]
    MalformedItem(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
