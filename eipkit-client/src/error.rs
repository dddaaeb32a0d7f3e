//! Client error types.
//!
//! Failures fall into three strata: transport errors (`Io`, `Protocol`,
//! `ConnectTimeout`) leave the session unusable and it must be
//! reconstructed; `EncapFailed` reports a non-zero encapsulation status
//! and the session stays usable; `Cip` carries an application error for
//! the caller to interpret.

use eipkit_cip::CipError;
use eipkit_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Cip(#[from] CipError),

    #[error("connect timed out")]
    ConnectTimeout,

    #[error("RegisterSession failed with status {0:#010X}")]
    RegisterFailed(u32),

    #[error("encapsulation command failed with status {0:#010X}")]
    EncapFailed(u32),

    #[error("response shorter than the interface handle and timeout prefix")]
    ShortResponse,

    #[error("response CPF is missing the expected item")]
    MalformedResponse,
}
