//! # eipkit-protocol
//!
//! EtherNet/IP encapsulation layer: the 24-byte header, the Common Packet
//! Format item list, and the ListIdentity/ListServices reply layouts.
//!
//! This crate provides:
//! - Encapsulation frame encoding/decoding with strict length accounting
//! - CPF item container with first-match lookup by type id
//! - Discovery item decoding (identity and service listings)
//! - Hex dump diagnostics for frame-level tracing

pub mod command;
pub mod cpf;
pub mod discovery;
pub mod error;
pub mod frame;
pub mod hex;

pub use command::{status, EncapCommand};
pub use cpf::{item_type, Cpf, CpfItem};
pub use discovery::{IdentityItem, ServicesItem};
pub use error::ProtocolError;
pub use frame::{EncapHeader, Packet, HEADER_SIZE};

/// Encapsulation protocol version sent in RegisterSession.
pub const PROTOCOL_VERSION: u16 = 1;

/// Default TCP port for explicit messaging.
pub const DEFAULT_PORT: u16 = 44818;

/// Default UDP port for implicit (class 0/1) I/O.
pub const IO_DEFAULT_PORT: u16 = 2222;

/// Maximum accepted encapsulation payload size in bytes.
pub const MAX_PACKET_SIZE: usize = 4096;
