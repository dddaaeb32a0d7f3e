//! # eipkit-client
//!
//! The originator (scanner) side of the stack.
//!
//! This crate provides:
//! - A TCP transport framing encapsulation packets
//! - The session layer: RegisterSession handshake, SendRRData/SendUnitData
//!   wrapping, ListIdentity/ListServices
//! - A high-level client for explicit tag reads/writes and tag enumeration
//!
//! A session serialises request/reply on one transport and is not safe for
//! concurrent callers; wrap it in your own synchronisation if you share it.

pub mod client;
pub mod error;
pub mod session;
pub mod tags;
pub mod transport;

pub use client::Client;
pub use error::ClientError;
pub use session::Session;
pub use transport::TcpTransport;
