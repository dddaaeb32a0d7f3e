//! # eipkit-server
//!
//! The target (adapter) side of the explicit-messaging stack.
//!
//! This crate provides:
//! - A TCP accept loop with one task per connection
//! - The per-connection encapsulation state machine
//!   (Unregistered -> Registered -> Closed)
//! - SendRRData/SendUnitData translation into message-router dispatches
//! - YAML + environment configuration in the usual load order

pub mod config;
pub mod error;
pub mod server;
pub mod session;

pub use config::{AssemblyConfig, Config, ConfigError, IdentityConfig, NetworkConfig};
pub use error::ServerError;
pub use server::{Server, ServerConfig, ServerStats};
pub use session::{EipSession, SessionState};
