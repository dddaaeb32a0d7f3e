//! # eipkit-cip
//!
//! Common Industrial Protocol application layer: elementary type codes,
//! EPATH building and parsing, message-router request/response records,
//! and the Message Router object that dispatches decoded requests to
//! registered application objects.

pub mod counter;
pub mod error;
pub mod message;
pub mod path;
pub mod router;
pub mod symbol;
pub mod timer;
pub mod types;
pub mod value;

pub use counter::Counter;
pub use error::{status, CipError};
pub use message::{MessageRouterRequest, MessageRouterResponse};
pub use path::{EPath, PathSegment};
pub use router::{CipObject, MessageRouter};
pub use symbol::SymbolInstance;
pub use timer::Timer;
pub use types::{service, DataType};
pub use value::{CipValue, ElementaryValue};

/// Well-known CIP class ids.
pub mod class {
    pub const IDENTITY: u16 = 0x01;
    pub const MESSAGE_ROUTER: u16 = 0x02;
    pub const ASSEMBLY: u16 = 0x04;
    pub const CONNECTION: u16 = 0x05;
    pub const CONNECTION_MANAGER: u16 = 0x06;
    pub const SYMBOL: u16 = 0x6B;
    pub const TCP_IP_INTERFACE: u16 = 0xF5;
    pub const ETHERNET_LINK: u16 = 0xF6;
}
