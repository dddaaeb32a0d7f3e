//! # eipkit-io
//!
//! The implicit-I/O runtime: a UDP endpoint plus two cooperating loops.
//! The producer scheduler emits class 0/1 frames when a connection's RPI
//! elapses; the watchdog expires consumers whose last receive has aged past
//! `RPI x (4 << timeout_mult)`. The Connection Manager object installs and
//! retires runtime entries via Forward_Open / Forward_Close.

pub mod connection;
pub mod connmgr;
pub mod runtime;
pub mod scheduler;
pub mod watchdog;

pub use connection::IoConnection;
pub use connmgr::{
    ConnectionManager, ForwardCloseRequest, ForwardCloseResponse, ForwardOpenRequest,
    ForwardOpenResponse,
};
pub use runtime::IoRuntime;
pub use scheduler::ProducerScheduler;
pub use watchdog::Watchdog;
