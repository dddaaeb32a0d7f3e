//! Server error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] eipkit_protocol::ProtocolError),

    #[error("oversize frame ({0} bytes), closing connection")]
    OversizeFrame(usize),

    #[error("server shutting down")]
    ShuttingDown,
}
