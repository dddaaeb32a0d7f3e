//! Per-connection session state.

use std::net::SocketAddr;
use std::time::Instant;

/// Encapsulation state machine for one TCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepts only RegisterSession.
    Unregistered,
    /// Accepts SendRRData, SendUnitData, UnregisterSession.
    Registered,
    /// The accept loop drops the connection.
    Closed,
}

/// One client session on the target.
pub struct EipSession {
    pub remote_addr: SocketAddr,
    state: SessionState,
    handle: u32,
    request_count: u64,
    created_at: Instant,
}

impl EipSession {
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            state: SessionState::Unregistered,
            handle: 0,
            request_count: 0,
            created_at: Instant::now(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The handle assigned at registration; zero while unregistered.
    pub fn handle(&self) -> u32 {
        self.handle
    }

    /// Completes registration with a freshly assigned handle.
    pub fn register(&mut self, handle: u32) {
        self.handle = handle;
        self.state = SessionState::Registered;
    }

    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    pub fn record_request(&mut self) {
        self.request_count += 1;
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}
