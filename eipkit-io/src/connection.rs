//! Cyclic I/O connection state.

use eipkit_objects::AssemblyInstance;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One cyclic I/O connection installed in the runtime.
///
/// Role flags and bindings are fixed at construction. The mutable fields
/// are single-writer: the scheduler owns `sequence`/`last_send`, the UDP
/// receiver owns `last_receive`. They are atomics so writers never need
/// the connection map's write lock.
pub struct IoConnection {
    /// The id carried in the CPF address item: the id we stamp on outgoing
    /// frames when producing, the id we match incoming frames on when
    /// consuming.
    pub connection_id: u32,
    /// Requested packet interval.
    pub rpi: Duration,
    /// Connection-timeout multiplier from Forward_Open (0..=7).
    pub timeout_mult: u8,
    /// Whether the data item carries a 32-bit Run/Idle header.
    pub run_idle_header: bool,
    /// Peer UDP address for produced frames. A producer without one still
    /// advances its sequence count; the send is skipped.
    pub remote_addr: Option<SocketAddr>,
    /// Bound assembly instance: source for production, sink for consumption.
    pub assembly: Option<Arc<AssemblyInstance>>,
    pub is_producer: bool,
    pub is_consumer: bool,

    sequence: AtomicU16,
    /// Microseconds since the runtime epoch.
    last_send_us: AtomicU64,
    last_receive_us: AtomicU64,
}

impl IoConnection {
    pub fn new(connection_id: u32, rpi: Duration) -> Self {
        Self {
            connection_id,
            rpi,
            timeout_mult: 0,
            run_idle_header: false,
            remote_addr: None,
            assembly: None,
            is_producer: false,
            is_consumer: false,
            sequence: AtomicU16::new(0),
            last_send_us: AtomicU64::new(0),
            last_receive_us: AtomicU64::new(0),
        }
    }

    pub fn producing(mut self) -> Self {
        self.is_producer = true;
        self
    }

    pub fn consuming(mut self) -> Self {
        self.is_consumer = true;
        self
    }

    pub fn with_assembly(mut self, assembly: Arc<AssemblyInstance>) -> Self {
        self.assembly = Some(assembly);
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_run_idle_header(mut self, enabled: bool) -> Self {
        self.run_idle_header = enabled;
        self
    }

    pub fn with_timeout_mult(mut self, mult: u8) -> Self {
        self.timeout_mult = mult & 0x07;
        self
    }

    /// Advances the 16-bit sequence count, wrapping, and returns the new
    /// value.
    pub fn next_sequence(&self) -> u16 {
        self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    pub fn sequence(&self) -> u16 {
        self.sequence.load(Ordering::Relaxed)
    }

    pub fn last_send_us(&self) -> u64 {
        self.last_send_us.load(Ordering::Relaxed)
    }

    pub fn mark_sent(&self, now_us: u64) {
        self.last_send_us.store(now_us, Ordering::Relaxed);
    }

    pub fn last_receive_us(&self) -> u64 {
        self.last_receive_us.load(Ordering::Relaxed)
    }

    pub fn mark_received(&self, now_us: u64) {
        self.last_receive_us.store(now_us, Ordering::Relaxed);
    }

    /// True when the RPI has elapsed since the last production.
    pub fn due(&self, now_us: u64) -> bool {
        now_us.saturating_sub(self.last_send_us()) >= self.rpi.as_micros() as u64
    }

    /// Watchdog budget: `RPI x (4 << timeout_mult)`.
    pub fn timeout(&self) -> Duration {
        self.rpi * (4u32 << self.timeout_mult)
    }

    /// True when no frame has arrived within the timeout budget.
    pub fn expired(&self, now_us: u64) -> bool {
        now_us.saturating_sub(self.last_receive_us()) > self.timeout().as_micros() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_wraps() {
        let conn = IoConnection::new(1, Duration::from_millis(10));
        conn.sequence.store(0xFFFF, Ordering::Relaxed);
        assert_eq!(conn.next_sequence(), 0);
        assert_eq!(conn.next_sequence(), 1);
    }

    #[test]
    fn test_due() {
        let conn = IoConnection::new(1, Duration::from_millis(50)).producing();
        conn.mark_sent(1_000_000);
        assert!(!conn.due(1_020_000));
        assert!(conn.due(1_050_000));
        assert!(conn.due(1_200_000));
    }

    #[test]
    fn test_timeout_multiplier_range() {
        let conn = IoConnection::new(1, Duration::from_millis(100));
        assert_eq!(conn.timeout(), Duration::from_millis(400));

        let conn = conn.with_timeout_mult(7);
        assert_eq!(conn.timeout(), Duration::from_millis(51_200));

        // Out-of-range multipliers are masked to 3 bits.
        let conn = IoConnection::new(1, Duration::from_millis(1)).with_timeout_mult(0x0A);
        assert_eq!(conn.timeout_mult, 2);
    }

    #[test]
    fn test_expired() {
        let conn = IoConnection::new(1, Duration::from_millis(100)).consuming();
        conn.mark_received(1_000_000);
        // Budget is 400 ms.
        assert!(!conn.expired(1_300_000));
        assert!(!conn.expired(1_400_000));
        assert!(conn.expired(1_500_000));
    }
}
