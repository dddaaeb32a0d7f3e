//! Producer scheduler: emits cyclic frames when each connection's RPI
//! elapses.

use crate::runtime::IoRuntime;
use bytes::{BufMut, BytesMut};
use eipkit_protocol::cpf::{Cpf, CpfItem};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Base tick of the scheduler loop.
pub const TICK: Duration = Duration::from_millis(5);

/// Builds one class 0/1 frame: a CPF with a Connected Address item
/// carrying the connection id and a Connected Data item carrying the
/// already-assembled payload (sequence count, optional Run/Idle header,
/// assembly bytes).
pub fn build_io_frame(connection_id: u32, payload: &[u8]) -> BytesMut {
    Cpf::new(vec![
        CpfItem::connected_address(connection_id),
        CpfItem::new(
            eipkit_protocol::cpf::item_type::CONNECTED_DATA,
            payload.to_vec(),
        ),
    ])
    .encode()
}

/// Drives producer connections at their requested packet interval.
pub struct ProducerScheduler {
    runtime: Arc<IoRuntime>,
    shutdown: AtomicBool,
    notify: Notify,
}

impl ProducerScheduler {
    pub fn new(runtime: Arc<IoRuntime>) -> Self {
        Self {
            runtime,
            shutdown: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Signals the loop to exit at the next tick.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Runs the scheduler loop (call from a background task).
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(TICK);
        loop {
            tokio::select! {
                _ = self.notify.notified() => break,
                _ = interval.tick() => {
                    if self.shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    let now_us = self.runtime.now_us();
                    self.tick_at(now_us).await;
                }
            }
        }
        tracing::debug!("producer scheduler stopped");
    }

    /// One scheduler pass at the given runtime clock.
    ///
    /// The map lock is held only to snapshot the due producer list, never
    /// across the send syscall.
    pub async fn tick_at(&self, now_us: u64) {
        let due = self
            .runtime
            .snapshot(|c| c.is_producer && c.assembly.is_some() && c.due(now_us));

        for connection in due {
            let Some(assembly) = &connection.assembly else {
                continue;
            };

            let sequence = connection.next_sequence();
            let data = assembly.read();

            let mut payload = BytesMut::with_capacity(6 + data.len());
            payload.put_u16_le(sequence);
            if connection.run_idle_header {
                payload.put_u32_le(1); // Run
            }
            payload.put_slice(&data);

            if let Some(addr) = connection.remote_addr {
                let frame = build_io_frame(connection.connection_id, &payload);
                if let Err(e) = self.runtime.socket().send_to(&frame, addr).await {
                    tracing::warn!(
                        "connection {:#010X}: produce to {} failed: {}",
                        connection.connection_id,
                        addr,
                        e
                    );
                }
            }

            connection.mark_sent(now_us);
        }
    }
}
