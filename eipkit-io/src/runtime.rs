//! UDP runtime: socket ownership, connection map, ingress demux.

use crate::connection::IoConnection;
use bytes::Buf;
use eipkit_protocol::cpf::{item_type, Cpf};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UdpSocket;
use tokio::sync::Notify;

/// The implicit-I/O runtime.
///
/// Owns the UDP socket and the connection map. The map takes a shared lock
/// for reads and an exclusive lock for add/remove; per-connection mutable
/// fields are atomics, so the scheduler and receiver only ever read-lock.
pub struct IoRuntime {
    socket: UdpSocket,
    connections: RwLock<HashMap<u32, Arc<IoConnection>>>,
    epoch: Instant,
    shutdown: AtomicBool,
    notify: Notify,
}

impl IoRuntime {
    /// Binds the runtime's UDP socket.
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Arc<Self>> {
        let socket = UdpSocket::bind(addr).await?;
        tracing::info!("I/O runtime listening on {}", socket.local_addr()?);
        Ok(Arc::new(Self {
            socket,
            connections: RwLock::new(HashMap::new()),
            epoch: Instant::now(),
            shutdown: AtomicBool::new(false),
            notify: Notify::new(),
        }))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Microseconds since the runtime epoch; the timebase for all
    /// per-connection timestamps.
    pub fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    /// Installs a connection, stamping its receive clock so the watchdog
    /// grants it a full timeout budget from now.
    pub fn add_connection(&self, connection: IoConnection) -> Arc<IoConnection> {
        let connection = Arc::new(connection);
        connection.mark_received(self.now_us());
        tracing::debug!(
            "installing I/O connection {:#010X} (producer={} consumer={} rpi={:?})",
            connection.connection_id,
            connection.is_producer,
            connection.is_consumer,
            connection.rpi
        );
        self.connections
            .write()
            .insert(connection.connection_id, Arc::clone(&connection));
        connection
    }

    /// Removes a connection; returns false if it was already gone.
    pub fn remove_connection(&self, connection_id: u32) -> bool {
        self.connections.write().remove(&connection_id).is_some()
    }

    pub fn connection(&self, connection_id: u32) -> Option<Arc<IoConnection>> {
        self.connections.read().get(&connection_id).cloned()
    }

    pub fn contains(&self, connection_id: u32) -> bool {
        self.connections.read().contains_key(&connection_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Snapshots connections matching a predicate without holding the lock
    /// across any I/O.
    pub(crate) fn snapshot<F>(&self, keep: F) -> Vec<Arc<IoConnection>>
    where
        F: Fn(&IoConnection) -> bool,
    {
        self.connections
            .read()
            .values()
            .filter(|c| keep(c))
            .cloned()
            .collect()
    }

    pub(crate) fn socket(&self) -> &UdpSocket {
        &self.socket
    }

    /// Signals the receive loop to exit.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Receive loop: demultiplexes incoming frames into assembly writes and
    /// watchdog refreshes. Exits on shutdown or socket error.
    pub async fn run_receiver(self: Arc<Self>) {
        let mut buf = [0u8; 2048];
        loop {
            tokio::select! {
                _ = self.notify.notified() => {
                    tracing::debug!("I/O receiver shutting down");
                    return;
                }
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((n, from)) => self.handle_frame(&buf[..n], from),
                        Err(e) => {
                            tracing::error!("I/O receive error: {}", e);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Processes one incoming UDP frame. Unsupported framings are dropped
    /// silently; frames for unknown connection ids are dropped.
    pub fn handle_frame(&self, data: &[u8], from: SocketAddr) {
        let cpf = match Cpf::decode(data) {
            Ok(cpf) => cpf,
            Err(_) => return,
        };
        if cpf.items.len() != 2 {
            return;
        }

        let connection_id = match cpf.items[0].connection_id() {
            Some(id) => id,
            None => return,
        };
        if cpf.items[1].type_id != item_type::CONNECTED_DATA {
            return;
        }

        let connection = {
            let connections = self.connections.read();
            match connections.get(&connection_id) {
                Some(connection) => {
                    connection.mark_received(self.now_us());
                    Arc::clone(connection)
                }
                None => {
                    tracing::debug!(
                        "dropping frame for unknown connection {:#010X} from {}",
                        connection_id,
                        from
                    );
                    return;
                }
            }
        };

        let mut payload = cpf.items[1].data.clone();
        if payload.len() < 2 {
            return;
        }
        let _sequence = payload.get_u16_le();

        if connection.run_idle_header {
            if payload.len() < 4 {
                return;
            }
            let header = payload.get_u32_le();
            if header & 0x01 == 0 {
                // Idle: refresh only, do not apply.
                return;
            }
        }

        if let Some(assembly) = &connection.assembly {
            if let Err(e) = assembly.write(&payload) {
                tracing::warn!(
                    "connection {:#010X}: dropping {}-byte payload for assembly {}: {}",
                    connection_id,
                    payload.len(),
                    assembly.id(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::build_io_frame;
    use bytes::BufMut;
    use bytes::BytesMut;
    use eipkit_objects::AssemblyObject;
    use std::time::Duration;

    async fn runtime() -> Arc<IoRuntime> {
        IoRuntime::bind("127.0.0.1:0".parse().unwrap()).await.unwrap()
    }

    fn io_frame(connection_id: u32, seq: u16, run_idle: Option<u32>, data: &[u8]) -> BytesMut {
        let mut payload = BytesMut::new();
        payload.put_u16_le(seq);
        if let Some(header) = run_idle {
            payload.put_u32_le(header);
        }
        payload.put_slice(data);
        build_io_frame(connection_id, &payload)
    }

    #[tokio::test]
    async fn test_ingress_applies_assembly_write() {
        let rt = runtime().await;
        let assemblies = AssemblyObject::new();
        let assembly = assemblies.register(150, 4);

        rt.add_connection(
            IoConnection::new(0x10, Duration::from_millis(100))
                .consuming()
                .with_assembly(Arc::clone(&assembly)),
        );

        let frame = io_frame(0x10, 1, None, &[0xDE, 0xAD, 0xBE, 0xEF]);
        rt.handle_frame(&frame, "127.0.0.1:9".parse().unwrap());

        assert_eq!(assembly.read(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[tokio::test]
    async fn test_ingress_refreshes_watchdog_clock() {
        let rt = runtime().await;
        let conn = rt.add_connection(
            IoConnection::new(0x11, Duration::from_millis(100)).consuming(),
        );
        conn.mark_received(0);

        let frame = io_frame(0x11, 1, None, &[]);
        rt.handle_frame(&frame, "127.0.0.1:9".parse().unwrap());
        assert!(conn.last_receive_us() > 0);
    }

    #[tokio::test]
    async fn test_ingress_idle_frame_does_not_apply() {
        let rt = runtime().await;
        let assemblies = AssemblyObject::new();
        let assembly = assemblies.register(150, 2);

        let conn = rt.add_connection(
            IoConnection::new(0x12, Duration::from_millis(100))
                .consuming()
                .with_run_idle_header(true)
                .with_assembly(Arc::clone(&assembly)),
        );
        conn.mark_received(0);

        // Run bit clear: watchdog refreshed, data not applied.
        let frame = io_frame(0x12, 1, Some(0), &[0xAA, 0xBB]);
        rt.handle_frame(&frame, "127.0.0.1:9".parse().unwrap());
        assert_eq!(assembly.read(), vec![0, 0]);
        assert!(conn.last_receive_us() > 0);

        // Run bit set: data applied.
        let frame = io_frame(0x12, 2, Some(1), &[0xAA, 0xBB]);
        rt.handle_frame(&frame, "127.0.0.1:9".parse().unwrap());
        assert_eq!(assembly.read(), vec![0xAA, 0xBB]);
    }

    #[tokio::test]
    async fn test_ingress_drops_unknown_connection_and_bad_framings() {
        let rt = runtime().await;
        let from: SocketAddr = "127.0.0.1:9".parse().unwrap();

        // Unknown connection id.
        rt.handle_frame(&io_frame(0x99, 1, None, &[1]), from);
        // Garbage.
        rt.handle_frame(&[0x01, 0x02], from);
        // Wrong item count.
        let one_item = Cpf::new(vec![eipkit_protocol::CpfItem::connected_address(0x13)]).encode();
        rt.handle_frame(&one_item, from);
        // None of these may panic or install state.
        assert_eq!(rt.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_size_mismatch_is_dropped_not_applied() {
        let rt = runtime().await;
        let assemblies = AssemblyObject::new();
        let assembly = assemblies.register(150, 4);

        rt.add_connection(
            IoConnection::new(0x14, Duration::from_millis(100))
                .consuming()
                .with_assembly(Arc::clone(&assembly)),
        );

        let frame = io_frame(0x14, 1, None, &[0x01, 0x02]);
        rt.handle_frame(&frame, "127.0.0.1:9".parse().unwrap());
        assert_eq!(assembly.read(), vec![0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_add_remove_idempotent() {
        let rt = runtime().await;
        rt.add_connection(IoConnection::new(7, Duration::from_millis(10)));
        assert!(rt.contains(7));
        assert!(rt.remove_connection(7));
        assert!(!rt.remove_connection(7));
    }
}
