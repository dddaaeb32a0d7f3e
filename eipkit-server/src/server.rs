//! TCP server and per-connection encapsulation state machine.

use crate::error::ServerError;
use crate::session::{EipSession, SessionState};
use bytes::{Buf, BufMut, BytesMut};
use eipkit_cip::{MessageRouter, MessageRouterRequest};
use eipkit_protocol::cpf::{item_type, Cpf, CpfItem};
use eipkit_protocol::{status, EncapCommand, EncapHeader, HEADER_SIZE, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], eipkit_protocol::DEFAULT_PORT)),
            max_connections: 64,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// The EtherNet/IP target server.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    router: Arc<MessageRouter>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
    next_session_handle: Arc<AtomicU32>,
}

impl Server {
    /// Binds the listener; call [`run`](Self::run) to start accepting.
    pub async fn bind(config: ServerConfig, router: Arc<MessageRouter>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let (shutdown, _) = broadcast::channel(1);
        Ok(Self {
            listener,
            config,
            router,
            stats: Arc::new(ServerStats::default()),
            shutdown,
            running: AtomicBool::new(false),
            next_session_handle: Arc::new(AtomicU32::new(1)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the accept loop until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("server listening on {}", self.listener.local_addr()?);

        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("connection limit reached, rejecting {}", addr);
                                continue;
                            }
                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            let router = Arc::clone(&self.router);
                            let stats = Arc::clone(&self.stats);
                            let next_handle = Arc::clone(&self.next_session_handle);
                            let mut conn_shutdown = self.shutdown.subscribe();

                            tokio::spawn(async move {
                                tracing::info!("client connected: {}", addr);
                                let result = handle_connection(
                                    stream,
                                    addr,
                                    router,
                                    Arc::clone(&stats),
                                    next_handle,
                                    &mut conn_shutdown,
                                )
                                .await;

                                if let Err(e) = result {
                                    tracing::debug!("connection {} closed: {}", addr, e);
                                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                }
                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                tracing::info!("client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {}", e);
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}

/// What one frame turns into.
enum Reply {
    /// Reply with status, session handle and payload.
    Frame(u32, u32, Vec<u8>),
    /// Drop the connection without a reply.
    Close,
}

async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    router: Arc<MessageRouter>,
    stats: Arc<ServerStats>,
    next_handle: Arc<AtomicU32>,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<(), ServerError> {
    let mut session = EipSession::new(addr);

    loop {
        let mut raw = [0u8; HEADER_SIZE];
        tokio::select! {
            _ = shutdown.recv() => return Err(ServerError::ShuttingDown),
            result = stream.read_exact(&mut raw) => {
                match result {
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let header = EncapHeader::from_bytes(&raw);
        if header.length as usize > MAX_PACKET_SIZE {
            // The sole condition on which the target closes unilaterally.
            return Err(ServerError::OversizeFrame(header.length as usize));
        }

        let mut payload = vec![0u8; header.length as usize];
        if header.length > 0 {
            stream.read_exact(&mut payload).await?;
        }

        session.record_request();
        stats.requests_total.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("[{}] {}", addr, header);

        match process_frame(&mut session, &router, &next_handle, &header, &payload) {
            Reply::Close => return Ok(()),
            Reply::Frame(reply_status, session_handle, reply_payload) => {
                if reply_status != 0 {
                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                }
                let mut reply = EncapHeader::new(
                    header.command,
                    session_handle,
                    reply_payload.len() as u16,
                );
                reply.status = reply_status;
                reply.sender_context = header.sender_context;

                let mut out = BytesMut::with_capacity(HEADER_SIZE + reply_payload.len());
                reply.put(&mut out);
                out.put_slice(&reply_payload);
                stream.write_all(&out).await?;
            }
        }

        if session.state() == SessionState::Closed {
            return Ok(());
        }
    }
}

/// Advances the state machine for one decoded frame.
fn process_frame(
    session: &mut EipSession,
    router: &MessageRouter,
    next_handle: &AtomicU32,
    header: &EncapHeader,
    payload: &[u8],
) -> Reply {
    if header.command == EncapCommand::UNREGISTER_SESSION {
        session.close();
        return Reply::Close;
    }

    match session.state() {
        SessionState::Unregistered => {
            if header.command != EncapCommand::REGISTER_SESSION {
                return Reply::Frame(status::INVALID_COMMAND, header.session_handle, Vec::new());
            }
            let handle = next_handle.fetch_add(1, Ordering::Relaxed);
            session.register(handle);
            tracing::info!(
                "[{}] session registered, handle {:#010X}",
                session.remote_addr,
                handle
            );

            let mut reply = BytesMut::with_capacity(4);
            reply.put_u16_le(PROTOCOL_VERSION);
            reply.put_u16_le(0);
            Reply::Frame(status::SUCCESS, handle, reply.to_vec())
        }
        SessionState::Registered => {
            let is_rr = header.command == EncapCommand::SEND_RR_DATA;
            let is_unit = header.command == EncapCommand::SEND_UNIT_DATA;
            if !is_rr && !is_unit {
                return Reply::Frame(status::INVALID_COMMAND, session.handle(), Vec::new());
            }
            if header.session_handle != session.handle() {
                return Reply::Frame(
                    status::INVALID_SESSION_HANDLE,
                    header.session_handle,
                    Vec::new(),
                );
            }
            let result = if is_rr {
                handle_rr_data(router, payload)
            } else {
                handle_unit_data(router, payload)
            };
            match result {
                Some(reply) => Reply::Frame(status::SUCCESS, session.handle(), reply),
                None => Reply::Frame(status::INVALID_COMMAND, session.handle(), Vec::new()),
            }
        }
        SessionState::Closed => Reply::Close,
    }
}

/// SendRRData: `{interface_handle:u32, timeout:u16, cpf}` around an
/// Unconnected Message item. Returns `None` on any payload-handling
/// failure; router-level CIP errors ride inside a successful reply.
fn handle_rr_data(router: &MessageRouter, payload: &[u8]) -> Option<Vec<u8>> {
    if payload.len() < 6 {
        return None;
    }
    let cpf = Cpf::decode(&payload[6..]).ok()?;
    let item = cpf.find(item_type::UNCONNECTED_MESSAGE)?;
    let request = MessageRouterRequest::decode(&item.data).ok()?;

    let response = router.dispatch(&request);

    let reply_cpf = Cpf::new(vec![
        CpfItem::null_address(),
        CpfItem::new(item_type::UNCONNECTED_MESSAGE, response.encode().freeze()),
    ]);

    let mut out = BytesMut::new();
    out.put_u32_le(0); // interface handle
    out.put_u16_le(0); // timeout
    out.put_slice(&reply_cpf.encode());
    Some(out.to_vec())
}

/// SendUnitData: class-3 explicit over an established connection. The
/// reply echoes the Connected Address item and the request's sequence
/// count.
fn handle_unit_data(router: &MessageRouter, payload: &[u8]) -> Option<Vec<u8>> {
    if payload.len() < 6 {
        return None;
    }
    let cpf = Cpf::decode(&payload[6..]).ok()?;
    let address = cpf.find(item_type::CONNECTED_ADDRESS)?;
    address.connection_id()?;

    let mut data = cpf.find(item_type::CONNECTED_DATA)?.data.clone();
    if data.len() < 2 {
        return None;
    }
    let sequence = data.get_u16_le();
    let request = MessageRouterRequest::decode(&data).ok()?;

    let response = router.dispatch(&request);

    let mut reply_data = BytesMut::new();
    reply_data.put_u16_le(sequence);
    reply_data.put_slice(&response.encode());

    let reply_cpf = Cpf::new(vec![
        CpfItem::new(item_type::CONNECTED_ADDRESS, address.data.clone()),
        CpfItem::new(item_type::CONNECTED_DATA, reply_data.freeze()),
    ]);

    let mut out = BytesMut::new();
    out.put_u32_le(0);
    out.put_u16_le(0);
    out.put_slice(&reply_cpf.encode());
    Some(out.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eipkit_objects::AssemblyObject;
    use std::time::Duration;

    async fn spawn_server() -> SocketAddr {
        let router = Arc::new(MessageRouter::new());
        let assemblies = Arc::new(AssemblyObject::new());
        assemblies.register(150, 2).write(&[0xAB, 0xCD]).unwrap();
        router.register(eipkit_cip::class::ASSEMBLY, assemblies);

        let server = Arc::new(
            Server::bind(ServerConfig::new("127.0.0.1:0".parse().unwrap()), router)
                .await
                .unwrap(),
        );
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move { server.run().await });
        addr
    }

    async fn send_frame(
        stream: &mut TcpStream,
        command: EncapCommand,
        session_handle: u32,
        context: [u8; 8],
        payload: &[u8],
    ) {
        let mut header = EncapHeader::new(command, session_handle, payload.len() as u16);
        header.sender_context = context;
        let mut out = BytesMut::new();
        header.put(&mut out);
        out.put_slice(payload);
        stream.write_all(&out).await.unwrap();
    }

    async fn read_frame(stream: &mut TcpStream) -> (EncapHeader, Vec<u8>) {
        let mut raw = [0u8; HEADER_SIZE];
        stream.read_exact(&mut raw).await.unwrap();
        let header = EncapHeader::from_bytes(&raw);
        let mut payload = vec![0u8; header.length as usize];
        if header.length > 0 {
            stream.read_exact(&mut payload).await.unwrap();
        }
        (header, payload)
    }

    async fn register(stream: &mut TcpStream) -> u32 {
        send_frame(
            stream,
            EncapCommand::REGISTER_SESSION,
            0,
            [0; 8],
            &[0x01, 0x00, 0x00, 0x00],
        )
        .await;
        let (header, payload) = read_frame(stream).await;
        assert_eq!(header.status, 0);
        assert_eq!(payload, vec![0x01, 0x00, 0x00, 0x00]);
        header.session_handle
    }

    fn rr_payload(request: &[u8]) -> Vec<u8> {
        let cpf = Cpf::new(vec![
            CpfItem::null_address(),
            CpfItem::new(item_type::UNCONNECTED_MESSAGE, request.to_vec()),
        ]);
        let mut out = BytesMut::new();
        out.put_u32_le(0);
        out.put_u16_le(0);
        out.put_slice(&cpf.encode());
        out.to_vec()
    }

    #[tokio::test]
    async fn test_register_round_trip() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        send_frame(
            &mut stream,
            EncapCommand::REGISTER_SESSION,
            0,
            *b"ctx:0001",
            &[0x01, 0x00, 0x00, 0x00],
        )
        .await;
        let (header, payload) = read_frame(&mut stream).await;

        assert_eq!(header.command, EncapCommand::REGISTER_SESSION);
        assert_ne!(header.session_handle, 0);
        assert_eq!(header.status, 0);
        assert_eq!(&header.sender_context, b"ctx:0001");
        assert_eq!(payload, vec![0x01, 0x00, 0x00, 0x00]);
    }

    #[tokio::test]
    async fn test_distinct_session_handles() {
        let addr = spawn_server().await;
        let mut a = TcpStream::connect(addr).await.unwrap();
        let mut b = TcpStream::connect(addr).await.unwrap();
        let handle_a = register(&mut a).await;
        let handle_b = register(&mut b).await;
        assert_ne!(handle_a, 0);
        assert_ne!(handle_b, 0);
        assert_ne!(handle_a, handle_b);
    }

    #[tokio::test]
    async fn test_command_before_register_is_rejected() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        send_frame(&mut stream, EncapCommand::SEND_RR_DATA, 0, [0; 8], &rr_payload(&[])).await;
        let (header, _) = read_frame(&mut stream).await;
        assert_eq!(header.status, status::INVALID_COMMAND);
    }

    #[tokio::test]
    async fn test_unknown_command_after_register() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let handle = register(&mut stream).await;

        send_frame(&mut stream, EncapCommand(0x0099), handle, *b"whatever", &[]).await;
        let (header, _) = read_frame(&mut stream).await;
        assert_eq!(header.status, status::INVALID_COMMAND);
        assert_eq!(header.command, EncapCommand(0x0099));
        assert_eq!(&header.sender_context, b"whatever");
    }

    #[tokio::test]
    async fn test_wrong_session_handle() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let handle = register(&mut stream).await;

        send_frame(
            &mut stream,
            EncapCommand::SEND_RR_DATA,
            handle.wrapping_add(7),
            [0; 8],
            &rr_payload(&[0x0E, 0x03, 0x20, 0x04, 0x24, 0x96, 0x30, 0x03]),
        )
        .await;
        let (header, _) = read_frame(&mut stream).await;
        assert_eq!(header.status, status::INVALID_SESSION_HANDLE);
    }

    #[tokio::test]
    async fn test_rr_data_dispatches_to_router() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let handle = register(&mut stream).await;

        // Get_Attribute_Single on assembly 150, attribute 3.
        let request = [0x0E, 0x03, 0x20, 0x04, 0x24, 0x96, 0x30, 0x03];
        send_frame(
            &mut stream,
            EncapCommand::SEND_RR_DATA,
            handle,
            [0; 8],
            &rr_payload(&request),
        )
        .await;
        let (header, payload) = read_frame(&mut stream).await;

        assert_eq!(header.status, 0);
        let cpf = Cpf::decode(&payload[6..]).unwrap();
        let item = cpf.find(item_type::UNCONNECTED_MESSAGE).unwrap();
        // service|0x80, reserved, status 0, no ext status, assembly bytes.
        assert_eq!(item.data.as_ref(), &[0x8E, 0x00, 0x00, 0x00, 0xAB, 0xCD]);
    }

    #[tokio::test]
    async fn test_rr_data_unknown_class_rides_inside_success() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let handle = register(&mut stream).await;

        let request = [0x0E, 0x02, 0x20, 0xFF, 0x24, 0x01];
        send_frame(
            &mut stream,
            EncapCommand::SEND_RR_DATA,
            handle,
            [0; 8],
            &rr_payload(&request),
        )
        .await;
        let (header, payload) = read_frame(&mut stream).await;

        assert_eq!(header.status, 0);
        let cpf = Cpf::decode(&payload[6..]).unwrap();
        let item = cpf.find(item_type::UNCONNECTED_MESSAGE).unwrap();
        assert_eq!(item.data.as_ref(), &[0x8E, 0x00, 0x16, 0x00]);
    }

    #[tokio::test]
    async fn test_malformed_rr_payload_sets_encap_status() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let handle = register(&mut stream).await;

        send_frame(&mut stream, EncapCommand::SEND_RR_DATA, handle, [0; 8], &[0x00, 0x00]).await;
        let (header, _) = read_frame(&mut stream).await;
        assert_eq!(header.status, status::INVALID_COMMAND);
    }

    #[tokio::test]
    async fn test_unit_data_echoes_address_and_sequence() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let handle = register(&mut stream).await;

        let request = [0x0E, 0x03, 0x20, 0x04, 0x24, 0x96, 0x30, 0x03];
        let mut data = BytesMut::new();
        data.put_u16_le(0x0042); // sequence
        data.put_slice(&request);
        let cpf = Cpf::new(vec![
            CpfItem::connected_address(0x2000_0001),
            CpfItem::new(item_type::CONNECTED_DATA, data.freeze()),
        ]);
        let mut payload = BytesMut::new();
        payload.put_u32_le(0);
        payload.put_u16_le(0);
        payload.put_slice(&cpf.encode());

        send_frame(&mut stream, EncapCommand::SEND_UNIT_DATA, handle, [0; 8], &payload).await;
        let (header, payload) = read_frame(&mut stream).await;
        assert_eq!(header.status, 0);

        let cpf = Cpf::decode(&payload[6..]).unwrap();
        let address = cpf.find(item_type::CONNECTED_ADDRESS).unwrap();
        assert_eq!(address.connection_id(), Some(0x2000_0001));
        let data = cpf.find(item_type::CONNECTED_DATA).unwrap();
        assert_eq!(&data.data[0..2], &[0x42, 0x00]); // sequence echoed
        assert_eq!(&data.data[2..], &[0x8E, 0x00, 0x00, 0x00, 0xAB, 0xCD]);
    }

    #[tokio::test]
    async fn test_oversize_frame_closes_without_reply() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        register(&mut stream).await;

        // Declare a payload larger than MAX_PACKET_SIZE; send only the header.
        let header = EncapHeader::new(EncapCommand::SEND_RR_DATA, 1, (MAX_PACKET_SIZE + 1) as u16);
        let mut out = BytesMut::new();
        header.put(&mut out);
        stream.write_all(&out).await.unwrap();

        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
            .await
            .expect("server must close promptly")
            .unwrap();
        assert_eq!(n, 0, "expected EOF, got a reply byte");
    }

    #[tokio::test]
    async fn test_unregister_closes_connection() {
        let addr = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let handle = register(&mut stream).await;

        send_frame(&mut stream, EncapCommand::UNREGISTER_SESSION, handle, [0; 8], &[]).await;

        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
            .await
            .expect("server must close promptly")
            .unwrap();
        assert_eq!(n, 0);
    }
}
