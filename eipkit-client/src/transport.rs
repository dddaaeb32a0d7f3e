//! TCP transport for encapsulation frames.

use crate::error::ClientError;
use bytes::{Bytes, BytesMut};
use eipkit_protocol::{EncapCommand, EncapHeader, Packet, DEFAULT_PORT, HEADER_SIZE, MAX_PACKET_SIZE};
use eipkit_protocol::ProtocolError;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// TCP connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn with_default_port(addr: &str) -> String {
    if addr.contains(':') {
        addr.to_string()
    } else {
        format!("{}:{}", addr, DEFAULT_PORT)
    }
}

/// A connected byte-oriented transport carrying encapsulation frames.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connects to the target, appending the default EIP port when none is
    /// supplied.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let addr = with_default_port(addr);
        tracing::debug!("connecting to {}", addr);

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| ClientError::ConnectTimeout)??;
        stream.set_nodelay(true).ok();

        Ok(Self { stream })
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Sends one encapsulation frame.
    pub async fn send(
        &mut self,
        command: EncapCommand,
        payload: &[u8],
        session_handle: u32,
    ) -> Result<(), ClientError> {
        let packet = Packet::new(command, session_handle, Bytes::copy_from_slice(payload));
        let encoded = packet.encode()?;
        tracing::debug!("send {} ({} payload bytes)", packet.header, payload.len());
        self.stream.write_all(&encoded).await?;
        Ok(())
    }

    /// Receives one encapsulation frame: exactly 24 header bytes, then the
    /// declared payload.
    pub async fn receive(&mut self) -> Result<Packet, ClientError> {
        let mut raw = [0u8; HEADER_SIZE];
        self.stream.read_exact(&mut raw).await?;
        let header = EncapHeader::from_bytes(&raw);

        if header.length as usize > MAX_PACKET_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: header.length as usize,
                max: MAX_PACKET_SIZE,
            }
            .into());
        }

        let mut payload = BytesMut::zeroed(header.length as usize);
        if header.length > 0 {
            self.stream.read_exact(&mut payload).await?;
        }
        tracing::debug!("recv {}", header);

        Ok(Packet {
            header,
            payload: payload.freeze(),
        })
    }

    /// Shuts the stream down.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
