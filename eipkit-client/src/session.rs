//! Session layer: RegisterSession handshake and explicit-message framing.

use crate::error::ClientError;
use crate::transport::TcpTransport;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use eipkit_cip::{MessageRouterRequest, MessageRouterResponse};
use eipkit_protocol::cpf::{item_type, Cpf, CpfItem};
use eipkit_protocol::discovery::{
    decode_identity_items, decode_services_items, IdentityItem, ServicesItem,
};
use eipkit_protocol::hex::hexdump;
use eipkit_protocol::{EncapCommand, PROTOCOL_VERSION};

/// Interface handle (4) plus timeout (2) prefix on SendRRData/SendUnitData
/// payloads.
const RR_PREFIX: usize = 6;

/// One registered EIP session over a TCP transport.
///
/// Requests and replies are serialised on the single transport; replies
/// arrive in request order.
pub struct Session {
    transport: TcpTransport,
    session_handle: u32,
}

impl Session {
    /// Wraps a connected transport. The session is unregistered until
    /// [`register`](Self::register) succeeds.
    pub fn new(transport: TcpTransport) -> Self {
        Self {
            transport,
            session_handle: 0,
        }
    }

    /// Connects and registers in one step.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let mut session = Self::new(TcpTransport::connect(addr).await?);
        session.register().await?;
        Ok(session)
    }

    /// The handle assigned by the target; zero before registration.
    pub fn session_handle(&self) -> u32 {
        self.session_handle
    }

    /// Performs the RegisterSession handshake.
    pub async fn register(&mut self) -> Result<(), ClientError> {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u16_le(PROTOCOL_VERSION);
        payload.put_u16_le(0); // option flags

        self.transport
            .send(EncapCommand::REGISTER_SESSION, &payload, 0)
            .await?;
        let reply = self.transport.receive().await?;

        if reply.header.status != 0 {
            return Err(ClientError::RegisterFailed(reply.header.status));
        }
        self.session_handle = reply.header.session_handle;
        tracing::info!("session registered, handle {:#010X}", self.session_handle);
        Ok(())
    }

    /// Sends UnregisterSession. The target closes without replying.
    pub async fn unregister(&mut self) -> Result<(), ClientError> {
        self.transport
            .send(EncapCommand::UNREGISTER_SESSION, &[], self.session_handle)
            .await?;
        self.session_handle = 0;
        Ok(())
    }

    /// Releases the transport.
    pub async fn close(self) -> Result<(), ClientError> {
        self.transport.close().await
    }

    /// Sends an unconnected explicit request and returns the raw response
    /// bytes from the Unconnected Message item.
    pub async fn send_rr_data(&mut self, request: &[u8]) -> Result<Bytes, ClientError> {
        let cpf = Cpf::new(vec![
            CpfItem::null_address(),
            CpfItem::new(item_type::UNCONNECTED_MESSAGE, request.to_vec()),
        ]);

        let mut payload = BytesMut::with_capacity(RR_PREFIX + 2);
        payload.put_u32_le(0); // interface handle
        payload.put_u16_le(0); // timeout
        payload.put_slice(&cpf.encode());

        self.transport
            .send(EncapCommand::SEND_RR_DATA, &payload, self.session_handle)
            .await?;
        let reply = self.transport.receive().await?;

        if reply.header.status != 0 {
            return Err(ClientError::EncapFailed(reply.header.status));
        }
        if reply.payload.len() < RR_PREFIX {
            return Err(ClientError::ShortResponse);
        }

        let cpf = Cpf::decode(&reply.payload[RR_PREFIX..])?;
        let item = cpf
            .find(item_type::UNCONNECTED_MESSAGE)
            .ok_or(ClientError::MalformedResponse)?;
        Ok(item.data.clone())
    }

    /// Sends a class-3 explicit request over an established connection and
    /// returns the echoed sequence count and response PDU.
    pub async fn send_unit_data(
        &mut self,
        connection_id: u32,
        sequence: u16,
        pdu: &[u8],
    ) -> Result<(u16, Bytes), ClientError> {
        let mut data = BytesMut::with_capacity(2 + pdu.len());
        data.put_u16_le(sequence);
        data.put_slice(pdu);

        let cpf = Cpf::new(vec![
            CpfItem::connected_address(connection_id),
            CpfItem::new(item_type::CONNECTED_DATA, data.freeze()),
        ]);

        let mut payload = BytesMut::new();
        payload.put_u32_le(0);
        payload.put_u16_le(0);
        payload.put_slice(&cpf.encode());

        self.transport
            .send(EncapCommand::SEND_UNIT_DATA, &payload, self.session_handle)
            .await?;
        let reply = self.transport.receive().await?;

        if reply.header.status != 0 {
            return Err(ClientError::EncapFailed(reply.header.status));
        }
        if reply.payload.len() < RR_PREFIX {
            return Err(ClientError::ShortResponse);
        }

        let cpf = Cpf::decode(&reply.payload[RR_PREFIX..])?;
        let item = cpf
            .find(item_type::CONNECTED_DATA)
            .ok_or(ClientError::MalformedResponse)?;
        let mut data = item.data.clone();
        if data.len() < 2 {
            return Err(ClientError::MalformedResponse);
        }
        let sequence = data.get_u16_le();
        Ok((sequence, data))
    }

    /// Encodes a message-router request, round-trips it, decodes the reply.
    pub async fn send_cip_request(
        &mut self,
        request: &MessageRouterRequest,
    ) -> Result<MessageRouterResponse, ClientError> {
        let encoded = request.encode();
        tracing::debug!("CIP request:\n{}", hexdump(&encoded));

        let reply = self.send_rr_data(&encoded).await?;
        tracing::debug!("CIP response:\n{}", hexdump(&reply));

        Ok(MessageRouterResponse::decode(&reply)?)
    }

    /// Sends ListIdentity (no session handle, no payload).
    pub async fn list_identity(&mut self) -> Result<Vec<IdentityItem>, ClientError> {
        self.transport
            .send(EncapCommand::LIST_IDENTITY, &[], 0)
            .await?;
        let reply = self.transport.receive().await?;
        if reply.header.status != 0 {
            return Err(ClientError::EncapFailed(reply.header.status));
        }
        Ok(decode_identity_items(&reply.payload)?)
    }

    /// Sends ListServices (no session handle, no payload).
    pub async fn list_services(&mut self) -> Result<Vec<ServicesItem>, ClientError> {
        self.transport
            .send(EncapCommand::LIST_SERVICES, &[], 0)
            .await?;
        let reply = self.transport.receive().await?;
        if reply.header.status != 0 {
            return Err(ClientError::EncapFailed(reply.header.status));
        }
        Ok(decode_services_items(&reply.payload)?)
    }
}
