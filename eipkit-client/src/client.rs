//! High-level explicit-message client.

use crate::error::ClientError;
use crate::session::Session;
use bytes::Bytes;
use eipkit_cip::{
    CipValue, Counter, DataType, ElementaryValue, EPath, MessageRouterRequest, Timer,
};
use eipkit_protocol::discovery::{IdentityItem, ServicesItem};

/// An originator client over one registered session.
pub struct Client {
    session: Session,
}

impl Client {
    /// Connects to the target and registers a session.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        Ok(Self {
            session: Session::connect(addr).await?,
        })
    }

    pub fn from_session(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Unregisters and releases the transport.
    pub async fn close(mut self) -> Result<(), ClientError> {
        if let Err(e) = self.session.unregister().await {
            tracing::warn!("unregister failed: {}", e);
        }
        self.session.close().await
    }

    /// Reads one element of a tag. The returned bytes are the Read Tag
    /// response payload unchanged: `type_code:u16` followed by the element
    /// bytes.
    pub async fn read_tag(&mut self, tag: &str) -> Result<Bytes, ClientError> {
        let request = MessageRouterRequest::read_tag(EPath::to_tag(tag), 1);
        let response = self.session.send_cip_request(&request).await?;
        response.cip_error()?;
        Ok(response.data)
    }

    /// Reads a tag and decodes the element bytes after the type code.
    pub async fn read_tag_into<T: CipValue>(&mut self, tag: &str) -> Result<T, ClientError> {
        let data = self.read_tag(tag).await?;
        if data.len() < 2 {
            return Err(ClientError::MalformedResponse);
        }
        Ok(T::from_cip_bytes(&data[2..])?)
    }

    /// Reads a TIMER structure tag.
    pub async fn read_timer(&mut self, tag: &str) -> Result<Timer, ClientError> {
        self.read_tag_into(tag).await
    }

    /// Reads a COUNTER structure tag.
    pub async fn read_counter(&mut self, tag: &str) -> Result<Counter, ClientError> {
        self.read_tag_into(tag).await
    }

    /// Writes one element of a tag from raw value bytes.
    pub async fn write_tag(
        &mut self,
        tag: &str,
        type_code: DataType,
        value: &[u8],
    ) -> Result<(), ClientError> {
        let request = MessageRouterRequest::write_tag(EPath::to_tag(tag), type_code.0, 1, value);
        let response = self.session.send_cip_request(&request).await?;
        response.cip_error()?;
        Ok(())
    }

    /// Writes a typed elementary value to a tag.
    pub async fn write_tag_value<T: ElementaryValue>(
        &mut self,
        tag: &str,
        value: &T,
    ) -> Result<(), ClientError> {
        self.write_tag(tag, T::TYPE_CODE, &value.to_cip_bytes()).await
    }

    /// Reads a single attribute via Get_Attribute_Single.
    pub async fn get_attribute(
        &mut self,
        class_id: u16,
        instance_id: u32,
        attribute_id: u16,
    ) -> Result<Bytes, ClientError> {
        let request = MessageRouterRequest::get_attribute_single(EPath::to_object(
            class_id,
            instance_id,
            attribute_id,
        ));
        let response = self.session.send_cip_request(&request).await?;
        response.cip_error()?;
        Ok(response.data)
    }

    /// Writes a single attribute via Set_Attribute_Single.
    pub async fn set_attribute(
        &mut self,
        class_id: u16,
        instance_id: u32,
        attribute_id: u16,
        data: &[u8],
    ) -> Result<(), ClientError> {
        let request = MessageRouterRequest::set_attribute_single(
            EPath::to_object(class_id, instance_id, attribute_id),
            data.to_vec(),
        );
        let response = self.session.send_cip_request(&request).await?;
        response.cip_error()?;
        Ok(())
    }

    pub async fn list_identity(&mut self) -> Result<Vec<IdentityItem>, ClientError> {
        self.session.list_identity().await
    }

    pub async fn list_services(&mut self) -> Result<Vec<ServicesItem>, ClientError> {
        self.session.list_services().await
    }
}
