//! Controller tag enumeration via the Symbol object.

use crate::client::Client;
use crate::error::ClientError;
use eipkit_cip::error::status;
use eipkit_cip::symbol::{
    class_attributes_request, decode_class_attributes, decode_instance_attributes,
    instance_attributes_request,
};
use eipkit_cip::SymbolInstance;

impl Client {
    /// Lists controller tags by walking Symbol-class instances.
    ///
    /// Instances answering ObjectDoesNotExist or PathDestinationUnknown are
    /// holes in the table and are skipped; any other application error, and
    /// any transport failure, terminates the enumeration.
    pub async fn list_tags(&mut self) -> Result<Vec<SymbolInstance>, ClientError> {
        let response = self
            .session()
            .send_cip_request(&class_attributes_request())
            .await?;
        response.cip_error()?;
        let (_revision, max_instance) = decode_class_attributes(&response.data)?;
        tracing::debug!("symbol class reports max instance {}", max_instance);

        let mut tags = Vec::new();
        for instance_id in 1..=max_instance as u32 {
            let response = self
                .session()
                .send_cip_request(&instance_attributes_request(instance_id))
                .await?;

            match response.general_status {
                status::SUCCESS => {}
                status::OBJECT_DOES_NOT_EXIST | status::PATH_DESTINATION_UNKNOWN => continue,
                _ => response.cip_error()?,
            }

            let (name, data_type) = decode_instance_attributes(&response.data)?;
            if !name.is_empty() {
                tags.push(SymbolInstance {
                    instance_id,
                    name,
                    data_type,
                });
            }
        }

        Ok(tags)
    }
}
