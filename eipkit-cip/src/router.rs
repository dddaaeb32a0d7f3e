//! Message Router object (class 0x02).
//!
//! The router indexes application objects by class id and always produces a
//! response: unknown classes and application failures are expressed as a
//! non-zero general status, never as transport errors.

use crate::error::CipError;
use crate::message::{MessageRouterRequest, MessageRouterResponse};
use crate::path::split_class;
use crate::types::service;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// An application object addressable through the router.
///
/// `path` is the request path with the leading class segment stripped;
/// objects parse their own instance/attribute segments from it.
pub trait CipObject: Send + Sync {
    fn handle(&self, service: u8, path: &[u8], data: &[u8]) -> Result<Vec<u8>, CipError>;
}

/// Routes message-router requests to registered objects.
///
/// Registration is infrequent and takes the write lock; dispatch takes the
/// read lock and is safe for concurrent callers.
#[derive(Default)]
pub struct MessageRouter {
    objects: RwLock<HashMap<u16, Arc<dyn CipObject>>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an object under a class id, replacing any previous one.
    pub fn register(&self, class_id: u16, object: Arc<dyn CipObject>) {
        self.objects.write().insert(class_id, object);
    }

    /// Dispatches a request, folding all failures into the response status.
    pub fn dispatch(&self, req: &MessageRouterRequest) -> MessageRouterResponse {
        let reply_service = req.service | service::REPLY_FLAG;

        let (class_id, remaining) = match split_class(req.path.as_bytes()) {
            Ok(parsed) => parsed,
            Err(err) => return error_response(reply_service, err),
        };

        let object = match self.objects.read().get(&class_id) {
            Some(object) => Arc::clone(object),
            None => {
                return error_response(reply_service, CipError::object_does_not_exist());
            }
        };

        match object.handle(req.service, remaining, &req.data) {
            Ok(data) => MessageRouterResponse {
                service: reply_service,
                general_status: 0,
                ext_status: Vec::new(),
                data: Bytes::from(data),
            },
            Err(err) => error_response(reply_service, err),
        }
    }
}

fn error_response(reply_service: u8, err: CipError) -> MessageRouterResponse {
    MessageRouterResponse {
        service: reply_service,
        general_status: err.status,
        ext_status: err.ext_status,
        data: Bytes::new(),
    }
}
