//! Assembly object (class 0x04).
//!
//! Instances present a flat byte buffer of fixed size. Attribute 3 is the
//! data; writes must match the registered length exactly.

use eipkit_cip::error::status;
use eipkit_cip::path::{parse_segments, PathSegment};
use eipkit_cip::types::service;
use eipkit_cip::{CipError, CipObject};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// The data attribute of an assembly instance.
pub const ATTR_DATA: u16 = 3;

/// A single assembly instance with a fixed-size buffer.
pub struct AssemblyInstance {
    id: u32,
    data: RwLock<Vec<u8>>,
}

impl AssemblyInstance {
    pub fn new(id: u32, size: usize) -> Self {
        Self {
            id,
            data: RwLock::new(vec![0; size]),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Registered buffer size in bytes.
    pub fn size(&self) -> usize {
        self.data.read().len()
    }

    /// Returns a copy of the current data.
    pub fn read(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Replaces the data; the new bytes must match the registered size.
    pub fn write(&self, data: &[u8]) -> Result<(), CipError> {
        let mut guard = self.data.write();
        if data.len() != guard.len() {
            return Err(CipError::new(status::INVALID_ATTRIBUTE_VALUE));
        }
        guard.copy_from_slice(data);
        Ok(())
    }
}

/// The Assembly object: a registry of instances addressed by id.
#[derive(Default)]
pub struct AssemblyObject {
    instances: RwLock<HashMap<u32, Arc<AssemblyInstance>>>,
}

impl AssemblyObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a zero-filled instance of the given size.
    pub fn register(&self, id: u32, size: usize) -> Arc<AssemblyInstance> {
        let instance = Arc::new(AssemblyInstance::new(id, size));
        self.instances.write().insert(id, Arc::clone(&instance));
        instance
    }

    /// Looks up an instance by id.
    pub fn instance(&self, id: u32) -> Option<Arc<AssemblyInstance>> {
        self.instances.read().get(&id).cloned()
    }

    pub fn instance_ids(&self) -> Vec<u32> {
        self.instances.read().keys().copied().collect()
    }

    fn resolve(&self, path: &[u8]) -> Result<(Arc<AssemblyInstance>, u16), CipError> {
        let segments = parse_segments(path)?;
        let mut iter = segments.into_iter();

        let instance_id = match iter.next() {
            Some(PathSegment::Instance(id)) => id,
            _ => return Err(CipError::path_segment_error()),
        };
        let attribute_id = match iter.next() {
            Some(PathSegment::Attribute(attr)) => attr,
            None => return Err(CipError::path_segment_error()),
            Some(_) => return Err(CipError::path_segment_error()),
        };

        let instance = self
            .instance(instance_id)
            .ok_or_else(CipError::object_does_not_exist)?;
        Ok((instance, attribute_id))
    }
}

impl CipObject for AssemblyObject {
    fn handle(&self, svc: u8, path: &[u8], data: &[u8]) -> Result<Vec<u8>, CipError> {
        match svc {
            service::GET_ATTRIBUTE_SINGLE => {
                let (instance, attribute) = self.resolve(path)?;
                if attribute != ATTR_DATA {
                    return Err(CipError::new(status::ATTRIBUTE_NOT_SUPPORTED));
                }
                Ok(instance.read())
            }
            service::SET_ATTRIBUTE_SINGLE => {
                let (instance, attribute) = self.resolve(path)?;
                if attribute != ATTR_DATA {
                    return Err(CipError::new(status::ATTRIBUTE_NOT_SUPPORTED));
                }
                instance.write(data)?;
                Ok(Vec::new())
            }
            _ => Err(CipError::service_not_supported()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_rw() {
        let assemblies = AssemblyObject::new();
        let instance = assemblies.register(100, 4);
        assert_eq!(instance.read(), vec![0, 0, 0, 0]);

        instance.write(&[1, 2, 3, 4]).unwrap();
        assert_eq!(assemblies.instance(100).unwrap().read(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_size_is_strict() {
        let instance = AssemblyInstance::new(1, 4);
        let err = instance.write(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.status, status::INVALID_ATTRIBUTE_VALUE);
        let err = instance.write(&[0; 5]).unwrap_err();
        assert_eq!(err.status, status::INVALID_ATTRIBUTE_VALUE);
    }

    #[test]
    fn test_get_attribute_single() {
        let assemblies = AssemblyObject::new();
        assemblies.register(150, 2).write(&[0xAB, 0xCD]).unwrap();

        // Path: instance 150, attribute 3 (class already stripped).
        let out = assemblies
            .handle(service::GET_ATTRIBUTE_SINGLE, &[0x24, 0x96, 0x30, 0x03], &[])
            .unwrap();
        assert_eq!(out, vec![0xAB, 0xCD]);
    }

    #[test]
    fn test_set_attribute_single() {
        let assemblies = AssemblyObject::new();
        assemblies.register(150, 2);

        assemblies
            .handle(
                service::SET_ATTRIBUTE_SINGLE,
                &[0x24, 0x96, 0x30, 0x03],
                &[0x11, 0x22],
            )
            .unwrap();
        assert_eq!(assemblies.instance(150).unwrap().read(), vec![0x11, 0x22]);

        let err = assemblies
            .handle(service::SET_ATTRIBUTE_SINGLE, &[0x24, 0x96, 0x30, 0x03], &[0x11])
            .unwrap_err();
        assert_eq!(err.status, status::INVALID_ATTRIBUTE_VALUE);
    }

    #[test]
    fn test_unknown_instance() {
        let assemblies = AssemblyObject::new();
        let err = assemblies
            .handle(service::GET_ATTRIBUTE_SINGLE, &[0x24, 0x07, 0x30, 0x03], &[])
            .unwrap_err();
        assert_eq!(err.status, status::OBJECT_DOES_NOT_EXIST);
    }

    #[test]
    fn test_unknown_attribute() {
        let assemblies = AssemblyObject::new();
        assemblies.register(1, 1);
        let err = assemblies
            .handle(service::GET_ATTRIBUTE_SINGLE, &[0x24, 0x01, 0x30, 0x04], &[])
            .unwrap_err();
        assert_eq!(err.status, status::ATTRIBUTE_NOT_SUPPORTED);
    }

    #[test]
    fn test_missing_attribute_segment() {
        let assemblies = AssemblyObject::new();
        assemblies.register(1, 1);
        let err = assemblies
            .handle(service::GET_ATTRIBUTE_SINGLE, &[0x24, 0x01], &[])
            .unwrap_err();
        assert_eq!(err.status, status::PATH_SEGMENT_ERROR);
    }

    #[test]
    fn test_unsupported_service() {
        let assemblies = AssemblyObject::new();
        assemblies.register(1, 1);
        let err = assemblies
            .handle(service::RESET, &[0x24, 0x01, 0x30, 0x03], &[])
            .unwrap_err();
        assert_eq!(err.status, status::SERVICE_NOT_SUPPORTED);
    }

    #[test]
    fn test_wide_instance_segment() {
        let assemblies = AssemblyObject::new();
        assemblies.register(0x0196, 1);
        let out = assemblies
            .handle(
                service::GET_ATTRIBUTE_SINGLE,
                &[0x25, 0x00, 0x96, 0x01, 0x30, 0x03],
                &[],
            )
            .unwrap();
        assert_eq!(out, vec![0]);
    }
}
