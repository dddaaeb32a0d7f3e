//! # eipkit-objects
//!
//! Library-shipped CIP application objects: the Assembly object (class
//! 0x04) whose instances stage cyclic I/O bytes, and the Identity object
//! (class 0x01) describing the device. Both plug into the message router
//! through the [`eipkit_cip::CipObject`] trait.

pub mod assembly;
pub mod identity;

pub use assembly::{AssemblyInstance, AssemblyObject};
pub use identity::IdentityObject;
