//! The serialization engine seam.

use std::sync::Arc;

use ferry_core::{CloneResult, RealmId, Value};

use crate::buffer::SegmentedBuffer;

/// Format version written by [`crate::StructuredCloneEngine`].
pub const FORMAT_VERSION: u32 = 8;

/// Turns a live value into bytes and back.
///
/// Both directions run with `realm` already entered by the caller. The engine
/// owns the graph walk; capsules only store what it produces.
pub trait CloneEngine: Send + Sync {
    /// Format version stamped into every buffer this engine writes.
    fn version(&self) -> u32;

    /// Serialize `value`, which lives in `realm`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the value cannot be cloned.
    fn serialize(&self, value: &Value, realm: RealmId) -> CloneResult<SegmentedBuffer>;

    /// Rebuild a value in `realm` from bytes written at `version`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the bytes are malformed or the version is not
    /// understood.
    fn deserialize(
        &self,
        data: &SegmentedBuffer,
        version: u32,
        realm: RealmId,
    ) -> CloneResult<Value>;
}

impl<E: CloneEngine + ?Sized> CloneEngine for &E {
    fn version(&self) -> u32 {
        (**self).version()
    }

    fn serialize(&self, value: &Value, realm: RealmId) -> CloneResult<SegmentedBuffer> {
        (**self).serialize(value, realm)
    }

    fn deserialize(
        &self,
        data: &SegmentedBuffer,
        version: u32,
        realm: RealmId,
    ) -> CloneResult<Value> {
        (**self).deserialize(data, version, realm)
    }
}

impl<E: CloneEngine + ?Sized> CloneEngine for Arc<E> {
    fn version(&self) -> u32 {
        (**self).version()
    }

    fn serialize(&self, value: &Value, realm: RealmId) -> CloneResult<SegmentedBuffer> {
        (**self).serialize(value, realm)
    }

    fn deserialize(
        &self,
        data: &SegmentedBuffer,
        version: u32,
        realm: RealmId,
    ) -> CloneResult<Value> {
        (**self).deserialize(data, version, realm)
    }
}
