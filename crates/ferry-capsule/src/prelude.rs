//! Prelude module - commonly used types for convenient import.
//!
//! Use `use ferry_capsule::prelude::*;` to import all essential types.

pub use crate::{
    BufferReader, BufferWriter, Capsule, CapsuleHandle, CloneEngine, CodecLimits, HostReader,
    HostWriter, Materialized, SegmentedBuffer, StructuredCloneEngine,
};
