//! Ferry Capsule - Opaque value snapshots that cross realm boundaries.
//!
//! This crate provides:
//! - [`SegmentedBuffer`], the append-only byte store behind every capsule
//! - The [`HostWriter`] / [`HostReader`] stream traits with buffer-backed
//!   implementations
//! - The [`CloneEngine`] seam and [`StructuredCloneEngine`], a reference
//!   engine over a [`ferry_realm::RealmRegistry`] heap
//! - [`Capsule`]: write-once storage with realm-scoped write, read and
//!   materialize operations
//! - The envelope codec ([`envelope`]) that frames a capsule inside a host
//!   stream
//! - [`CapsuleHandle`], the shared handle exposed to script
//!
//! # Lifecycle
//!
//! A capsule is created empty, filled exactly once (by a write or by decoding
//! an envelope) and read any number of times. Writing happens inside the
//! value's realm. Reading happens inside a target realm the caller can
//! reach, and the result is wrapped back into the caller's realm before it
//! is returned.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use ferry_capsule::{CapsuleHandle, StructuredCloneEngine};
//! use ferry_core::{Principal, Value};
//! use ferry_realm::{RealmRegistry, SecurityLayer};
//!
//! let registry = Arc::new(RealmRegistry::new("main", Principal::origin("https://a.example")));
//! let engine = StructuredCloneEngine::new(Arc::clone(&registry));
//! let main = registry.current_realm();
//!
//! let handle = CapsuleHandle::construct(registry.as_ref(), &engine, Value::from(42), None).unwrap();
//! let value = handle.deserialize(registry.as_ref(), &engine, main).unwrap();
//! assert_eq!(value, Value::from(42));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod envelope;
pub mod prelude;

mod buffer;
mod capsule;
mod engine;
mod handle;
mod limits;
mod stream;
mod structured;

pub use buffer::{DEFAULT_SEGMENT_SIZE, SegmentIter, SegmentedBuffer};
pub use capsule::{Capsule, Materialized};
pub use engine::{CloneEngine, FORMAT_VERSION};
pub use envelope::CAPSULE_TAG;
pub use handle::CapsuleHandle;
pub use limits::CodecLimits;
pub use stream::{BufferReader, BufferWriter, HostReader, HostWriter, WORD_PAIR_LEN};
pub use structured::{MAX_DEPTH, StructuredCloneEngine};
