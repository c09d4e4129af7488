//! Ferry Realm - Isolation domains and the boundary checks between them.
//!
//! This crate provides:
//! - The [`SecurityLayer`] trait: unwrap, wrap and realm entry primitives
//! - [`RealmEntry`], a scoped guard that restores the ambient realm on drop
//! - [`BoundaryGuard`], which resolves the effective realm for a value and
//!   re-checks values on their way back to the caller
//! - [`RealmRegistry`], an in-process realm layer with per-realm heaps and
//!   principal-based access control
//!
//! # Security Model
//!
//! A realm may reach another realm only if its principal subsumes the
//! other's. Values never cross a boundary without an unwrap on the way in
//! and a wrap on the way out; both steps fail closed.
//!
//! # Example
//!
//! ```
//! use ferry_core::{Principal, Value};
//! use ferry_realm::{BoundaryGuard, RealmRegistry, SecurityLayer};
//!
//! let registry = RealmRegistry::new("main", Principal::origin("https://a.example"));
//! let other = registry.create_realm("other", Principal::origin("https://b.example"));
//!
//! let guard = BoundaryGuard::new(&registry);
//! assert!(guard.resolve(Value::from(42), Some(other)).is_err());
//!
//! let resolved = guard.resolve(Value::from(42), None).unwrap();
//! assert_eq!(resolved.realm, registry.current_realm());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod entry;
mod guard;
mod layer;
mod registry;

pub use entry::RealmEntry;
pub use guard::{BoundaryGuard, Resolved};
pub use layer::SecurityLayer;
pub use registry::RealmRegistry;
