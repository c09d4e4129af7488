//! Ferry Core - Foundation types for cross-realm structured-clone capsules.
//!
//! This crate provides:
//! - Realm and object identifiers
//! - Security principals and the subsumption relation between them
//! - The host [`Value`] model and heap object kinds
//! - The clone scope descriptor carried by every capsule
//! - The [`CloneError`] taxonomy shared by every Ferry crate
//!
//! # Example
//!
//! ```
//! use ferry_core::{Principal, Value};
//!
//! let system = Principal::System;
//! let content = Principal::origin("https://example.com");
//!
//! assert!(system.subsumes(&content));
//! assert!(!content.subsumes(&system));
//!
//! let answer = Value::from(42);
//! assert!(!answer.is_object());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod object;
mod principal;
mod scope;
mod types;
mod value;

pub use error::{CloneError, CloneResult};
pub use object::{HostObject, ObjectKind};
pub use principal::Principal;
pub use scope::{CloneScope, CloningSupport, ScopeDescriptor, TransferSupport};
pub use types::{ObjectId, RealmId};
pub use value::{ObjectRef, Value};
