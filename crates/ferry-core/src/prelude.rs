//! Prelude module - commonly used types for convenient import.
//!
//! Use `use ferry_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{CloneError, CloneResult};

// Identifiers
pub use crate::{ObjectId, RealmId};

// Security
pub use crate::Principal;

// Values and heap objects
pub use crate::{HostObject, ObjectKind, ObjectRef, Value};

// Capsule capabilities
pub use crate::{CloneScope, CloningSupport, ScopeDescriptor, TransferSupport};
