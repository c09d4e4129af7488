//! Prelude module - commonly used types for convenient import.
//!
//! Use `use ferry_realm::prelude::*;` to import all essential types.

pub use crate::{BoundaryGuard, RealmEntry, RealmRegistry, Resolved, SecurityLayer};
