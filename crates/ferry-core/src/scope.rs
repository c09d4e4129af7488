//! Clone scope descriptor.
//!
//! Every capsule is constructed with a fixed descriptor declaring how far its
//! payload may travel and whether ownership can be handed off. Ferry capsules
//! are always cloneable across process boundaries and never transferable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How far a serialized payload may travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloneScope {
    /// Consumed on the same thread that produced it.
    SameProcessSameThread,
    /// Consumed in the same process, possibly on another thread.
    SameProcessDifferentThread,
    /// May leave the process; no in-process pointers may be embedded.
    DifferentProcess,
}

impl CloneScope {
    /// Wire representation of the scope.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::SameProcessSameThread => 1,
            Self::SameProcessDifferentThread => 2,
            Self::DifferentProcess => 3,
        }
    }

    /// Parse the wire representation of a scope.
    #[must_use]
    pub const fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::SameProcessSameThread),
            2 => Some(Self::SameProcessDifferentThread),
            3 => Some(Self::DifferentProcess),
            _ => None,
        }
    }
}

impl fmt::Display for CloneScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SameProcessSameThread => write!(f, "same-process-same-thread"),
            Self::SameProcessDifferentThread => write!(f, "same-process-different-thread"),
            Self::DifferentProcess => write!(f, "different-process"),
        }
    }
}

/// Whether values can be copied into the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloningSupport {
    /// Cloning is supported.
    Supported,
    /// Cloning is not supported.
    NotSupported,
}

/// Whether ownership of values can be moved into the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferSupport {
    /// Transfer (move) semantics are supported.
    Supported,
    /// Transfer (move) semantics are not supported.
    NotSupported,
}

/// The fixed capability descriptor of a capsule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeDescriptor {
    /// Copy semantics.
    pub cloning: CloningSupport,
    /// Move semantics.
    pub transferring: TransferSupport,
    /// How far the payload may travel.
    pub scope: CloneScope,
}

impl ScopeDescriptor {
    /// The descriptor used by every capsule: cloneable across isolation
    /// domains, copy not move.
    #[must_use]
    pub const fn cross_domain() -> Self {
        Self {
            cloning: CloningSupport::Supported,
            transferring: TransferSupport::NotSupported,
            scope: CloneScope::DifferentProcess,
        }
    }

    /// Whether copying is allowed.
    #[must_use]
    pub fn supports_cloning(&self) -> bool {
        self.cloning == CloningSupport::Supported
    }

    /// Whether ownership hand-off is allowed.
    #[must_use]
    pub fn supports_transfer(&self) -> bool {
        self.transferring == TransferSupport::Supported
    }
}

impl Default for ScopeDescriptor {
    fn default() -> Self {
        Self::cross_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_domain_descriptor() {
        let desc = ScopeDescriptor::cross_domain();
        assert!(desc.supports_cloning());
        assert!(!desc.supports_transfer());
        assert_eq!(desc.scope, CloneScope::DifferentProcess);
    }

    #[test]
    fn test_scope_wire_values() {
        for scope in [
            CloneScope::SameProcessSameThread,
            CloneScope::SameProcessDifferentThread,
            CloneScope::DifferentProcess,
        ] {
            assert_eq!(CloneScope::from_u32(scope.as_u32()), Some(scope));
        }
        assert_eq!(CloneScope::from_u32(0), None);
        assert_eq!(CloneScope::from_u32(4), None);
    }

    #[test]
    fn test_scope_ordering() {
        assert!(CloneScope::DifferentProcess > CloneScope::SameProcessSameThread);
    }
}
