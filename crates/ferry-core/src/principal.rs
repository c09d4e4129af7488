//! Security principals.
//!
//! Every realm carries a principal. Access from one realm to another is
//! decided purely by [`Principal::subsumes`]: the accessing realm's principal
//! must subsume the principal of the realm being reached.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The security principal associated with a realm.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Principal {
    /// The privileged system principal. Subsumes every other principal.
    System,
    /// A content principal identified by its origin.
    Origin(String),
    /// An opaque principal that only subsumes itself.
    Null(Uuid),
    /// A principal aggregating several origins. Subsumes each of them.
    Expanded(Vec<String>),
}

impl Principal {
    /// Create an origin principal.
    #[must_use]
    pub fn origin(origin: impl Into<String>) -> Self {
        Self::Origin(origin.into())
    }

    /// Create a fresh null principal.
    #[must_use]
    pub fn null() -> Self {
        Self::Null(Uuid::new_v4())
    }

    /// Create an expanded principal over the given origins.
    #[must_use]
    pub fn expanded<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Expanded(origins.into_iter().map(Into::into).collect())
    }

    /// Whether this is the system principal.
    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }

    /// Whether code running under `self` may access objects owned by `other`.
    #[must_use]
    pub fn subsumes(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::System, _) => true,
            (_, Self::System) => false,
            (Self::Origin(a), Self::Origin(b)) => a == b,
            (Self::Null(a), Self::Null(b)) => a == b,
            (Self::Expanded(origins), Self::Origin(b)) => origins.iter().any(|a| a == b),
            (Self::Expanded(mine), Self::Expanded(theirs)) => {
                theirs.iter().all(|b| mine.iter().any(|a| a == b))
            },
            _ => false,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "[System Principal]"),
            Self::Origin(origin) => write!(f, "{origin}"),
            Self::Null(id) => write!(f, "null:{id}"),
            Self::Expanded(origins) => write!(f, "[Expanded: {}]", origins.join(", ")),
        }
    }
}
