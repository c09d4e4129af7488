//! Error types for capsule operations.

use thiserror::Error;

use crate::types::{ObjectId, RealmId};

/// Errors that can occur while writing, reading, encoding or decoding a
/// capsule.
///
/// None of these are retried internally. Every operation that fails restores
/// the ambient realm before the error reaches the caller.
#[derive(Debug, Error)]
pub enum CloneError {
    /// A realm or object could not be unwrapped by the caller.
    #[error("access denied to {realm}: {reason}")]
    AccessDenied {
        /// The realm that could not be reached.
        realm: RealmId,
        /// Why access was refused.
        reason: String,
    },

    /// The serialization engine rejected the value or the bytes.
    #[error("serialization engine error: {0}")]
    EngineError(String),

    /// A decoded value could not be re-expressed in the caller's realm.
    #[error("cannot wrap value into {realm}: {reason}")]
    WrapFailed {
        /// The realm the value was being wrapped into.
        realm: RealmId,
        /// Why wrapping failed.
        reason: String,
    },

    /// The host stream held fewer bytes than the envelope declared.
    #[error("envelope truncated: declared {declared} bytes, only {available} available")]
    EnvelopeTruncated {
        /// Declared byte count.
        declared: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// Write was invoked on a capsule that already holds a buffer.
    #[error("capsule already holds a buffer")]
    AlreadyWritten,

    /// The capsule has no buffer to read or encode.
    #[error("capsule is empty")]
    EmptyCapsule,

    /// The envelope header is not a capsule header.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The payload is too large to be framed.
    #[error("envelope too large: {len} bytes exceeds limit of {limit}")]
    EnvelopeTooLarge {
        /// Payload length.
        len: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The realm is not known to the realm layer.
    #[error("unknown realm: {0}")]
    UnknownRealm(RealmId),

    /// The object is not present in its home realm's heap.
    #[error("unknown object: {0}")]
    UnknownObject(ObjectId),

    /// The object exists but is not a capsule.
    #[error("{0} is not a capsule")]
    NotACapsule(ObjectId),
}

impl CloneError {
    /// Create an engine error.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::EngineError(msg.into())
    }

    /// Whether this error comes from a failed security check.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }
}

/// Result type for capsule operations.
pub type CloneResult<T> = Result<T, CloneError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display() {
        let realm = RealmId::from_uuid(Uuid::nil());
        let err = CloneError::AccessDenied {
            realm,
            reason: "principal mismatch".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "access denied to realm:00000000: principal mismatch"
        );

        let err = CloneError::EnvelopeTruncated {
            declared: 4096,
            available: 10,
        };
        assert_eq!(
            err.to_string(),
            "envelope truncated: declared 4096 bytes, only 10 available"
        );
    }

    #[test]
    fn test_access_denied_predicate() {
        let denied = CloneError::AccessDenied {
            realm: RealmId::new(),
            reason: String::new(),
        };
        assert!(denied.is_access_denied());
        assert!(!CloneError::engine("boom").is_access_denied());
    }
}
