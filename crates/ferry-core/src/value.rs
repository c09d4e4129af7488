//! The host value model.
//!
//! A [`Value`] is either a primitive or a reference to an object living in
//! some realm's heap. Object references remember both the realm that owns
//! the object and the realm they are viewed from; when the two differ the
//! reference is a cross-realm wrapper and must be unwrapped through the
//! security layer before the object can be touched.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ObjectId, RealmId};

/// A reference to a heap object as seen from a particular realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// The referenced object.
    pub id: ObjectId,
    /// The realm whose heap owns the object.
    pub home: RealmId,
    /// The realm this reference belongs to.
    pub seen_from: RealmId,
}

impl ObjectRef {
    /// A direct (non-wrapper) reference to an object in its own realm.
    #[must_use]
    pub fn local(id: ObjectId, home: RealmId) -> Self {
        Self {
            id,
            home,
            seen_from: home,
        }
    }

    /// Whether this reference crosses a realm boundary.
    #[must_use]
    pub fn is_wrapper(&self) -> bool {
        self.home != self.seen_from
    }

    /// The same object, viewed from another realm.
    #[must_use]
    pub fn viewed_from(self, realm: RealmId) -> Self {
        Self {
            seen_from: realm,
            ..self
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_wrapper() {
            write!(f, "{}@{} (via {})", self.id, self.home, self.seen_from)
        } else {
            write!(f, "{}@{}", self.id, self.home)
        }
    }
}

/// A host value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The `undefined` value; also the "no value" sentinel.
    #[default]
    Undefined,
    /// The `null` value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string.
    String(String),
    /// A reference to a heap object.
    Object(ObjectRef),
}

impl Value {
    /// Whether this value is `undefined`.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Whether this value denotes an object.
    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// The object reference, if this value denotes an object.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// The number, if this value is a number.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The string contents, if this value is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short type name used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(_) => "object",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Self::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_undefined() {
        assert!(Value::default().is_undefined());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(42), Value::Number(42.0));
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(1.5).as_number(), Some(1.5));
    }

    #[test]
    fn test_wrapper_detection() {
        let home = RealmId::new();
        let other = RealmId::new();
        let local = ObjectRef::local(ObjectId(1), home);
        assert!(!local.is_wrapper());

        let wrapped = local.viewed_from(other);
        assert!(wrapped.is_wrapper());
        assert_eq!(wrapped.id, local.id);
        assert_eq!(wrapped.home, home);
    }

    #[test]
    fn test_object_value() {
        let obj = ObjectRef::local(ObjectId(3), RealmId::new());
        let value = Value::from(obj);
        assert!(value.is_object());
        assert_eq!(value.as_object(), Some(&obj));
        assert_eq!(value.type_name(), "object");
    }
}
