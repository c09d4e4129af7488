//! Heap object kinds.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// A native object exposed to script through a realm heap.
///
/// Host objects are opaque to the realm layer; whoever created them recovers
/// the concrete type through [`HostObject::as_any`].
pub trait HostObject: Any + Send + Sync + fmt::Debug {
    /// Class name reported in diagnostics.
    fn class_name(&self) -> &'static str;

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// The contents of a heap object.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    /// An ordinary object with ordered own properties.
    Plain(Vec<(String, Value)>),
    /// A dense array.
    Array(Vec<Value>),
    /// A callable. Never cloneable.
    Function {
        /// Function name, for diagnostics.
        name: String,
    },
    /// A native host object.
    Host(Arc<dyn HostObject>),
}

impl ObjectKind {
    /// An empty plain object.
    #[must_use]
    pub fn empty() -> Self {
        Self::Plain(Vec::new())
    }

    /// Build a plain object from `(key, value)` pairs.
    #[must_use]
    pub fn plain<I, K>(props: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Plain(props.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Class name reported in diagnostics.
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Plain(_) => "Object",
            Self::Array(_) => "Array",
            Self::Function { .. } => "Function",
            Self::Host(host) => host.class_name(),
        }
    }

    /// Look up an own property of a plain object.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Plain(props) => props.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}
