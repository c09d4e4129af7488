//! Shared capsule handles.

use std::any::Any;
use std::sync::Arc;

use ferry_core::{CloneError, CloneResult, HostObject, ObjectKind, ObjectRef, RealmId, Value};
use ferry_realm::{BoundaryGuard, RealmRegistry, SecurityLayer};
use tracing::debug;

use crate::capsule::{Capsule, Materialized};
use crate::engine::CloneEngine;

/// A reference-counted capsule, as handed to script.
///
/// Cloning the handle shares the capsule. The capsule is dropped with its
/// last handle.
#[derive(Debug, Clone)]
pub struct CapsuleHandle(Arc<Capsule>);

impl CapsuleHandle {
    /// Capture `value` into a new capsule.
    ///
    /// With an explicit `target`, the value is serialized inside that realm.
    /// Otherwise an object is serialized inside its home realm and a
    /// primitive inside the caller's.
    ///
    /// # Errors
    ///
    /// `AccessDenied` if the caller cannot reach the target or the object's
    /// home realm, or `EngineError` if the value cannot be cloned.
    pub fn construct<L, E>(
        layer: &L,
        engine: &E,
        value: Value,
        target: Option<RealmId>,
    ) -> CloneResult<Self>
    where
        L: SecurityLayer + ?Sized,
        E: CloneEngine + ?Sized,
    {
        let resolved = BoundaryGuard::new(layer).resolve(value, target)?;
        let capsule = Capsule::new();
        capsule.write(layer, engine, &resolved.value, resolved.realm)?;
        debug!(realm = %resolved.realm, "Constructed capsule");
        Ok(Self(Arc::new(capsule)))
    }

    /// Wrap an already-filled capsule.
    #[must_use]
    pub fn from_capsule(capsule: Capsule) -> Self {
        Self(Arc::new(capsule))
    }

    /// The shared capsule.
    #[must_use]
    pub fn capsule(&self) -> &Capsule {
        &self.0
    }

    /// Materialize the capsule in `target` for the caller.
    ///
    /// # Errors
    ///
    /// See [`Capsule::deserialize`].
    pub fn deserialize<L, E>(&self, layer: &L, engine: &E, target: RealmId) -> CloneResult<Value>
    where
        L: SecurityLayer + ?Sized,
        E: CloneEngine + ?Sized,
    {
        self.0.deserialize(layer, engine, target)
    }

    /// Materialize the capsule in `target`, keeping the sentinel on failure.
    pub fn materialize<L, E>(&self, layer: &L, engine: &E, target: RealmId) -> Materialized
    where
        L: SecurityLayer + ?Sized,
        E: CloneEngine + ?Sized,
    {
        self.0.materialize(layer, engine, target)
    }

    /// Number of live handles sharing this capsule.
    #[must_use]
    pub fn owners(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Whether two handles share the same capsule.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Place the handle in `realm`'s heap so it can be referenced from values.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRealm` if the realm does not exist.
    pub fn expose(&self, registry: &RealmRegistry, realm: RealmId) -> CloneResult<ObjectRef> {
        registry.allocate(realm, ObjectKind::Host(Arc::new(self.clone())))
    }

    /// Recover the handle behind a heap reference.
    ///
    /// The reference is unwrapped first, so an opaque wrapper is refused.
    ///
    /// # Errors
    ///
    /// `AccessDenied` if the reference cannot be unwrapped, or `NotACapsule`
    /// if the object is something else.
    pub fn from_object(registry: &RealmRegistry, object: &ObjectRef) -> CloneResult<Self> {
        let object = registry.unwrap_object(object)?;
        match registry.object(&object)? {
            ObjectKind::Host(host) => host
                .as_any()
                .downcast_ref::<Self>()
                .cloned()
                .ok_or(CloneError::NotACapsule(object.id)),
            _ => Err(CloneError::NotACapsule(object.id)),
        }
    }
}

impl HostObject for CapsuleHandle {
    fn class_name(&self) -> &'static str {
        "Capsule"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<Capsule> for CapsuleHandle {
    fn from(capsule: Capsule) -> Self {
        Self::from_capsule(capsule)
    }
}
