//! The realm/security layer interface.

use ferry_core::{CloneResult, ObjectRef, RealmId, Value};

/// Realm isolation and access-control primitives.
///
/// Implementations track an *ambient* realm (the realm code is currently
/// running in) and decide whether that realm may reach other realms and
/// their objects.
///
/// Callers should not use [`enter_realm`](Self::enter_realm) and
/// [`restore_realm`](Self::restore_realm) directly; [`RealmEntry`](crate::RealmEntry)
/// pairs them so the ambient realm is restored on every exit path.
pub trait SecurityLayer: Send + Sync {
    /// The ambient realm.
    fn current_realm(&self) -> RealmId;

    /// Check that the ambient realm may reach `target`.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::AccessDenied`](ferry_core::CloneError::AccessDenied)
    /// if the ambient realm's principal does not subsume the target's, or
    /// the target is no longer usable.
    fn unwrap_realm(&self, target: RealmId) -> CloneResult<RealmId>;

    /// Strip any cross-realm wrapper from `object`, returning a direct
    /// reference in the object's home realm.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::AccessDenied`](ferry_core::CloneError::AccessDenied)
    /// if the realm holding the wrapper may not see through it, or the
    /// ambient realm may not reach the object's home realm.
    fn unwrap_object(&self, object: &ObjectRef) -> CloneResult<ObjectRef>;

    /// Re-express `value` as seen from `realm`.
    ///
    /// Primitives pass through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::WrapFailed`](ferry_core::CloneError::WrapFailed)
    /// if no wrapper can be created.
    fn wrap_into(&self, value: Value, realm: RealmId) -> CloneResult<Value>;

    /// Make `realm` the ambient realm, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::UnknownRealm`](ferry_core::CloneError::UnknownRealm)
    /// if the realm does not exist.
    fn enter_realm(&self, realm: RealmId) -> CloneResult<RealmId>;

    /// Make `previous` the ambient realm again.
    fn restore_realm(&self, previous: RealmId);
}

impl<L: SecurityLayer + ?Sized> SecurityLayer for &L {
    fn current_realm(&self) -> RealmId {
        (**self).current_realm()
    }

    fn unwrap_realm(&self, target: RealmId) -> CloneResult<RealmId> {
        (**self).unwrap_realm(target)
    }

    fn unwrap_object(&self, object: &ObjectRef) -> CloneResult<ObjectRef> {
        (**self).unwrap_object(object)
    }

    fn wrap_into(&self, value: Value, realm: RealmId) -> CloneResult<Value> {
        (**self).wrap_into(value, realm)
    }

    fn enter_realm(&self, realm: RealmId) -> CloneResult<RealmId> {
        (**self).enter_realm(realm)
    }

    fn restore_realm(&self, previous: RealmId) {
        (**self).restore_realm(previous);
    }
}

impl<L: SecurityLayer + ?Sized> SecurityLayer for std::sync::Arc<L> {
    fn current_realm(&self) -> RealmId {
        (**self).current_realm()
    }

    fn unwrap_realm(&self, target: RealmId) -> CloneResult<RealmId> {
        (**self).unwrap_realm(target)
    }

    fn unwrap_object(&self, object: &ObjectRef) -> CloneResult<ObjectRef> {
        (**self).unwrap_object(object)
    }

    fn wrap_into(&self, value: Value, realm: RealmId) -> CloneResult<Value> {
        (**self).wrap_into(value, realm)
    }

    fn enter_realm(&self, realm: RealmId) -> CloneResult<RealmId> {
        (**self).enter_realm(realm)
    }

    fn restore_realm(&self, previous: RealmId) {
        (**self).restore_realm(previous);
    }
}
