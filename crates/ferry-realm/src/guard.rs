//! The realm boundary guard.
//!
//! Resolves which realm a value must be serialized in, and re-checks values
//! when they are handed back to a caller in another realm. Every failure is
//! a hard error; there is no fallback to the ambient realm once an explicit
//! target or an object has been named.

use ferry_core::{CloneResult, RealmId, Value};
use tracing::{debug, warn};

use crate::layer::SecurityLayer;

/// The outcome of resolving a value against a realm boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// The realm the value must be serialized in.
    pub realm: RealmId,
    /// The value as seen from that realm.
    pub value: Value,
}

/// Applies the unwrap-then-rewrap discipline at a realm boundary.
pub struct BoundaryGuard<'a, L: SecurityLayer + ?Sized> {
    layer: &'a L,
}

impl<'a, L: SecurityLayer + ?Sized> BoundaryGuard<'a, L> {
    /// Create a guard over a security layer.
    #[must_use]
    pub fn new(layer: &'a L) -> Self {
        Self { layer }
    }

    /// Resolve the effective realm for `value`.
    ///
    /// - With an explicit target, the target is unwrapped and the value is
    ///   re-expressed inside it.
    /// - Otherwise an object value is unwrapped to its own home realm.
    /// - Any other value stays in the ambient realm unchanged.
    ///
    /// The ambient realm is not changed.
    ///
    /// # Errors
    ///
    /// Returns `AccessDenied` if the target realm or the object cannot be
    /// unwrapped, or `WrapFailed` if the value cannot be re-expressed in the
    /// target realm.
    pub fn resolve(&self, value: Value, target: Option<RealmId>) -> CloneResult<Resolved> {
        if let Some(target) = target {
            let realm = self.layer.unwrap_realm(target).inspect_err(|e| {
                warn!(%target, error = %e, "target realm rejected");
            })?;
            let value = self.layer.wrap_into(value, realm)?;
            debug!(%realm, "resolved explicit target realm");
            return Ok(Resolved { realm, value });
        }

        if let Value::Object(obj) = &value {
            let unwrapped = self.layer.unwrap_object(obj).inspect_err(|e| {
                warn!(object = %obj, error = %e, "object unwrap rejected");
            })?;
            debug!(realm = %unwrapped.home, object = %unwrapped, "resolved object home realm");
            return Ok(Resolved {
                realm: unwrapped.home,
                value: Value::Object(unwrapped),
            });
        }

        Ok(Resolved {
            realm: self.layer.current_realm(),
            value,
        })
    }

    /// Check that the ambient realm may enter `target` to materialize a
    /// value there.
    ///
    /// # Errors
    ///
    /// Returns `AccessDenied` if the target cannot be unwrapped.
    pub fn admit(&self, target: RealmId) -> CloneResult<RealmId> {
        self.layer.unwrap_realm(target).inspect_err(|e| {
            warn!(%target, error = %e, "deserialization target rejected");
        })
    }

    /// Hand a value produced in another realm back to `caller`.
    ///
    /// # Errors
    ///
    /// Returns `WrapFailed` if the value cannot be re-expressed in the
    /// caller's realm.
    pub fn hand_back(&self, value: Value, caller: RealmId) -> CloneResult<Value> {
        self.layer.wrap_into(value, caller).inspect_err(|e| {
            warn!(%caller, error = %e, "outward wrap rejected");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RealmRegistry;
    use ferry_core::{CloneError, ObjectKind, Principal};

    fn world() -> (RealmRegistry, RealmId, RealmId) {
        let registry = RealmRegistry::new("a", Principal::origin("https://a.example"));
        let a = registry.current_realm();
        let b = registry.create_realm("b", Principal::origin("https://b.example"));
        (registry, a, b)
    }

    #[test]
    fn test_primitive_stays_in_ambient_realm() {
        let (registry, a, _) = world();
        let guard = BoundaryGuard::new(&registry);

        let resolved = guard.resolve(Value::from(42), None).unwrap();
        assert_eq!(resolved.realm, a);
        assert_eq!(resolved.value, Value::from(42));
    }

    #[test]
    fn test_explicit_target_same_principal() {
        let (registry, a, _) = world();
        let sibling = registry.create_realm("a2", Principal::origin("https://a.example"));
        let obj = registry.allocate(a, ObjectKind::empty()).unwrap();
        let guard = BoundaryGuard::new(&registry);

        let resolved = guard.resolve(Value::Object(obj), Some(sibling)).unwrap();
        assert_eq!(resolved.realm, sibling);
        let wrapped = resolved.value.as_object().copied().unwrap();
        assert_eq!(wrapped.home, a);
        assert_eq!(wrapped.seen_from, sibling);
    }

    #[test]
    fn test_explicit_target_denied() {
        let (registry, _, b) = world();
        let guard = BoundaryGuard::new(&registry);

        let err = guard.resolve(Value::from(42), Some(b)).unwrap_err();
        assert!(err.is_access_denied());
    }

    #[test]
    fn test_object_resolves_to_home_realm() {
        let (registry, a, _) = world();
        let system = registry.create_realm("system", Principal::System);
        let obj = registry.allocate(a, ObjectKind::empty()).unwrap();

        registry.enter_realm(system).unwrap();
        let wrapper = registry
            .wrap_into(Value::Object(obj), system)
            .unwrap()
            .as_object()
            .copied()
            .unwrap();
        assert!(wrapper.is_wrapper());

        let guard = BoundaryGuard::new(&registry);
        let resolved = guard.resolve(Value::Object(wrapper), None).unwrap();
        assert_eq!(resolved.realm, a);
        assert_eq!(resolved.value, Value::Object(obj));
    }

    #[test]
    fn test_opaque_wrapper_denied() {
        let (registry, a, b) = world();
        let obj = registry.allocate(b, ObjectKind::empty()).unwrap();
        let opaque = obj.viewed_from(a);
        let guard = BoundaryGuard::new(&registry);

        let err = guard.resolve(Value::Object(opaque), None).unwrap_err();
        assert!(err.is_access_denied());
    }

    #[test]
    fn test_resolve_does_not_change_ambient_realm() {
        let (registry, a, _) = world();
        let sibling = registry.create_realm("a2", Principal::origin("https://a.example"));
        let guard = BoundaryGuard::new(&registry);

        guard.resolve(Value::from("x"), Some(sibling)).unwrap();
        assert_eq!(registry.current_realm(), a);
    }

    #[test]
    fn test_hand_back_severed_fails() {
        let (registry, a, _) = world();
        let sibling = registry.create_realm("a2", Principal::origin("https://a.example"));
        let obj = registry.allocate(sibling, ObjectKind::empty()).unwrap();
        registry.sever(sibling, a);
        let guard = BoundaryGuard::new(&registry);

        let err = guard.hand_back(Value::Object(obj), a).unwrap_err();
        assert!(matches!(err, CloneError::WrapFailed { .. }));
        assert_eq!(guard.hand_back(Value::from(1), a).unwrap(), Value::from(1));
    }
}
