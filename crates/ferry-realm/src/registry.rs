//! In-process realm registry.
//!
//! Holds every realm's principal and heap, tracks the ambient realm, and
//! implements [`SecurityLayer`] with principal subsumption as the access
//! policy.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ferry_core::{
    CloneError, CloneResult, ObjectId, ObjectKind, ObjectRef, Principal, RealmId, Value,
};
use tracing::{debug, info, warn};

use crate::layer::SecurityLayer;

#[derive(Debug)]
struct RealmRecord {
    name: String,
    principal: Principal,
    heap: HashMap<ObjectId, ObjectKind>,
    /// A nuked realm can no longer be entered through an unwrap and its
    /// objects can no longer be wrapped into other realms.
    nuked: bool,
}

/// The in-process realm layer.
///
/// A registry always has an ambient realm: the first realm, created by
/// [`RealmRegistry::new`], is ambient until something enters another one.
#[derive(Debug)]
pub struct RealmRegistry {
    realms: RwLock<HashMap<RealmId, RealmRecord>>,
    current: Mutex<RealmId>,
    next_object: AtomicU64,
    /// `(source, destination)` pairs for which wrapper creation is refused.
    severed: RwLock<HashSet<(RealmId, RealmId)>>,
}

impl RealmRegistry {
    /// Create a registry whose first realm is ambient.
    #[must_use]
    pub fn new(name: impl Into<String>, principal: Principal) -> Self {
        let root = RealmId::new();
        let mut realms = HashMap::new();
        realms.insert(root, RealmRecord::new(name.into(), principal));

        Self {
            realms: RwLock::new(realms),
            current: Mutex::new(root),
            next_object: AtomicU64::new(1),
            severed: RwLock::new(HashSet::new()),
        }
    }

    /// Create a new realm.
    pub fn create_realm(&self, name: impl Into<String>, principal: Principal) -> RealmId {
        let id = RealmId::new();
        let name = name.into();
        info!(realm = %id, %name, %principal, "created realm");
        self.realms_mut().insert(id, RealmRecord::new(name, principal));
        id
    }

    /// Whether the realm exists.
    #[must_use]
    pub fn contains(&self, realm: RealmId) -> bool {
        self.realms().contains_key(&realm)
    }

    /// The principal of a realm.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRealm` if the realm does not exist.
    pub fn principal_of(&self, realm: RealmId) -> CloneResult<Principal> {
        self.with_realm(realm, |r| r.principal.clone())
    }

    /// The name of a realm.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRealm` if the realm does not exist.
    pub fn name_of(&self, realm: RealmId) -> CloneResult<String> {
        self.with_realm(realm, |r| r.name.clone())
    }

    /// Number of objects in a realm's heap.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRealm` if the realm does not exist.
    pub fn heap_len(&self, realm: RealmId) -> CloneResult<usize> {
        self.with_realm(realm, |r| r.heap.len())
    }

    /// Allocate an object in a realm's heap.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRealm` if the realm does not exist.
    pub fn allocate(&self, realm: RealmId, kind: ObjectKind) -> CloneResult<ObjectRef> {
        let id = ObjectId(self.next_object.fetch_add(1, Ordering::Relaxed));
        let mut realms = self.realms_mut();
        let record = realms.get_mut(&realm).ok_or(CloneError::UnknownRealm(realm))?;
        record.heap.insert(id, kind);
        Ok(ObjectRef::local(id, realm))
    }

    /// Replace the contents of an existing object.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRealm` or `UnknownObject` if the object does not
    /// exist.
    pub fn define(&self, object: &ObjectRef, kind: ObjectKind) -> CloneResult<()> {
        let mut realms = self.realms_mut();
        let record = realms
            .get_mut(&object.home)
            .ok_or(CloneError::UnknownRealm(object.home))?;
        let slot = record
            .heap
            .get_mut(&object.id)
            .ok_or(CloneError::UnknownObject(object.id))?;
        *slot = kind;
        Ok(())
    }

    /// Remove objects from their home heaps.
    ///
    /// References to objects that are already gone are skipped. Returns the
    /// number of objects removed.
    pub fn release(&self, objects: &[ObjectRef]) -> usize {
        let mut realms = self.realms_mut();
        let released = objects
            .iter()
            .filter(|obj| {
                realms
                    .get_mut(&obj.home)
                    .and_then(|record| record.heap.remove(&obj.id))
                    .is_some()
            })
            .count();
        debug!(released, "released objects");
        released
    }

    /// The contents of an object, read straight from its home heap.
    ///
    /// This does no access check; callers unwrap the reference first.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRealm` or `UnknownObject` if the object does not
    /// exist.
    pub fn object(&self, object: &ObjectRef) -> CloneResult<ObjectKind> {
        let realms = self.realms();
        let record = realms
            .get(&object.home)
            .ok_or(CloneError::UnknownRealm(object.home))?;
        record
            .heap
            .get(&object.id)
            .cloned()
            .ok_or(CloneError::UnknownObject(object.id))
    }

    /// Cut a realm off: it can no longer be reached by unwrapping, and its
    /// objects can no longer be wrapped into other realms.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRealm` if the realm does not exist.
    pub fn nuke(&self, realm: RealmId) -> CloneResult<()> {
        let mut realms = self.realms_mut();
        let record = realms.get_mut(&realm).ok_or(CloneError::UnknownRealm(realm))?;
        record.nuked = true;
        warn!(%realm, name = %record.name, "realm nuked");
        Ok(())
    }

    /// Refuse to create wrappers for objects of `source` inside
    /// `destination`.
    pub fn sever(&self, source: RealmId, destination: RealmId) {
        debug!(%source, %destination, "severed wrapper edge");
        self.severed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((source, destination));
    }

    /// Render a value as JSON for diagnostics and structural comparison.
    ///
    /// Objects become JSON objects, arrays become arrays, `undefined` becomes
    /// the string `"[undefined]"`, functions and host objects become a
    /// bracketed class label, and a reference back to an object already on
    /// the current path becomes `"[Circular]"`.
    #[must_use]
    pub fn describe(&self, value: &Value) -> serde_json::Value {
        let mut path = HashSet::new();
        self.describe_inner(value, &mut path)
    }

    fn describe_inner(&self, value: &Value, path: &mut HashSet<ObjectId>) -> serde_json::Value {
        use serde_json::Value as Json;

        match value {
            Value::Undefined => Json::String("[undefined]".to_owned()),
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number),
            Value::String(s) => Json::String(s.clone()),
            Value::Object(obj) => {
                if !path.insert(obj.id) {
                    return Json::String("[Circular]".to_owned());
                }
                let rendered = match self.object(obj) {
                    Ok(ObjectKind::Plain(props)) => Json::Object(
                        props
                            .iter()
                            .map(|(k, v)| (k.clone(), self.describe_inner(v, path)))
                            .collect(),
                    ),
                    Ok(ObjectKind::Array(items)) => Json::Array(
                        items
                            .iter()
                            .map(|v| self.describe_inner(v, path))
                            .collect(),
                    ),
                    Ok(ObjectKind::Function { name }) => Json::String(format!("[Function {name}]")),
                    Ok(ObjectKind::Host(host)) => Json::String(format!("[{}]", host.class_name())),
                    Err(_) => Json::String("[dead object]".to_owned()),
                };
                path.remove(&obj.id);
                rendered
            },
        }
    }

    fn realms(&self) -> RwLockReadGuard<'_, HashMap<RealmId, RealmRecord>> {
        self.realms.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn realms_mut(&self) -> RwLockWriteGuard<'_, HashMap<RealmId, RealmRecord>> {
        self.realms.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_realm<T>(&self, realm: RealmId, f: impl FnOnce(&RealmRecord) -> T) -> CloneResult<T> {
        self.realms()
            .get(&realm)
            .map(f)
            .ok_or(CloneError::UnknownRealm(realm))
    }

    fn is_severed(&self, source: RealmId, destination: RealmId) -> bool {
        self.severed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(source, destination))
    }

    /// Whether code in `accessor` may reach `target`.
    fn check_access(&self, accessor: RealmId, target: RealmId) -> CloneResult<()> {
        let realms = self.realms();
        let target_record = realms.get(&target).ok_or_else(|| CloneError::AccessDenied {
            realm: target,
            reason: "no such realm".to_owned(),
        })?;
        if target_record.nuked {
            return Err(CloneError::AccessDenied {
                realm: target,
                reason: "realm has been nuked".to_owned(),
            });
        }
        let accessor_record = realms.get(&accessor).ok_or(CloneError::UnknownRealm(accessor))?;
        if accessor_record.principal.subsumes(&target_record.principal) {
            Ok(())
        } else {
            Err(CloneError::AccessDenied {
                realm: target,
                reason: format!(
                    "{} does not subsume {}",
                    accessor_record.principal, target_record.principal
                ),
            })
        }
    }
}

impl RealmRecord {
    fn new(name: String, principal: Principal) -> Self {
        Self {
            name,
            principal,
            heap: HashMap::new(),
            nuked: false,
        }
    }
}

impl SecurityLayer for RealmRegistry {
    fn current_realm(&self) -> RealmId {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unwrap_realm(&self, target: RealmId) -> CloneResult<RealmId> {
        self.check_access(self.current_realm(), target)?;
        Ok(target)
    }

    fn unwrap_object(&self, object: &ObjectRef) -> CloneResult<ObjectRef> {
        if object.is_wrapper() {
            self.check_access(object.seen_from, object.home)?;
        }
        // A direct reference proves nothing about the caller; the ambient
        // realm must reach the home realm on its own.
        let ambient = self.current_realm();
        if object.home != ambient {
            self.check_access(ambient, object.home)?;
        }
        // Dead references are refused even when no boundary is crossed.
        self.object(object).map_err(|_| CloneError::AccessDenied {
            realm: object.home,
            reason: format!("{} is not a live object", object.id),
        })?;
        Ok(ObjectRef::local(object.id, object.home))
    }

    fn wrap_into(&self, value: Value, realm: RealmId) -> CloneResult<Value> {
        let Value::Object(obj) = value else {
            return Ok(value);
        };
        if obj.home == realm {
            return Ok(Value::Object(ObjectRef::local(obj.id, realm)));
        }

        let realms = self.realms();
        if !realms.contains_key(&realm) {
            return Err(CloneError::WrapFailed {
                realm,
                reason: "no such realm".to_owned(),
            });
        }
        match realms.get(&obj.home) {
            Some(home) if home.nuked => {
                return Err(CloneError::WrapFailed {
                    realm,
                    reason: format!("{} belongs to a nuked realm", obj.id),
                });
            },
            Some(_) => {},
            None => {
                return Err(CloneError::WrapFailed {
                    realm,
                    reason: format!("{} has no home realm", obj.id),
                });
            },
        }
        drop(realms);

        if self.is_severed(obj.home, realm) {
            return Err(CloneError::WrapFailed {
                realm,
                reason: format!("wrappers from {} are not allowed here", obj.home),
            });
        }
        Ok(Value::Object(obj.viewed_from(realm)))
    }

    fn enter_realm(&self, realm: RealmId) -> CloneResult<RealmId> {
        if !self.contains(realm) {
            return Err(CloneError::UnknownRealm(realm));
        }
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(std::mem::replace(&mut *current, realm))
    }

    fn restore_realm(&self, previous: RealmId) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = previous;
    }
}
