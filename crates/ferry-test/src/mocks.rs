//! Mock implementations for testing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use ferry_capsule::{CloneEngine, SegmentedBuffer};
use ferry_core::{CloneError, CloneResult, ObjectRef, RealmId, Value};
use ferry_realm::{RealmRegistry, SecurityLayer};

/// A call observed by [`MockEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `serialize` was invoked.
    Serialize {
        /// Realm passed by the caller.
        realm: RealmId,
        /// Ambient realm at the time of the call, if an observer is set.
        ambient: Option<RealmId>,
    },
    /// `deserialize` was invoked.
    Deserialize {
        /// Realm passed by the caller.
        realm: RealmId,
        /// Version passed by the caller.
        version: u32,
        /// Length of the buffer.
        len: usize,
        /// Ambient realm at the time of the call, if an observer is set.
        ambient: Option<RealmId>,
    },
}

/// An engine that stashes values in memory instead of encoding them.
///
/// `serialize` stores a clone of the value and emits its slot number as four
/// bytes; `deserialize` hands the clone back. Either direction can be made
/// to fail, and every call is recorded.
#[derive(Debug)]
pub struct MockEngine {
    version: u32,
    stash: Mutex<Vec<Value>>,
    calls: Mutex<Vec<EngineCall>>,
    serialize_error: Option<String>,
    deserialize_error: Option<String>,
    observer: Option<Arc<RealmRegistry>>,
}

impl MockEngine {
    /// Create a mock engine reporting version 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: 1,
            stash: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            serialize_error: None,
            deserialize_error: None,
            observer: None,
        }
    }

    /// Report `version` from [`CloneEngine::version`].
    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Fail every `serialize` call with `message`.
    #[must_use]
    pub fn failing_serialize(mut self, message: impl Into<String>) -> Self {
        self.serialize_error = Some(message.into());
        self
    }

    /// Fail every `deserialize` call with `message`.
    #[must_use]
    pub fn failing_deserialize(mut self, message: impl Into<String>) -> Self {
        self.deserialize_error = Some(message.into());
        self
    }

    /// Record the registry's ambient realm with every call.
    #[must_use]
    pub fn with_observer(mut self, registry: Arc<RealmRegistry>) -> Self {
        self.observer = Some(registry);
        self
    }

    /// All calls so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `serialize` calls so far.
    #[must_use]
    pub fn serialize_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, EngineCall::Serialize { .. }))
            .count()
    }

    /// Number of `deserialize` calls so far.
    #[must_use]
    pub fn deserialize_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, EngineCall::Deserialize { .. }))
            .count()
    }

    fn ambient(&self) -> Option<RealmId> {
        self.observer.as_ref().map(|r| r.current_realm())
    }

    fn record(&self, call: EngineCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CloneEngine for MockEngine {
    fn version(&self) -> u32 {
        self.version
    }

    fn serialize(&self, value: &Value, realm: RealmId) -> CloneResult<SegmentedBuffer> {
        self.record(EngineCall::Serialize {
            realm,
            ambient: self.ambient(),
        });
        if let Some(message) = &self.serialize_error {
            return Err(CloneError::engine(message.clone()));
        }

        let mut stash = self.stash.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = u32::try_from(stash.len()).map_err(|_| CloneError::engine("stash full"))?;
        stash.push(value.clone());
        Ok(SegmentedBuffer::from_slice(&slot.to_le_bytes(), 4096))
    }

    fn deserialize(
        &self,
        data: &SegmentedBuffer,
        version: u32,
        realm: RealmId,
    ) -> CloneResult<Value> {
        self.record(EngineCall::Deserialize {
            realm,
            version,
            len: data.len(),
            ambient: self.ambient(),
        });
        if let Some(message) = &self.deserialize_error {
            return Err(CloneError::engine(message.clone()));
        }

        let bytes: [u8; 4] = data
            .to_vec()
            .try_into()
            .map_err(|_| CloneError::engine("not a mock buffer"))?;
        let slot = usize::try_from(u32::from_le_bytes(bytes))
            .map_err(|_| CloneError::engine("slot out of range"))?;
        self.stash
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(slot)
            .cloned()
            .ok_or_else(|| CloneError::engine(format!("no stashed value in slot {slot}")))
    }
}

/// A security layer wrapper that injects failures and counts realm entries.
#[derive(Debug)]
pub struct FlakyLayer<L> {
    inner: L,
    denied: Mutex<HashSet<RealmId>>,
    unwrappable: Mutex<HashSet<RealmId>>,
    entries: AtomicUsize,
    restores: AtomicUsize,
}

impl<L: SecurityLayer> FlakyLayer<L> {
    /// Wrap `inner` with no failures injected.
    #[must_use]
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            denied: Mutex::new(HashSet::new()),
            unwrappable: Mutex::new(HashSet::new()),
            entries: AtomicUsize::new(0),
            restores: AtomicUsize::new(0),
        }
    }

    /// Refuse every `unwrap_realm` for `realm`.
    #[must_use]
    pub fn deny_realm(self, realm: RealmId) -> Self {
        self.denied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(realm);
        self
    }

    /// Fail every `wrap_into` targeting `realm`, primitives included.
    #[must_use]
    pub fn fail_wrap_into(self, realm: RealmId) -> Self {
        self.unwrappable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(realm);
        self
    }

    /// The wrapped layer.
    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Successful realm entries so far.
    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::SeqCst)
    }

    /// Realm restores so far.
    pub fn restores(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

impl<L: SecurityLayer> SecurityLayer for FlakyLayer<L> {
    fn current_realm(&self) -> RealmId {
        self.inner.current_realm()
    }

    fn unwrap_realm(&self, target: RealmId) -> CloneResult<RealmId> {
        if self
            .denied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&target)
        {
            return Err(CloneError::AccessDenied {
                realm: target,
                reason: "denied by test layer".to_owned(),
            });
        }
        self.inner.unwrap_realm(target)
    }

    fn unwrap_object(&self, object: &ObjectRef) -> CloneResult<ObjectRef> {
        self.inner.unwrap_object(object)
    }

    fn wrap_into(&self, value: Value, realm: RealmId) -> CloneResult<Value> {
        if self
            .unwrappable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&realm)
        {
            return Err(CloneError::WrapFailed {
                realm,
                reason: "wrap refused by test layer".to_owned(),
            });
        }
        self.inner.wrap_into(value, realm)
    }

    fn enter_realm(&self, realm: RealmId) -> CloneResult<RealmId> {
        let previous = self.inner.enter_realm(realm)?;
        self.entries.fetch_add(1, Ordering::SeqCst);
        Ok(previous)
    }

    fn restore_realm(&self, previous: RealmId) {
        self.restores.fetch_add(1, Ordering::SeqCst);
        self.inner.restore_realm(previous);
    }
}
