//! The clone capsule.
//!
//! A [`Capsule`] owns at most one serialized buffer and the format version it
//! was written at. It is filled exactly once, either by [`Capsule::write`] or
//! by decoding an envelope, and may then be read any number of times.

use std::fmt;
use std::sync::OnceLock;

use ferry_core::{CloneError, CloneResult, RealmId, ScopeDescriptor, Value};
use ferry_realm::{BoundaryGuard, RealmEntry, SecurityLayer};
use tracing::{Level, debug, warn};

use crate::buffer::SegmentedBuffer;
use crate::engine::CloneEngine;

struct Payload {
    buffer: SegmentedBuffer,
    version: u32,
}

/// An opaque snapshot of a value graph.
pub struct Capsule {
    payload: OnceLock<Payload>,
    scope: ScopeDescriptor,
}

impl Capsule {
    /// Create an empty capsule.
    #[must_use]
    pub fn new() -> Self {
        Self {
            payload: OnceLock::new(),
            scope: ScopeDescriptor::cross_domain(),
        }
    }

    /// Create a capsule already holding `buffer` written at `version`.
    #[must_use]
    pub fn from_parts(buffer: SegmentedBuffer, version: u32) -> Self {
        Self {
            payload: OnceLock::from(Payload { buffer, version }),
            scope: ScopeDescriptor::cross_domain(),
        }
    }

    /// Capability descriptor handed to the engine.
    #[must_use]
    pub fn scope(&self) -> ScopeDescriptor {
        self.scope
    }

    /// Whether a buffer has been stored.
    #[must_use]
    pub fn is_written(&self) -> bool {
        self.payload.get().is_some()
    }

    /// Format version of the stored buffer.
    #[must_use]
    pub fn version(&self) -> Option<u32> {
        self.payload.get().map(|p| p.version)
    }

    /// The stored buffer.
    #[must_use]
    pub fn buffer(&self) -> Option<&SegmentedBuffer> {
        self.payload.get().map(|p| &p.buffer)
    }

    /// Serialize `value` inside `realm` and store the result.
    ///
    /// The realm is entered for the duration of the engine call and left
    /// again on every path. Nothing is stored unless serialization succeeds.
    ///
    /// # Errors
    ///
    /// - `AlreadyWritten` if the capsule already holds a buffer. The engine
    ///   is not invoked.
    /// - `UnknownRealm` if `realm` cannot be entered.
    /// - `EngineError` if the engine rejects the value.
    pub fn write<L, E>(&self, layer: &L, engine: &E, value: &Value, realm: RealmId) -> CloneResult<()>
    where
        L: SecurityLayer + ?Sized,
        E: CloneEngine + ?Sized,
    {
        if self.is_written() {
            warn!(%realm, "Refusing second write to capsule");
            return Err(CloneError::AlreadyWritten);
        }

        let buffer = {
            let _entry = RealmEntry::enter(layer, realm)?;
            engine.serialize(value, realm)?
        };
        let version = engine.version();
        let len = buffer.len();

        self.payload
            .set(Payload { buffer, version })
            .map_err(|_| CloneError::AlreadyWritten)?;

        if tracing::enabled!(Level::DEBUG) {
            debug!(
                %realm,
                len,
                version,
                fingerprint = %self.fingerprint().unwrap_or_default(),
                "Capsule written"
            );
        }
        Ok(())
    }

    /// Deserialize the stored buffer inside `realm`.
    ///
    /// No boundary check happens here; see [`Capsule::materialize`].
    ///
    /// # Errors
    ///
    /// - `EmptyCapsule` if nothing has been written.
    /// - `UnknownRealm` if `realm` cannot be entered.
    /// - `EngineError` if the engine rejects the bytes.
    pub fn read<L, E>(&self, layer: &L, engine: &E, realm: RealmId) -> CloneResult<Value>
    where
        L: SecurityLayer + ?Sized,
        E: CloneEngine + ?Sized,
    {
        let payload = self.payload.get().ok_or(CloneError::EmptyCapsule)?;
        let _entry = RealmEntry::enter(layer, realm)?;
        let value = engine.deserialize(&payload.buffer, payload.version, realm)?;
        debug!(
            %realm,
            len = payload.buffer.len(),
            version = payload.version,
            kind = value.type_name(),
            "Capsule read"
        );
        Ok(value)
    }

    /// Materialize the capsule in `target` and hand the result back to the
    /// caller's ambient realm.
    ///
    /// The caller must be able to reach `target`. The decoded value is then
    /// wrapped for the caller; if that wrap fails the outcome carries
    /// [`Value::Undefined`] alongside the error.
    pub fn materialize<L, E>(&self, layer: &L, engine: &E, target: RealmId) -> Materialized
    where
        L: SecurityLayer + ?Sized,
        E: CloneEngine + ?Sized,
    {
        let guard = BoundaryGuard::new(layer);
        let caller = layer.current_realm();

        let scope = match guard.admit(target) {
            Ok(scope) => scope,
            Err(e) => return Materialized::failed(e),
        };
        let value = match self.read(layer, engine, scope) {
            Ok(value) => value,
            Err(e) => return Materialized::failed(e),
        };
        match guard.hand_back(value, caller) {
            Ok(value) => Materialized::ok(value),
            Err(e) => Materialized::failed(e),
        }
    }

    /// [`Capsule::materialize`] as a `Result`.
    ///
    /// # Errors
    ///
    /// `AccessDenied` if `target` is out of reach, any error from
    /// [`Capsule::read`], or `WrapFailed` if the value cannot be handed back.
    pub fn deserialize<L, E>(&self, layer: &L, engine: &E, target: RealmId) -> CloneResult<Value>
    where
        L: SecurityLayer + ?Sized,
        E: CloneEngine + ?Sized,
    {
        self.materialize(layer, engine, target).into_result()
    }

    /// BLAKE3 fingerprint of the stored buffer.
    #[must_use]
    pub fn fingerprint(&self) -> Option<String> {
        self.buffer().map(SegmentedBuffer::fingerprint)
    }

    pub(crate) fn contents(&self) -> CloneResult<(&SegmentedBuffer, u32)> {
        self.payload
            .get()
            .map(|p| (&p.buffer, p.version))
            .ok_or(CloneError::EmptyCapsule)
    }
}

impl Default for Capsule {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Capsule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capsule")
            .field("len", &self.buffer().map(SegmentedBuffer::len))
            .field("version", &self.version())
            .field("scope", &self.scope)
            .finish()
    }
}

/// Outcome of [`Capsule::materialize`].
///
/// The value is [`Value::Undefined`] whenever an error is recorded.
#[derive(Debug)]
#[must_use]
pub struct Materialized {
    value: Value,
    error: Option<CloneError>,
}

impl Materialized {
    fn ok(value: Value) -> Self {
        Self { value, error: None }
    }

    fn failed(error: CloneError) -> Self {
        Self {
            value: Value::Undefined,
            error: Some(error),
        }
    }

    /// Whether materialization succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The value delivered to the caller's realm.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Why materialization failed, if it did.
    #[must_use]
    pub fn error(&self) -> Option<&CloneError> {
        self.error.as_ref()
    }

    /// Convert into a `Result`, dropping the sentinel on failure.
    ///
    /// # Errors
    ///
    /// Returns the recorded error, if any.
    pub fn into_result(self) -> CloneResult<Value> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ferry_core::Principal;
    use ferry_realm::RealmRegistry;

    use super::*;

    /// Stores the number as its decimal string.
    #[derive(Default)]
    struct DecimalEngine {
        calls: AtomicUsize,
    }

    impl CloneEngine for DecimalEngine {
        fn version(&self) -> u32 {
            3
        }

        fn serialize(&self, value: &Value, _realm: RealmId) -> CloneResult<SegmentedBuffer> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let n = value
                .as_number()
                .ok_or_else(|| CloneError::engine("not a number"))?;
            Ok(SegmentedBuffer::from_slice(n.to_string().as_bytes(), 4096))
        }

        fn deserialize(
            &self,
            data: &SegmentedBuffer,
            _version: u32,
            _realm: RealmId,
        ) -> CloneResult<Value> {
            let text = String::from_utf8(data.to_vec()).map_err(|e| CloneError::engine(e.to_string()))?;
            let n: f64 = text.parse().map_err(|_| CloneError::engine("bad number"))?;
            Ok(Value::Number(n))
        }
    }

    fn world() -> (RealmRegistry, RealmId, RealmId) {
        let registry = RealmRegistry::new("main", Principal::origin("https://a.example"));
        let main = registry.current_realm();
        let other = registry.create_realm("other", Principal::origin("https://b.example"));
        (registry, main, other)
    }

    #[test]
    fn test_new_capsule_is_empty() {
        let capsule = Capsule::new();
        assert!(!capsule.is_written());
        assert!(capsule.version().is_none());
        assert!(capsule.buffer().is_none());
        assert!(capsule.scope().supports_cloning());
        assert!(!capsule.scope().supports_transfer());
    }

    #[test]
    fn test_write_then_read() {
        let (registry, main, _) = world();
        let engine = DecimalEngine::default();
        let capsule = Capsule::new();

        capsule.write(&registry, &engine, &Value::from(42), main).unwrap();
        assert_eq!(capsule.version(), Some(3));
        assert_eq!(capsule.buffer().unwrap().to_vec(), b"42");

        let value = capsule.read(&registry, &engine, main).unwrap();
        assert_eq!(value, Value::Number(42.0));
        // Reads do not consume the buffer.
        assert_eq!(capsule.read(&registry, &engine, main).unwrap(), value);
    }

    #[test]
    fn test_second_write_fails_and_keeps_first_buffer() {
        let (registry, main, _) = world();
        let engine = DecimalEngine::default();
        let capsule = Capsule::new();

        capsule.write(&registry, &engine, &Value::from(1), main).unwrap();
        let err = capsule.write(&registry, &engine, &Value::from(2), main).unwrap_err();

        assert!(matches!(err, CloneError::AlreadyWritten));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        assert_eq!(capsule.buffer().unwrap().to_vec(), b"1");
    }

    #[test]
    fn test_failed_write_stores_nothing() {
        let (registry, main, _) = world();
        let engine = DecimalEngine::default();
        let capsule = Capsule::new();

        let err = capsule.write(&registry, &engine, &Value::from("nope"), main).unwrap_err();
        assert!(matches!(err, CloneError::EngineError(_)));
        assert!(!capsule.is_written());
        assert_eq!(registry.current_realm(), main);

        capsule.write(&registry, &engine, &Value::from(5), main).unwrap();
        assert!(capsule.is_written());
    }

    #[test]
    fn test_write_restores_ambient_realm() {
        let (registry, main, other) = world();
        let engine = DecimalEngine::default();
        let capsule = Capsule::new();

        capsule.write(&registry, &engine, &Value::from(7), other).unwrap();
        assert_eq!(registry.current_realm(), main);
    }

    #[test]
    fn test_read_empty_capsule() {
        let (registry, main, _) = world();
        let engine = DecimalEngine::default();
        let err = Capsule::new().read(&registry, &engine, main).unwrap_err();
        assert!(matches!(err, CloneError::EmptyCapsule));
    }

    #[test]
    fn test_materialize_denied_target() {
        let (registry, main, other) = world();
        let engine = DecimalEngine::default();
        let capsule = Capsule::from_parts(SegmentedBuffer::from_slice(b"9", 4096), 3);

        let outcome = capsule.materialize(&registry, &engine, other);
        assert!(!outcome.is_ok());
        assert!(outcome.value().is_undefined());
        assert!(outcome.error().unwrap().is_access_denied());
        assert!(outcome.into_result().unwrap_err().is_access_denied());
        assert_eq!(registry.current_realm(), main);
    }

    #[test]
    fn test_successful_outcome_carries_value() {
        let (registry, main, _) = world();
        let engine = DecimalEngine::default();
        let capsule = Capsule::from_parts(SegmentedBuffer::from_slice(b"4", 4096), 3);

        let outcome = capsule.materialize(&registry, &engine, main);
        assert!(outcome.is_ok());
        assert!(outcome.error().is_none());
        assert_eq!(outcome.value(), &Value::Number(4.0));
        assert_eq!(outcome.into_result().unwrap(), Value::Number(4.0));
    }

    #[test]
    fn test_engine_failure_outcome_is_undefined() {
        let (registry, main, _) = world();
        let engine = DecimalEngine::default();
        let capsule = Capsule::from_parts(SegmentedBuffer::from_slice(b"four", 4096), 3);

        let outcome = capsule.materialize(&registry, &engine, main);
        assert!(!outcome.is_ok());
        assert_eq!(outcome.value(), &Value::Undefined);
        assert!(matches!(outcome.error(), Some(CloneError::EngineError(_))));
    }

    #[test]
    fn test_deserialize_in_reachable_realm() {
        let (registry, main, _) = world();
        let sibling = registry.create_realm("sibling", Principal::origin("https://a.example"));
        let engine = DecimalEngine::default();
        let capsule = Capsule::from_parts(SegmentedBuffer::from_slice(b"2.5", 4096), 3);

        let value = capsule.deserialize(&registry, &engine, sibling).unwrap();
        assert_eq!(value, Value::Number(2.5));
        assert_eq!(registry.current_realm(), main);
    }
}
