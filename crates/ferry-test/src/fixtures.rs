//! Test fixtures: realms, value graphs, and payloads.

use std::sync::Arc;

use ferry_capsule::{Capsule, CodecLimits, SegmentedBuffer, StructuredCloneEngine};
use ferry_core::{ObjectKind, ObjectRef, Principal, RealmId, Value};
use ferry_realm::{RealmRegistry, SecurityLayer};

/// Origin of the ambient and sibling realms.
pub const ORIGIN_A: &str = "https://a.example";

/// Origin of the foreign realm.
pub const ORIGIN_B: &str = "https://b.example";

/// A registry with four realms and a reference engine over it.
///
/// The ambient realm is `main`. `sibling` shares its origin, `foreign` has a
/// different one, and `system` runs with the system principal.
#[derive(Debug)]
pub struct TestWorld {
    /// The realm layer.
    pub registry: Arc<RealmRegistry>,
    /// Reference engine over `registry`.
    pub engine: StructuredCloneEngine,
    /// Ambient realm, origin [`ORIGIN_A`].
    pub main: RealmId,
    /// Second realm with origin [`ORIGIN_A`].
    pub sibling: RealmId,
    /// Realm with origin [`ORIGIN_B`].
    pub foreign: RealmId,
    /// Realm with the system principal.
    pub system: RealmId,
}

impl TestWorld {
    /// Build the world with default codec limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(CodecLimits::default())
    }

    /// Build the world with an engine using `limits`.
    #[must_use]
    pub fn with_limits(limits: CodecLimits) -> Self {
        let registry = Arc::new(RealmRegistry::new("main", Principal::origin(ORIGIN_A)));
        let main = registry.current_realm();
        let sibling = registry.create_realm("sibling", Principal::origin(ORIGIN_A));
        let foreign = registry.create_realm("foreign", Principal::origin(ORIGIN_B));
        let system = registry.create_realm("system", Principal::System);
        let engine = StructuredCloneEngine::new(Arc::clone(&registry)).with_limits(limits);

        Self {
            registry,
            engine,
            main,
            sibling,
            foreign,
            system,
        }
    }

    /// The realm layer as a plain reference.
    #[must_use]
    pub fn layer(&self) -> &RealmRegistry {
        &self.registry
    }

    /// Allocate [`test_graph`] in `realm`.
    ///
    /// # Panics
    ///
    /// Panics if `realm` is not part of this world.
    #[must_use]
    pub fn graph_in(&self, realm: RealmId) -> ObjectRef {
        test_graph(&self.registry, realm)
    }

    /// Run `f` with `realm` as the ambient realm, restoring `main` afterwards.
    ///
    /// # Panics
    ///
    /// Panics if `realm` is not part of this world.
    pub fn as_realm<T>(&self, realm: RealmId, f: impl FnOnce() -> T) -> T {
        let previous = self
            .registry
            .enter_realm(realm)
            .unwrap_or_else(|e| panic!("cannot enter {realm}: {e}"));
        let out = f();
        self.registry.restore_realm(previous);
        out
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocate `{ "answer": 42, "name": "ferry", "tags": ["a", "b"] }` in
/// `realm`.
///
/// # Panics
///
/// Panics if `realm` does not exist.
#[must_use]
pub fn test_graph(registry: &RealmRegistry, realm: RealmId) -> ObjectRef {
    let tags = registry
        .allocate(realm, ObjectKind::Array(vec![Value::from("a"), Value::from("b")]))
        .unwrap_or_else(|e| panic!("allocate failed: {e}"));
    registry
        .allocate(
            realm,
            ObjectKind::plain([
                ("answer", Value::from(42)),
                ("name", Value::from("ferry")),
                ("tags", Value::Object(tags)),
            ]),
        )
        .unwrap_or_else(|e| panic!("allocate failed: {e}"))
}

/// A deterministic byte pattern of length `len`.
#[must_use]
pub fn test_payload(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| u8::try_from(i % 251).unwrap_or_default())
        .collect()
}

/// A capsule holding `bytes` at `version`.
#[must_use]
pub fn test_capsule(bytes: &[u8], version: u32) -> Capsule {
    Capsule::from_parts(SegmentedBuffer::from_slice(bytes, 4096), version)
}
