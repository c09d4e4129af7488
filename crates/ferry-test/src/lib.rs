//! Ferry Test - Shared test utilities for Ferry capsules.
//!
//! This crate provides a ready-made realm world, sample value graphs, and
//! failure-injecting mocks for the engine and security layer. Use it as a
//! dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! ferry-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use ferry_test::{MockEngine, TestWorld};
//!
//! let world = TestWorld::new();
//! let engine = MockEngine::new().with_observer(world.registry.clone());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

/// Route `tracing` output through the test harness.
///
/// Safe to call from every test; only the first call installs a subscriber.
/// Honours `RUST_LOG`, defaulting to `debug` for Ferry crates.
pub fn init_test_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,ferry_capsule=debug,ferry_realm=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
