//! Prelude module - commonly used test helpers.
//!
//! Use `use ferry_test::prelude::*;` to import all test helpers.

pub use crate::{
    EngineCall, FlakyLayer, MockEngine, ORIGIN_A, ORIGIN_B, TestWorld, init_test_logging,
    test_capsule, test_graph, test_payload,
};
