//! Ferry Telemetry - Logging for the Ferry capsule runtime.
//!
//! This crate provides:
//! - Configurable logging setup with multiple formats
//! - Per-crate filter directives on top of a base level
//! - Integration with the tracing ecosystem
//!
//! # Example
//!
//! ```rust,no_run
//! use ferry_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), ferry_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("ferry_capsule=trace");
//!
//! setup_logging(&config)?;
//! tracing::info!("capsule runtime ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
