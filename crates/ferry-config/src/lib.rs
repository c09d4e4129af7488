#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Configuration for the Ferry capsule runtime.
//!
//! # Usage
//!
//! ```rust,no_run
//! use ferry_config::Config;
//!
//! // defaults → ~/.ferry/config.toml → explicit file → FERRY_* env fallbacks
//! let config = Config::load(None).unwrap();
//! println!("segment size: {}", config.capsule.segment_size);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Explicit file** passed to [`Config::load`]
//! 2. **User** (`~/.ferry/config.toml`)
//! 3. **Environment variables** (`FERRY_*`), fallback only
//! 4. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! This crate has no dependencies on other internal ferry crates. Conversion
//! to domain types happens in the consuming crates.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(explicit: Option<&std::path::Path>) -> ConfigResult<Self> {
        loader::load(explicit, None)
    }

    /// Parse a single TOML document layered over the embedded defaults.
    ///
    /// No files or environment variables are consulted.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the document is malformed or fails
    /// validation.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        loader::load_str(source)
    }
}
