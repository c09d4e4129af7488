//! Every struct implements [`Default`] with production defaults, so a bare
//! `[section]` header in TOML produces a working configuration.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capsule buffer and envelope limits.
    pub capsule: CapsuleSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

/// Capsule buffer and envelope limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapsuleSection {
    /// Size of each buffer segment, in bytes.
    pub segment_size: usize,
    /// Minimum reservation when decoding an envelope, in bytes.
    pub decode_reserve: usize,
    /// Largest payload accepted in an envelope, in bytes.
    pub max_envelope_len: u64,
}

impl Default for CapsuleSection {
    fn default() -> Self {
        Self {
            segment_size: 4096,
            decode_reserve: 4096,
            max_envelope_len: u64::from(u32::MAX),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Output format (`pretty`, `compact`, `json`, `full`).
    pub format: String,
    /// Extra `EnvFilter` directives, e.g. `ferry_capsule=trace`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
