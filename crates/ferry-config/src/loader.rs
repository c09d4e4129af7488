//! Config file discovery and layered loading.
//!
//! 1. Parse `defaults.toml` → base
//! 2. Merge `~/.ferry/config.toml` (user)
//! 3. Merge the explicit file, if any
//! 4. Apply env var fallbacks for fields no file set
//! 5. Deserialize and validate

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Load the configuration with layered file precedence.
///
/// `home_override` replaces the user's home directory for discovery of
/// `.ferry/config.toml`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// merged configuration fails validation.
pub fn load(explicit: Option<&Path>, home_override: Option<&Path>) -> ConfigResult<Config> {
    let mut merged = parse_defaults()?;
    let mut file_fields = HashSet::new();

    let home = match home_override {
        Some(h) => Some(h.to_path_buf()),
        None => home_directory().ok(),
    };
    if let Some(home) = home {
        let user_path = home.join(".ferry").join("config.toml");
        if let Some(overlay) = try_load_file(&user_path)? {
            merge_layer(&mut merged, &overlay, "", &mut file_fields);
            info!(path = %user_path.display(), "loaded user config");
        }
    }

    if let Some(path) = explicit {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        })?;
        merge_layer(&mut merged, &overlay, "", &mut file_fields);
        info!(path = %path.display(), "loaded config");
    }

    let applied = apply_env_fallbacks(&mut merged, &file_fields, &collect_env_vars());
    debug!(applied, "env fallbacks applied");

    finish(merged, "<merged>")
}

/// Parse one TOML document over the embedded defaults.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the document is malformed or invalid.
pub fn load_str(source: &str) -> ConfigResult<Config> {
    let mut merged = parse_defaults()?;
    let overlay: toml::Value = toml::from_str(source).map_err(|e| ConfigError::ParseError {
        path: "<string>".to_owned(),
        source: e,
    })?;
    merge_layer(&mut merged, &overlay, "", &mut HashSet::new());
    finish(merged, "<string>")
}

fn parse_defaults() -> ConfigResult<toml::Value> {
    toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
        path: "<embedded defaults>".to_owned(),
        source: e,
    })
}

fn finish(merged: toml::Value, origin: &str) -> ConfigResult<Config> {
    let config: Config = merged.try_into().map_err(|e| ConfigError::ParseError {
        path: origin.to_owned(),
        source: e,
    })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Deep-merge `overlay` into `base`, recording every leaf path it sets.
fn merge_layer(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    fields: &mut HashSet<String>,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                match base_table.get_mut(key) {
                    Some(base_val) if overlay_val.is_table() => {
                        merge_layer(base_val, overlay_val, &path, fields);
                    },
                    Some(base_val) => {
                        *base_val = overlay_val.clone();
                        fields.insert(path);
                    },
                    None => {
                        base_table.insert(key.clone(), overlay_val.clone());
                        fields.insert(path);
                    },
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            fields.insert(prefix.to_owned());
        },
    }
}

fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };
    toml::from_str(&contents)
        .map(Some)
        .map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })
}

fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}
