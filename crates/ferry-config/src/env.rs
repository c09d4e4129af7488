//! Environment variable fallback.
//!
//! Env vars are **fallback**, not override: they only apply to fields that no
//! config file set.

use std::collections::{HashMap, HashSet};

use tracing::debug;

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
}

/// All supported `FERRY_*` env var mappings.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "FERRY_SEGMENT_SIZE",
        field_path: "capsule.segment_size",
    },
    EnvMapping {
        var_name: "FERRY_DECODE_RESERVE",
        field_path: "capsule.decode_reserve",
    },
    EnvMapping {
        var_name: "FERRY_MAX_ENVELOPE_LEN",
        field_path: "capsule.max_envelope_len",
    },
    EnvMapping {
        var_name: "FERRY_LOG_LEVEL",
        field_path: "logging.level",
    },
    EnvMapping {
        var_name: "FERRY_LOG_FORMAT",
        field_path: "logging.format",
    },
];

/// Apply environment variable fallbacks to fields that were **not** set by
/// any config file.
///
/// `file_fields` holds the dotted paths of every leaf set by a file layer.
/// Returns the number of env vars applied.
pub fn apply_env_fallbacks<S: std::hash::BuildHasher>(
    merged: &mut toml::Value,
    file_fields: &HashSet<String>,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if file_fields.contains(mapping.field_path) {
            continue;
        }

        if let Some(val) = env_vars.get(mapping.var_name) {
            debug!(
                var = mapping.var_name,
                field = mapping.field_path,
                "applying env var fallback"
            );
            set_field_from_string(merged, mapping.field_path, val);
            count = count.saturating_add(1);
        }
    }

    count
}

/// Collect the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

fn set_field_from_string(root: &mut toml::Value, path: &str, val: &str) {
    let Some((section, leaf)) = path.split_once('.') else {
        return;
    };
    let Some(table) = root.as_table_mut() else {
        return;
    };
    let section = table
        .entry(section.to_owned())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    if let Some(section) = section.as_table_mut() {
        section.insert(leaf.to_owned(), coerce_to_toml_value(val));
    }
}

/// Integers stay integers so numeric fields deserialize; everything else is
/// a string and left for validation to judge.
fn coerce_to_toml_value(val: &str) -> toml::Value {
    val.trim()
        .parse::<i64>()
        .map_or_else(|_| toml::Value::String(val.to_owned()), toml::Value::Integer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_env_applies_when_unset() {
        let mut merged: toml::Value = toml::from_str("[capsule]\nsegment_size = 4096").unwrap();
        let env = make_env(&[("FERRY_SEGMENT_SIZE", "8192"), ("FERRY_LOG_LEVEL", "debug")]);

        let applied = apply_env_fallbacks(&mut merged, &HashSet::new(), &env);
        assert_eq!(applied, 2);
        assert_eq!(
            merged["capsule"]["segment_size"],
            toml::Value::Integer(8192)
        );
        assert_eq!(
            merged["logging"]["level"],
            toml::Value::String("debug".to_owned())
        );
    }

    #[test]
    fn test_env_does_not_override_file() {
        let mut merged: toml::Value = toml::from_str("[capsule]\nsegment_size = 1024").unwrap();
        let env = make_env(&[("FERRY_SEGMENT_SIZE", "8192")]);
        let file_fields: HashSet<String> = ["capsule.segment_size".to_owned()].into();

        let applied = apply_env_fallbacks(&mut merged, &file_fields, &env);
        assert_eq!(applied, 0);
        assert_eq!(
            merged["capsule"]["segment_size"],
            toml::Value::Integer(1024)
        );
    }
}
