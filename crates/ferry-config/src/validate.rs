use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Validate a fully merged configuration.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] naming the first offending field.
pub fn validate(config: &Config) -> ConfigResult<()> {
    let capsule = &config.capsule;
    if capsule.segment_size == 0 {
        return Err(invalid("capsule.segment_size", "must be greater than zero"));
    }
    if capsule.decode_reserve == 0 {
        return Err(invalid("capsule.decode_reserve", "must be greater than zero"));
    }
    if capsule.max_envelope_len > u64::from(u32::MAX) {
        return Err(invalid(
            "capsule.max_envelope_len",
            "must fit in the 32-bit envelope length word",
        ));
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(invalid(
            "logging.level",
            &format!("unknown level '{}'", config.logging.level),
        ));
    }
    if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            &format!("unknown format '{}'", config.logging.format),
        ));
    }
    Ok(())
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.to_owned(),
    }
}
