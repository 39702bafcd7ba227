//! Full configuration validation.
//!
//! Validates numeric ranges for every section and collects all errors into
//! a single `ConfigError`.

mod helpers;


use crate::schema::RelayConfig;
use helpers::validate_range;
use talkpair_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &RelayConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_range(&mut errors, "server.port", config.server.port, 1, u16::MAX);
    if config.server.bind.trim().is_empty() {
        errors.push("server.bind must not be empty".into());
    }

    validate_range(&mut errors, "limits.max_name_len", config.limits.max_name_len, 1, 256);
    validate_range(
        &mut errors,
        "limits.outbound_buffer",
        config.limits.outbound_buffer,
        8,
        65_536,
    );

    validate_range(&mut errors, "stats.interval_secs", config.stats.interval_secs, 1, 3600);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
