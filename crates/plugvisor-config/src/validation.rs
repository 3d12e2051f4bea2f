// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as the known log levels, timeout bounds, and non-blank directories.

use crate::diagnostic::ConfigError;
use crate::model::PlugvisorConfig;

/// Log levels accepted by `host.log_level`.
pub const KNOWN_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Bounds for `plugins.stop_timeout_secs`, inclusive.
pub const STOP_TIMEOUT_RANGE: std::ops::RangeInclusive<u64> = 1..=300;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &PlugvisorConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.host.log_level.trim().to_ascii_lowercase();
    if !KNOWN_LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "host.log_level `{}` is not one of: {}",
                config.host.log_level,
                KNOWN_LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.host.workspace_root.as_os_str().is_empty() {
        errors.push(ConfigError::Validation {
            message: "host.workspace_root must not be empty".to_string(),
        });
    }

    if !STOP_TIMEOUT_RANGE.contains(&config.plugins.stop_timeout_secs) {
        errors.push(ConfigError::Validation {
            message: format!(
                "plugins.stop_timeout_secs must be between {} and {}, got {}",
                STOP_TIMEOUT_RANGE.start(),
                STOP_TIMEOUT_RANGE.end(),
                config.plugins.stop_timeout_secs
            ),
        });
    }

    for (i, dir) in config.plugins.scan_directories.iter().enumerate() {
        if dir.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("plugins.scan_directories[{i}] must not be blank"),
            });
        }
    }

    if config.plugins.temp_config_dir.as_os_str().is_empty() {
        errors.push(ConfigError::Validation {
            message: "plugins.temp_config_dir must not be empty".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
