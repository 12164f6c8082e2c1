// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid bind addresses, non-empty paths, and positive buffer sizes.

use crate::diagnostic::ConfigError;
use crate::model::LifelineConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &LifelineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.name.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.name must not be empty".to_string(),
        });
    }

    // A bare level or a full EnvFilter directive (`info,lifeline_hub=debug`).
    let level = config.server.log_level.trim();
    let base = level.split(',').next().unwrap_or_default();
    if !base.contains('=') && !LOG_LEVELS.contains(&base) {
        errors.push(ConfigError::Validation {
            message: format!(
                "server.log_level `{level}` is not one of {}",
                LOG_LEVELS.join(", ")
            ),
        });
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("gateway.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.gateway.port == 0 {
        errors.push(ConfigError::Validation {
            message: "gateway.port must not be 0".to_string(),
        });
    }

    if let Some(token) = &config.gateway.bearer_token
        && token.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "gateway.bearer_token must not be blank when set".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.delivery.session_buffer == 0 {
        errors.push(ConfigError::Validation {
            message: "delivery.session_buffer must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
