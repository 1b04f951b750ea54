// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Covers constraints serde attributes cannot express: known plugin type
//! names, instance limits, log levels, and non-empty grant patterns.

use std::str::FromStr;

use strum::IntoEnumIterator;
use tessera_core::PluginType;

use crate::diagnostic::{ConfigError, suggest_key};
use crate::model::TesseraConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TesseraConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.host.name.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "host.name must not be empty".to_string(),
        });
    }

    if config.host.api_version == 0 {
        errors.push(ConfigError::Validation {
            message: "host.api_version must be at least 1".to_string(),
        });
    }

    if !LOG_LEVELS.contains(&config.host.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "host.log_level `{}` must be one of: {}",
                config.host.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.lifecycle.event_capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "lifecycle.event_capacity must be at least 1".to_string(),
        });
    }

    if config.lifecycle.slow_operation_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "lifecycle.slow_operation_ms must be at least 1".to_string(),
        });
    }

    if config.lifecycle.max_errors == 0 {
        errors.push(ConfigError::Validation {
            message: "lifecycle.max_errors must be at least 1".to_string(),
        });
    }

    let rate = config.lifecycle.max_error_rate;
    if !(rate > 0.0 && rate <= 1.0) {
        errors.push(ConfigError::Validation {
            message: format!("lifecycle.max_error_rate must be in (0, 1], got {rate}"),
        });
    }

    if let Some(path) = &config.sandbox.grant_store {
        if path.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "sandbox.grant_store must not be empty when set".to_string(),
            });
        }
    }

    if let Some(grant) = &config.sandbox.default_grant {
        let patterns = grant.file_read.iter().chain(grant.file_write.iter());
        if patterns.into_iter().any(|p| p.trim().is_empty()) {
            errors.push(ConfigError::Validation {
                message: "sandbox.default_grant file patterns must not be empty".to_string(),
            });
        }
    }

    let type_names: Vec<String> = PluginType::iter().map(|t| t.to_string()).collect();
    let type_refs: Vec<&str> = type_names.iter().map(String::as_str).collect();

    for (name, row) in &config.types {
        if PluginType::from_str(name).is_err() {
            errors.push(ConfigError::UnknownPluginType {
                name: name.clone(),
                suggestion: suggest_key(&name.to_ascii_uppercase(), &type_refs),
                valid_types: type_refs.join(", "),
            });
        }

        if let Some(limit) = row.max_instances {
            if limit == 0 || limit < -1 {
                errors.push(ConfigError::Validation {
                    message: format!(
                        "types.{name}.max_instances must be -1 (unbounded) or a positive integer, got {limit}"
                    ),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeOverride;

    #[test]
    fn default_config_validates() {
        let config = TesseraConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn zero_api_version_fails_validation() {
        let mut config = TesseraConfig::default();
        config.host.api_version = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("api_version"))));
    }

    #[test]
    fn unknown_log_level_fails_validation() {
        let mut config = TesseraConfig::default();
        config.host.log_level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("log_level"))));
    }

    #[test]
    fn unknown_type_gets_suggestion() {
        let mut config = TesseraConfig::default();
        config
            .types
            .insert("SECURTY".to_string(), TypeOverride::default());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::UnknownPluginType { suggestion: Some(s), .. } if s == "SECURITY"
        )));
    }

    #[test]
    fn zero_and_negative_limits_fail_validation() {
        for bad in [0, -2, -100] {
            let mut config = TesseraConfig::default();
            config.types.insert(
                "SECURITY".to_string(),
                TypeOverride {
                    max_instances: Some(bad),
                    ..TypeOverride::default()
                },
            );
            let errors = validate_config(&config).unwrap_err();
            assert_eq!(errors.len(), 1, "limit {bad}");
        }
    }

    #[test]
    fn unbounded_and_positive_limits_pass() {
        let mut config = TesseraConfig::default();
        config.types.insert(
            "SECURITY".to_string(),
            TypeOverride {
                max_instances: Some(5),
                ..TypeOverride::default()
            },
        );
        config.types.insert(
            "database".to_string(),
            TypeOverride {
                max_instances: Some(-1),
                critical: Some(false),
                requires_grant: None,
            },
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn execution_thresholds_are_checked() {
        let mut config = TesseraConfig::default();
        config.lifecycle.slow_operation_ms = 0;
        config.lifecycle.max_errors = 0;
        config.lifecycle.max_error_rate = 1.5;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("max_error_rate"))));

        config.lifecycle = crate::LifecycleConfig::default();
        config.lifecycle.max_error_rate = f64::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = TesseraConfig::default();
        config.host.api_version = 0;
        config.lifecycle.event_capacity = 0;
        config.sandbox.grant_store = Some("  ".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
