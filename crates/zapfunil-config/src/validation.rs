// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: unique instance ids, non-empty credentials, ordered PDF
//! tiers, and sane scheduler intervals.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::ZapfunilConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ZapfunilConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.server.host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    }

    if config.scheduler.tick_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "scheduler.tick_interval_secs must be greater than zero".to_string(),
        });
    }

    let mut seen_ids = HashSet::new();
    for (i, instance) in config.instances.iter().enumerate() {
        if instance.id.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("instances[{i}].id must not be empty"),
            });
        } else if !seen_ids.insert(&instance.id) {
            errors.push(ConfigError::Validation {
                message: format!("duplicate instance id `{}`", instance.id),
            });
        }

        if instance.unit.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("instances[{i}].unit must not be empty"),
            });
        }
        if instance.base_url.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("instances[{i}].base_url must not be empty"),
            });
        }
        if instance.api_key.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("instances[{i}].api_key must not be empty"),
            });
        }
    }

    for (unit, materials) in &config.materials {
        let mut prev_max = 0;
        for tier in &materials.pdf_tiers {
            if tier.max_guests <= 0 {
                errors.push(ConfigError::Validation {
                    message: format!(
                        "materials.{unit}: pdf tier max_guests must be positive, got {}",
                        tier.max_guests
                    ),
                });
            }
            if tier.max_guests <= prev_max {
                errors.push(ConfigError::Validation {
                    message: format!(
                        "materials.{unit}: pdf_tiers must be ascending by max_guests"
                    ),
                });
            }
            prev_max = tier.max_guests;
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
