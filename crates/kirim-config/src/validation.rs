// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as cap ordering and non-empty paths.

use crate::diagnostic::ConfigError;
use crate::model::KirimConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &KirimConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

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

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if !config.whatsapp.default_country_code.chars().all(|c| c.is_ascii_digit())
        || config.whatsapp.default_country_code.is_empty()
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "whatsapp.default_country_code must be digits, got `{}`",
                config.whatsapp.default_country_code
            ),
        });
    }

    if config.whatsapp.pairing_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "whatsapp.pairing_timeout_secs must be at least 1".to_string(),
        });
    }

    for (key, value) in [
        (
            "quota.development_monthly_limit",
            config.quota.development_monthly_limit,
        ),
        ("quota.default_hourly_limit", config.quota.default_hourly_limit),
        ("quota.default_daily_limit", config.quota.default_daily_limit),
    ] {
        if value < 0 {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be non-negative, got {value}"),
            });
        }
    }

    if config.scheduler.tick_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "scheduler.tick_interval_secs must be at least 1".to_string(),
        });
    }

    if config.scheduler.tick_cap_max == 0 {
        errors.push(ConfigError::Validation {
            message: "scheduler.tick_cap_max must be at least 1".to_string(),
        });
    }

    if config.scheduler.tick_cap_min > config.scheduler.tick_cap_max {
        errors.push(ConfigError::Validation {
            message: format!(
                "scheduler.tick_cap_min ({}) must not exceed scheduler.tick_cap_max ({})",
                config.scheduler.tick_cap_min, config.scheduler.tick_cap_max
            ),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&KirimConfig::default()).is_ok());
    }

    #[test]
    fn inverted_tick_caps_are_rejected() {
        let mut config = KirimConfig::default();
        config.scheduler.tick_cap_min = 20;
        config.scheduler.tick_cap_max = 5;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("tick_cap_min")));
    }

    #[test]
    fn non_numeric_country_code_is_rejected() {
        let mut config = KirimConfig::default();
        config.whatsapp.default_country_code = "+62".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn negative_quota_limit_is_rejected() {
        let mut config = KirimConfig::default();
        config.quota.development_monthly_limit = -1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = KirimConfig::default();
        config.gateway.host = String::new();
        config.storage.database_path = "  ".to_string();
        config.scheduler.tick_interval_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
