// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the kirim WhatsApp gateway.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), XDG file hierarchy lookup, environment variable
//! overrides, and miette diagnostic error rendering.
//!
//! # Usage
//!
//! ```no_run
//! use kirim_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("listening on {}:{}", config.gateway.host, config.gateway.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::KirimConfig;

/// Load configuration from the XDG hierarchy and validate it.
///
/// This is the high-level entry point that:
/// 1. Loads config from TOML files + env vars via Figment
/// 2. On success: runs post-deserialization validation
/// 3. On Figment error: converts to miette diagnostics
pub fn load_and_validate() -> Result<KirimConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err)),
    }
}

/// Load configuration from a specific TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<KirimConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_toml_loads_and_validates() {
        let config = load_and_validate_str(
            r#"
            [scheduler]
            tick_interval_secs = 60
            tick_cap_min = 1
            tick_cap_max = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.scheduler.tick_interval_secs, 60);
    }

    #[test]
    fn semantic_violation_surfaces_as_validation_error() {
        let errors = load_and_validate_str(
            r#"
            [scheduler]
            tick_cap_min = 9
            tick_cap_max = 2
            "#,
        )
        .unwrap_err();
        assert!(matches!(errors[0], ConfigError::Validation { .. }));
    }
}
