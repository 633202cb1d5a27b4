// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./kirim.toml` > `~/.config/kirim/kirim.toml` >
//! `/etc/kirim/kirim.toml` with environment variable overrides via `KIRIM_`
//! prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::KirimConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/kirim/kirim.toml` (system-wide)
/// 3. `~/.config/kirim/kirim.toml` (user XDG config)
/// 4. `./kirim.toml` (local directory)
/// 5. `KIRIM_*` environment variables
pub fn load_config() -> Result<KirimConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KirimConfig::default()))
        .merge(Toml::file("/etc/kirim/kirim.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("kirim/kirim.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("kirim.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<KirimConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KirimConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<KirimConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KirimConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `KIRIM_QUOTA_DEVELOPMENT_MONTHLY_LIMIT`
/// must map to `quota.development_monthly_limit`, not `quota.development.monthly.limit`.
fn env_provider() -> Env {
    Env::prefixed("KIRIM_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: KIRIM_GATEWAY_BEARER_TOKEN -> "gateway_bearer_token"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("service_", "service.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("whatsapp_", "whatsapp.", 1)
            .replacen("quota_", "quota.", 1)
            .replacen("scheduler_", "scheduler.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_string_overrides_defaults() {
        let config = load_config_from_str(
            r#"
            [gateway]
            port = 9000
            api_key = "k-123"

            [quota]
            development_monthly_limit = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.api_key.as_deref(), Some("k-123"));
        assert_eq!(config.quota.development_monthly_limit, 100);
        // Untouched sections keep their defaults.
        assert_eq!(config.storage.database_path, "kirim.db");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = load_config_from_str(
            r#"
            [gateway]
            prot = 9000
            "#,
        );
        assert!(result.is_err(), "typo'd key should fail deserialization");
    }

    #[test]
    #[serial_test::serial]
    fn env_var_overrides_map_to_sections() {
        // SAFETY: serialized test; no other thread reads the environment here.
        unsafe {
            std::env::set_var("KIRIM_QUOTA_DEVELOPMENT_MONTHLY_LIMIT", "42");
            std::env::set_var("KIRIM_GATEWAY_BEARER_TOKEN", "t-abc");
        }

        let config = load_config().unwrap();
        assert_eq!(config.quota.development_monthly_limit, 42);
        assert_eq!(config.gateway.bearer_token.as_deref(), Some("t-abc"));

        unsafe {
            std::env::remove_var("KIRIM_QUOTA_DEVELOPMENT_MONTHLY_LIMIT");
            std::env::remove_var("KIRIM_GATEWAY_BEARER_TOKEN");
        }
    }
}
