// SPDX-FileCopyrightText: 2026 Kirim Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the kirim gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level kirim configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KirimConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// External WhatsApp-Web bridge settings.
    #[serde(default)]
    pub whatsapp: WhatsappConfig,

    /// Quota classification and per-session send limits.
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Batch scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "kirim".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token protecting session-management routes.
    /// `None` rejects all management requests (fail-closed).
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// API key protecting the public send routes (`x-api-key` header).
    /// `None` rejects all send requests (fail-closed).
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            api_key: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8330
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    "kirim.db".to_string()
}

fn default_true() -> bool {
    true
}

/// External WhatsApp-Web bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsappConfig {
    /// Base URL of the local bridge REST API.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// API key for the bridge, if it requires one.
    #[serde(default)]
    pub bridge_api_key: Option<String>,

    /// Country code prepended to destination phones when the caller omits one.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,

    /// Upper bound on a pairing handshake before it fails with a timeout.
    #[serde(default = "default_pairing_timeout_secs")]
    pub pairing_timeout_secs: u64,

    /// Interval between bridge status polls during pairing.
    #[serde(default = "default_status_poll_ms")]
    pub status_poll_interval_ms: u64,
}

impl Default for WhatsappConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            bridge_api_key: None,
            default_country_code: default_country_code(),
            pairing_timeout_secs: default_pairing_timeout_secs(),
            status_poll_interval_ms: default_status_poll_ms(),
        }
    }
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:8085".to_string()
}

fn default_country_code() -> String {
    "62".to_string()
}

fn default_pairing_timeout_secs() -> u64 {
    120
}

fn default_status_poll_ms() -> u64 {
    1500
}

/// Quota classification and per-session send limit configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    /// Monthly item count above which a tenant's sends are tagged PRODUCTION.
    #[serde(default = "default_development_monthly_limit")]
    pub development_monthly_limit: i64,

    /// Hourly send ceiling assigned to newly created sessions.
    #[serde(default = "default_hourly_limit")]
    pub default_hourly_limit: i64,

    /// Daily send ceiling assigned to newly created sessions.
    #[serde(default = "default_daily_limit")]
    pub default_daily_limit: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            development_monthly_limit: default_development_monthly_limit(),
            default_hourly_limit: default_hourly_limit(),
            default_daily_limit: default_daily_limit(),
        }
    }
}

fn default_development_monthly_limit() -> i64 {
    1000
}

fn default_hourly_limit() -> i64 {
    100
}

fn default_daily_limit() -> i64 {
    1000
}

/// Batch scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Whether the periodic scheduler runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between scheduler ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Lower bound of the per-session batch cap drawn each tick.
    #[serde(default = "default_tick_cap_min")]
    pub tick_cap_min: u32,

    /// Upper bound of the per-session batch cap drawn each tick.
    #[serde(default = "default_tick_cap_max")]
    pub tick_cap_max: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: default_tick_interval_secs(),
            tick_cap_min: default_tick_cap_min(),
            tick_cap_max: default_tick_cap_max(),
        }
    }
}

fn default_tick_interval_secs() -> u64 {
    600
}

fn default_tick_cap_min() -> u32 {
    3
}

fn default_tick_cap_max() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = KirimConfig::default();
        assert_eq!(config.service.name, "kirim");
        assert_eq!(config.gateway.port, 8330);
        assert_eq!(config.storage.database_path, "kirim.db");
        assert!(config.storage.wal_mode);
        assert_eq!(config.whatsapp.default_country_code, "62");
        assert_eq!(config.quota.development_monthly_limit, 1000);
        assert!(config.scheduler.tick_cap_min <= config.scheduler.tick_cap_max);
    }

    #[test]
    fn auth_defaults_are_fail_closed() {
        let config = GatewayConfig::default();
        assert!(config.bearer_token.is_none());
        assert!(config.api_key.is_none());
    }
}
