//! Process configuration, read from environment variables.
//!
//! | variable | default |
//! |----------|---------|
//! | `SALESDESK_BIND_ADDR` | `0.0.0.0:8080` |
//! | `USE_PERSISTENT_STORES` | `false` |
//! | `DATABASE_URL` | unset (required when persistent) |
//! | `DATABASE_MAX_CONNECTIONS` | `5` |
//! | `REDIS_URL` | unset (in-process bus) |
//! | `SALES_EVENTS_CHANNEL` | `salesdesk.sales.events` |
//! | `LOG_FORMAT` | `json` |
//!
//! A value that fails to parse falls back to its default with a warning.

use std::net::SocketAddr;
use std::str::FromStr;

use salesdesk_observability::LogFormat;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_EVENTS_CHANNEL: &str = "salesdesk.sales.events";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub redis_url: Option<String>,
    pub events_channel: String,
    pub log_format: LogFormat,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            use_persistent_stores: false,
            database_url: None,
            database_max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            redis_url: None,
            events_channel: DEFAULT_EVENTS_CHANNEL.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: parse_or("SALESDESK_BIND_ADDR", &lookup, defaults.bind_addr),
            use_persistent_stores: parse_or("USE_PERSISTENT_STORES", &lookup, defaults.use_persistent_stores),
            database_url: non_empty(lookup("DATABASE_URL")),
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                &lookup,
                defaults.database_max_connections,
            ),
            redis_url: non_empty(lookup("REDIS_URL")),
            events_channel: non_empty(lookup("SALES_EVENTS_CHANNEL")).unwrap_or(defaults.events_channel),
            log_format: parse_or("LOG_FORMAT", &lookup, defaults.log_format),
        }
    }
}

/// `LOG_FORMAT` alone, for initializing logging before the rest of the config is read.
pub fn log_format_from_env() -> LogFormat {
    std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> T
where
    T: FromStr + core::fmt::Debug,
    T::Err: core::fmt::Display,
{
    let Some(raw) = non_empty(lookup(key)) else {
        return default;
    };
    match raw.parse() {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, default = ?default, "invalid config value; using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ApiConfig {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ApiConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(config_from(&[]), ApiConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = config_from(&[
            ("SALESDESK_BIND_ADDR", "127.0.0.1:9000"),
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/sales"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("REDIS_URL", "redis://localhost:6379"),
            ("SALES_EVENTS_CHANNEL", "custom.channel"),
            ("LOG_FORMAT", "pretty"),
        ]);

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert!(config.use_persistent_stores);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/sales"));
        assert_eq!(config.database_max_connections, 12);
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(config.events_channel, "custom.channel");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn unparseable_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("SALESDESK_BIND_ADDR", "not an address"),
            ("USE_PERSISTENT_STORES", "yes please"),
            ("DATABASE_MAX_CONNECTIONS", "-3"),
            ("LOG_FORMAT", "xml"),
        ]);

        assert_eq!(config, ApiConfig::default());
    }

    #[test]
    fn blank_urls_count_as_unset() {
        let config = config_from(&[("DATABASE_URL", "  "), ("REDIS_URL", "")]);
        assert_eq!(config.database_url, None);
        assert_eq!(config.redis_url, None);
    }
}
