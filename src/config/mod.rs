//! Configuration module for the dispatch backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// How automatic `PICKUP`/`ARRIVED` events are appended after a coordinate report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAppendMode {
    /// Appended in the same transaction as the coordinate insert.
    Inline,
    /// Appended by a spawned task after the coordinate commits; failures are only logged.
    Background,
}

/// Output format for the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Invalid configuration value.
#[derive(Debug)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid value for {}: {:?}", self.key, self.value)
    }
}

impl std::error::Error for ConfigError {}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key guarding the internal routes (open when unset)
    pub internal_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Lifetime of a cached vehicle identity
    pub identity_ttl: Duration,
    /// Retry hint returned by the notification poller
    pub notification_retry_ms: u64,
    /// In-process dispatch cadence; `None` leaves matching to the external trigger
    pub matching_interval: Option<Duration>,
    pub status_append: StatusAppendMode,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let internal_psk = lookup("DISPATCH_INTERNAL_PSK").filter(|s| !s.is_empty());

        let db_path = lookup("DISPATCH_DB_PATH")
            .unwrap_or_else(|| "./data/dispatch.sqlite".to_string())
            .into();

        let bind_raw =
            lookup("DISPATCH_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError {
            key: "DISPATCH_BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let log_level = lookup("DISPATCH_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let log_format = match lookup("DISPATCH_LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError {
                    key: "DISPATCH_LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        let identity_ttl = Duration::from_millis(parse_u64(
            &lookup,
            "DISPATCH_IDENTITY_TTL_MS",
            300_000,
        )?);

        let notification_retry_ms = parse_u64(&lookup, "DISPATCH_NOTIFICATION_RETRY_MS", 30)?;

        let matching_interval = match parse_u64(&lookup, "DISPATCH_MATCHING_INTERVAL_MS", 0)? {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        let status_append = match lookup("DISPATCH_STATUS_APPEND").as_deref() {
            None | Some("inline") => StatusAppendMode::Inline,
            Some("background") => StatusAppendMode::Background,
            Some(other) => {
                return Err(ConfigError {
                    key: "DISPATCH_STATUS_APPEND",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            internal_psk,
            db_path,
            bind_addr,
            log_level,
            log_format,
            identity_ttl,
            notification_retry_ms,
            matching_interval,
            status_append,
        })
    }
}

fn parse_u64<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]).unwrap();

        assert!(config.internal_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/dispatch.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.identity_ttl, Duration::from_secs(300));
        assert_eq!(config.notification_retry_ms, 30);
        assert!(config.matching_interval.is_none());
        assert_eq!(config.status_append, StatusAppendMode::Inline);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DISPATCH_INTERNAL_PSK", "secret"),
            ("DISPATCH_BIND_ADDR", "0.0.0.0:9000"),
            ("DISPATCH_LOG_FORMAT", "json"),
            ("DISPATCH_IDENTITY_TTL_MS", "1500"),
            ("DISPATCH_MATCHING_INTERVAL_MS", "250"),
            ("DISPATCH_STATUS_APPEND", "background"),
        ])
        .unwrap();

        assert_eq!(config.internal_psk.as_deref(), Some("secret"));
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.identity_ttl, Duration::from_millis(1500));
        assert_eq!(config.matching_interval, Some(Duration::from_millis(250)));
        assert_eq!(config.status_append, StatusAppendMode::Background);
    }

    #[test]
    fn test_empty_psk_is_unset() {
        let config = config_from(&[("DISPATCH_INTERNAL_PSK", "")]).unwrap();
        assert!(config.internal_psk.is_none());
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = config_from(&[("DISPATCH_BIND_ADDR", "not-an-addr")]).unwrap_err();
        assert_eq!(err.key, "DISPATCH_BIND_ADDR");

        let err = config_from(&[("DISPATCH_IDENTITY_TTL_MS", "soon")]).unwrap_err();
        assert_eq!(err.key, "DISPATCH_IDENTITY_TTL_MS");

        let err = config_from(&[("DISPATCH_STATUS_APPEND", "eventually")]).unwrap_err();
        assert_eq!(err.key, "DISPATCH_STATUS_APPEND");
    }
}
