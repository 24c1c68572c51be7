//! Configuration loading from environment variables.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for the stock reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Upper bound for every single store call.
    pub store_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
        }
    }
}

/// Process configuration.
///
/// - `STOCKLEDGER_BIND_ADDR` (default `0.0.0.0:8080`)
/// - `DATABASE_URL` (optional; in-memory store when unset)
/// - `STOCKLEDGER_STORE_TIMEOUT_MS` (default 5000, must be > 0)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub reconciler: ReconcilerConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = lookup("STOCKLEDGER_BIND_ADDR")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        let store_timeout = match lookup("STOCKLEDGER_STORE_TIMEOUT_MS") {
            None => Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            Some(raw) => {
                let ms: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::Invalid {
                        key: "STOCKLEDGER_STORE_TIMEOUT_MS",
                        value: raw.clone(),
                        reason: e.to_string(),
                    }
                })?;
                if ms == 0 {
                    return Err(ConfigError::Invalid {
                        key: "STOCKLEDGER_STORE_TIMEOUT_MS",
                        value: raw,
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Duration::from_millis(ms)
            }
        };

        Ok(Self {
            bind_addr,
            database_url,
            reconciler: ReconcilerConfig { store_timeout },
        })
    }
}
