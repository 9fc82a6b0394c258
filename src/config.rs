//! Process configuration
//!
//! Loaded once at startup from an enumerated set of `FOLLOWGRAPH_*`
//! environment variables and then passed around by value. Unknown
//! variables under the prefix are ignored.

use crate::persistence::StorageOptions;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;

/// Prefix shared by every recognised environment variable
pub const ENV_PREFIX: &str = "FOLLOWGRAPH_";

pub const DATA_PATH: &str = "FOLLOWGRAPH_DATA_PATH";
pub const IN_MEMORY: &str = "FOLLOWGRAPH_IN_MEMORY";
pub const LOCK_TIMEOUT_MS: &str = "FOLLOWGRAPH_LOCK_TIMEOUT_MS";
pub const WRITE_BUFFER_MB: &str = "FOLLOWGRAPH_WRITE_BUFFER_MB";
pub const SYNC_WRITES: &str = "FOLLOWGRAPH_SYNC_WRITES";
pub const LOG_LEVEL: &str = "FOLLOWGRAPH_LOG_LEVEL";

const BYTES_PER_MB: usize = 1024 * 1024;

/// Configuration errors
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Follow graph configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FollowGraphConfig {
    /// RocksDB directory (None = in-memory only)
    pub data_path: Option<PathBuf>,
    /// Maximum wait for a row lock, in milliseconds
    pub lock_timeout_ms: i64,
    /// RocksDB write buffer size, in MiB
    pub write_buffer_mb: usize,
    /// fsync the WAL on every commit
    pub sync_writes: bool,
    /// Maximum log level for the binary's subscriber
    pub log_level: Level,
}

impl Default for FollowGraphConfig {
    fn default() -> Self {
        Self {
            data_path: Some(PathBuf::from("./followgraph_data")),
            lock_timeout_ms: 1000,
            write_buffer_mb: 64,
            sync_writes: false,
            log_level: Level::INFO,
        }
    }
}

impl FollowGraphConfig {
    /// Defaults without a data directory
    pub fn in_memory() -> Self {
        Self {
            data_path: None,
            ..Self::default()
        }
    }

    /// Read the process environment
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; missing keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(DATA_PATH) {
            let trimmed = raw.trim();
            config.data_path = if trimmed.is_empty() {
                None
            } else {
                Some(PathBuf::from(trimmed))
            };
        }

        if let Some(raw) = lookup(IN_MEMORY) {
            if parse_bool(IN_MEMORY, &raw)? {
                config.data_path = None;
            }
        }

        if let Some(raw) = lookup(LOCK_TIMEOUT_MS) {
            // RocksDB waits forever on a negative timeout
            let timeout: i64 = parse_number(LOCK_TIMEOUT_MS, &raw)?;
            if timeout <= 0 {
                return Err(invalid(LOCK_TIMEOUT_MS, &raw));
            }
            config.lock_timeout_ms = timeout;
        }

        if let Some(raw) = lookup(WRITE_BUFFER_MB) {
            let mb: usize = parse_number(WRITE_BUFFER_MB, &raw)?;
            if mb == 0 || mb.checked_mul(BYTES_PER_MB).is_none() {
                return Err(invalid(WRITE_BUFFER_MB, &raw));
            }
            config.write_buffer_mb = mb;
        }

        if let Some(raw) = lookup(SYNC_WRITES) {
            config.sync_writes = parse_bool(SYNC_WRITES, &raw)?;
        }

        if let Some(raw) = lookup(LOG_LEVEL) {
            config.log_level = Level::from_str(raw.trim()).map_err(|_| invalid(LOG_LEVEL, &raw))?;
        }

        Ok(config)
    }

    /// RocksDB tuning derived from this configuration
    pub fn storage_options(&self) -> StorageOptions {
        StorageOptions {
            lock_timeout_ms: self.lock_timeout_ms,
            write_buffer_size: self.write_buffer_mb.saturating_mul(BYTES_PER_MB),
            sync_writes: self.sync_writes,
        }
    }
}

fn invalid(key: &str, raw: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    }
}

/// Accepts `1/true/yes/on` and `0/false/no/off`, case-insensitive.
fn parse_bool(key: &str, raw: &str) -> ConfigResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, raw)),
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> ConfigResult<T> {
    raw.trim().parse().map_err(|_| invalid(key, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = FollowGraphConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, FollowGraphConfig::default());
    }

    #[test]
    fn test_reads_enumerated_keys() {
        let config = FollowGraphConfig::from_lookup(lookup(&[
            (DATA_PATH, "/var/lib/followgraph"),
            (LOCK_TIMEOUT_MS, "250"),
            (WRITE_BUFFER_MB, "16"),
            (SYNC_WRITES, "yes"),
            (LOG_LEVEL, "debug"),
        ]))
        .unwrap();

        assert_eq!(config.data_path, Some(PathBuf::from("/var/lib/followgraph")));
        assert_eq!(config.lock_timeout_ms, 250);
        assert_eq!(config.write_buffer_mb, 16);
        assert!(config.sync_writes);
        assert_eq!(config.log_level, Level::DEBUG);

        let storage = config.storage_options();
        assert_eq!(storage.write_buffer_size, 16 * 1024 * 1024);
        assert_eq!(storage.lock_timeout_ms, 250);
    }

    #[test]
    fn test_in_memory_overrides_path() {
        let config = FollowGraphConfig::from_lookup(lookup(&[
            (DATA_PATH, "/tmp/graph"),
            (IN_MEMORY, "TRUE"),
        ]))
        .unwrap();
        assert!(config.data_path.is_none());

        let config = FollowGraphConfig::from_lookup(lookup(&[(DATA_PATH, "  ")])).unwrap();
        assert!(config.data_path.is_none());
    }

    #[test]
    fn test_invalid_values() {
        let err = FollowGraphConfig::from_lookup(lookup(&[(LOCK_TIMEOUT_MS, "soon")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: LOCK_TIMEOUT_MS.to_string(),
                value: "soon".to_string(),
            }
        );

        assert!(FollowGraphConfig::from_lookup(lookup(&[(SYNC_WRITES, "maybe")])).is_err());

        for timeout in ["-1", "0"] {
            let err = FollowGraphConfig::from_lookup(lookup(&[(LOCK_TIMEOUT_MS, timeout)])).unwrap_err();
            assert_eq!(
                err,
                ConfigError::InvalidValue {
                    key: LOCK_TIMEOUT_MS.to_string(),
                    value: timeout.to_string(),
                }
            );
        }

        let huge = usize::MAX.to_string();
        for size in ["0", huge.as_str()] {
            assert!(matches!(
                FollowGraphConfig::from_lookup(lookup(&[(WRITE_BUFFER_MB, size)])),
                Err(ConfigError::InvalidValue { .. })
            ));
        }
        assert!(FollowGraphConfig::from_lookup(lookup(&[(LOG_LEVEL, "loud")])).is_err());
    }

    #[test]
    fn test_keys_share_prefix() {
        for key in [DATA_PATH, IN_MEMORY, LOCK_TIMEOUT_MS, WRITE_BUFFER_MB, SYNC_WRITES, LOG_LEVEL] {
            assert!(key.starts_with(ENV_PREFIX));
        }
    }
}
