//! Configuration management for PipeStore
//!
//! Provides presets for common deployments and a validator that rejects
//! settings which would corrupt the on-disk layout.

use std::time::Duration;

use crate::error::{StoreError, StoreResult};
use crate::format::{DEFAULT_DELIMITER, NULL_SENTINEL};

/// PipeStore configuration with deployment presets
#[derive(Debug, Clone)]
pub struct Config {
    /// Field delimiter used in the header and in every row
    pub delimiter: char,
    /// Value returned for fields missing from a short row
    pub null_sentinel: String,
    /// Maximum number of rows held by the read cache
    pub cache_capacity: usize,
    /// Worker threads draining the mutation queue
    pub worker_threads: usize,
    /// How long `shutdown` waits for queued mutations before cancelling them
    pub shutdown_grace: Duration,
    /// Suffix appended to the table path for the rewrite temp file
    pub temp_suffix: String,
    /// Durably sync the table file after every in-place update
    pub sync_writes: bool,
}

impl Config {
    /// Standard: pipe-delimited, 100 cached rows, 4 workers
    pub fn standard() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            null_sentinel: NULL_SENTINEL.to_string(),
            cache_capacity: 100,
            worker_threads: 4,
            shutdown_grace: Duration::from_secs(5),
            temp_suffix: ".tmp".to_string(),
            sync_writes: false,
        }
    }

    /// Durable: standard settings plus a data sync after every update
    pub fn durable() -> Self {
        Self {
            sync_writes: true,
            shutdown_grace: Duration::from_secs(30),
            ..Self::standard()
        }
    }

    /// Minimal: one worker and a small cache for constrained hosts
    pub fn minimal() -> Self {
        Self {
            cache_capacity: 16,
            worker_threads: 1,
            shutdown_grace: Duration::from_secs(2),
            ..Self::standard()
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> StoreResult<()> {
        if !self.delimiter.is_ascii() || self.delimiter == '\n' || self.delimiter == '\r' {
            return Err(StoreError::InvalidConfig(
                "delimiter must be an ASCII character other than a line terminator".into(),
            ));
        }
        if self.null_sentinel.contains(self.delimiter)
            || self.null_sentinel.contains(['\n', '\r'])
        {
            return Err(StoreError::InvalidConfig(
                "null_sentinel must not contain the delimiter or a line terminator".into(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(StoreError::InvalidConfig("cache_capacity must be > 0".into()));
        }
        if self.worker_threads == 0 || self.worker_threads > 64 {
            return Err(StoreError::InvalidConfig("worker_threads must be in [1, 64]".into()));
        }
        if self.shutdown_grace.is_zero() {
            return Err(StoreError::InvalidConfig("shutdown_grace must be > 0".into()));
        }
        if self.temp_suffix.is_empty() {
            return Err(StoreError::InvalidConfig("temp_suffix must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self { Self::standard() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_presets_valid() {
        assert!(Config::standard().validate().is_ok());
        assert!(Config::durable().validate().is_ok());
        assert!(Config::minimal().validate().is_ok());
    }

    #[test]
    fn test_default_matches_file_format() {
        let config = Config::default();
        assert_eq!(config.delimiter, '|');
        assert_eq!(config.null_sentinel, "null");
        assert_eq!(config.cache_capacity, 100);
        assert!(!config.sync_writes);
    }

    #[test]
    fn test_rejects_newline_delimiter() {
        let config = Config { delimiter: '\n', ..Config::default() };
        assert!(matches!(config.validate(), Err(StoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_sentinel_with_delimiter() {
        let config = Config { null_sentinel: "n|a".into(), ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_sizes() {
        assert!(Config { cache_capacity: 0, ..Config::default() }.validate().is_err());
        assert!(Config { worker_threads: 0, ..Config::default() }.validate().is_err());
        assert!(Config { shutdown_grace: Duration::ZERO, ..Config::default() }.validate().is_err());
        assert!(Config { temp_suffix: String::new(), ..Config::default() }.validate().is_err());
    }
}
