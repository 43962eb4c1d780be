// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scan configuration.
//!
//! Supports both programmatic and file-based configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Label used for peers that do not advertise a name.
pub const DEFAULT_UNKNOWN_NAME: &str = "unknown device";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Discovery session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Time after start at which a session completes on its own (milliseconds).
    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,

    /// Display name given to peers that report none.
    #[serde(default = "default_unknown_name")]
    pub unknown_name: String,

    /// Capacity of the radio event channel feeding the coordinator.
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_scan_timeout_ms() -> u64 {
    10_000
}

fn default_unknown_name() -> String {
    DEFAULT_UNKNOWN_NAME.to_string()
}

fn default_event_queue_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scan_timeout_ms: default_scan_timeout_ms(),
            unknown_name: default_unknown_name(),
            event_queue_capacity: default_event_queue_capacity(),
            log_level: default_log_level(),
        }
    }
}

impl ScanConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration with a custom scan window.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            scan_timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            ..Default::default()
        }
    }

    /// Scan window as a Duration.
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan_timeout_ms == 0 {
            return Err(ConfigError::Invalid("scan_timeout_ms cannot be 0".into()));
        }
        if self.unknown_name.trim().is_empty() {
            return Err(ConfigError::Invalid("unknown_name cannot be empty".into()));
        }
        if self.event_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_queue_capacity cannot be 0".into(),
            ));
        }
        Ok(())
    }
}
