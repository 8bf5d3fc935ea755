// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Router configuration.
//!
//! Supports both programmatic and file-based configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

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

/// Registry and proxy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Resource-constrained device: passive discovery requests are dropped and
    /// route availability queries answer optimistically.
    #[serde(default)]
    pub low_ram_device: bool,

    /// Highest numeric suffix tried when disambiguating unique route ids.
    #[serde(default = "default_max_unique_id_suffix")]
    pub max_unique_id_suffix: u32,

    /// Remote proxy settings.
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Settings for out-of-process provider proxies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Protocol version announced on REGISTER.
    #[serde(default = "default_client_version")]
    pub client_version: i32,

    /// First delay before re-binding after link death (milliseconds).
    #[serde(default = "default_rebind_initial_delay_ms")]
    pub rebind_initial_delay_ms: u64,

    /// Backoff ceiling for re-binding (milliseconds).
    #[serde(default = "default_rebind_max_delay_ms")]
    pub rebind_max_delay_ms: u64,

    /// Watchdog on pending control-request replies (milliseconds, 0 = off).
    #[serde(default)]
    pub reply_timeout_ms: u64,

    /// Largest accepted frame on a TCP link (bytes).
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

fn default_max_unique_id_suffix() -> u32 {
    1000
}

fn default_client_version() -> i32 {
    crate::remote::protocol::CLIENT_VERSION_CURRENT
}

fn default_rebind_initial_delay_ms() -> u64 {
    250
}

fn default_rebind_max_delay_ms() -> u64 {
    30_000
}

fn default_max_message_size() -> usize {
    crate::remote::codec::DEFAULT_MAX_MESSAGE_SIZE
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            low_ram_device: false,
            max_unique_id_suffix: default_max_unique_id_suffix(),
            remote: RemoteConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            client_version: default_client_version(),
            rebind_initial_delay_ms: default_rebind_initial_delay_ms(),
            rebind_max_delay_ms: default_rebind_max_delay_ms(),
            reply_timeout_ms: 0,
            max_message_size: default_max_message_size(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_unique_id_suffix < 2 {
            return Err(ConfigError::Invalid(
                "max_unique_id_suffix must be at least 2".into(),
            ));
        }
        self.remote.validate()
    }
}

impl RemoteConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        use crate::remote::protocol::{CLIENT_VERSION_1, CLIENT_VERSION_CURRENT};

        if !(CLIENT_VERSION_1..=CLIENT_VERSION_CURRENT).contains(&self.client_version) {
            return Err(ConfigError::Invalid(format!(
                "client_version {} not in {}..={}",
                self.client_version, CLIENT_VERSION_1, CLIENT_VERSION_CURRENT
            )));
        }
        if self.rebind_initial_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "rebind_initial_delay_ms must be positive".into(),
            ));
        }
        if self.rebind_max_delay_ms < self.rebind_initial_delay_ms {
            return Err(ConfigError::Invalid(
                "rebind_max_delay_ms is below rebind_initial_delay_ms".into(),
            ));
        }
        if self.max_message_size < 64 {
            return Err(ConfigError::Invalid("max_message_size too small".into()));
        }
        Ok(())
    }

    /// Backoff delay before rebind attempt number `attempt` (0-based).
    pub fn rebind_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(20)).unwrap_or(u64::MAX);
        let ms = self
            .rebind_initial_delay_ms
            .saturating_mul(factor)
            .min(self.rebind_max_delay_ms);
        Duration::from_millis(ms)
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        (self.reply_timeout_ms > 0).then(|| Duration::from_millis(self.reply_timeout_ms))
    }
}
