// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Provider server configuration.

use mediaroute::descriptor::{
    ControlFilter, DeviceType, PlaybackType, ProviderDescriptor, RouteDescriptor, VolumeHandling,
};
use mediaroute::remote::codec::DEFAULT_MAX_MESSAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;

/// Provider server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// TCP port to listen on (default: 7420)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Provider identity reported in logs (default: mediaroute.provider)
    #[serde(default = "default_identity")]
    pub identity: String,

    /// Maximum number of registered clients
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Maximum message size (bytes)
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Routes published by the provider
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// One `[[routes]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Control categories the route accepts
    #[serde(default)]
    pub categories: Vec<String>,

    /// Custom control actions the route answers
    #[serde(default)]
    pub actions: Vec<String>,

    #[serde(default)]
    pub playback_type: PlaybackType,

    #[serde(default)]
    pub device_type: DeviceType,

    #[serde(default)]
    pub volume: i32,

    #[serde(default)]
    pub volume_max: i32,

    #[serde(default)]
    pub volume_handling: VolumeHandling,

    /// Member route ids, for group routes
    #[serde(default)]
    pub members: Vec<String>,
}

fn default_bind_address() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    7420
}

fn default_identity() -> String {
    "mediaroute.provider".to_string()
}

fn default_max_clients() -> usize {
    64
}

fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            identity: default_identity(),
            max_clients: default_max_clients(),
            max_message_size: default_max_message_size(),
            routes: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("port cannot be 0".into()));
        }
        if self.identity.is_empty() {
            return Err(ConfigError::InvalidValue("identity cannot be empty".into()));
        }
        if self.max_clients == 0 {
            return Err(ConfigError::InvalidValue("max_clients cannot be 0".into()));
        }
        if self.max_message_size < 1024 {
            return Err(ConfigError::InvalidValue(
                "max_message_size must be at least 1024".into(),
            ));
        }

        let mut seen = HashSet::new();
        for route in &self.routes {
            if route.id.is_empty() || route.name.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "route id and name cannot be empty".into(),
                ));
            }
            if !seen.insert(route.id.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "duplicate route id '{}'",
                    route.id
                )));
            }
            if route.volume_max < 0 || route.volume < 0 || route.volume > route.volume_max {
                return Err(ConfigError::InvalidValue(format!(
                    "route '{}': volume must lie in [0, volume_max]",
                    route.id
                )));
            }
        }
        for route in &self.routes {
            if let Some(missing) = route.members.iter().find(|m| !seen.contains(m.as_str())) {
                return Err(ConfigError::InvalidValue(format!(
                    "route '{}': unknown member '{}'",
                    route.id, missing
                )));
            }
        }
        Ok(())
    }

    /// The descriptor the provider publishes at startup.
    pub fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor::new(self.routes.iter().map(RouteConfig::to_descriptor).collect())
    }
}

impl RouteConfig {
    pub fn to_descriptor(&self) -> RouteDescriptor {
        let mut filter = ControlFilter::new();
        for category in &self.categories {
            filter = filter.with_category(category.clone());
        }
        for action in &self.actions {
            filter = filter.with_action(action.clone());
        }

        let mut builder = RouteDescriptor::builder(self.id.clone(), self.name.clone())
            .enabled(self.enabled)
            .add_control_filter(filter)
            .playback_type(self.playback_type)
            .device_type(self.device_type)
            .volume(self.volume)
            .volume_max(self.volume_max)
            .volume_handling(self.volume_handling);
        if let Some(description) = &self.description {
            builder = builder.description(description.clone());
        }
        if !self.members.is_empty() {
            builder = builder.group_member_ids(self.members.iter().cloned());
        }
        builder.build()
    }
}

/// Configuration error types.
#[derive(Debug, Clone)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(s) => write!(f, "I/O error: {}", s),
            Self::ParseError(s) => write!(f, "Parse error: {}", s),
            Self::InvalidValue(s) => write!(f, "Invalid value: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}
