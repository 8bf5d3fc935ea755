// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Standalone media route provider service.
//!
//! Publishes the routes listed in a TOML file and serves them to remote
//! routers over TCP, using the length-prefixed JSON protocol that
//! [`mediaroute::remote::TcpConnector`] speaks.

pub mod config;
pub mod provider;
pub mod server;

pub use config::{ConfigError, RouteConfig, ServerConfig};
pub use server::{ProviderServer, ServerError};
