// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Media route provider server
//!
//! Serves a fixed set of routes (from a TOML file) to remote routers.
//!
//! # Usage
//!
//! ```bash
//! # Start server on default port (7420) with no routes
//! mediaroute-provider-server
//!
//! # Serve the routes from a config file
//! mediaroute-provider-server --config provider.toml
//! ```

use clap::Parser;
use mediaroute_provider_server::server::bind_addr;
use mediaroute_provider_server::{ProviderServer, ServerConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Media route provider server - exposes configured routes over TCP
#[derive(Parser, Debug)]
#[command(name = "mediaroute-provider-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value = "7420")]
    port: u16,

    /// Bind address (0.0.0.0 for all interfaces)
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Provider identity
    #[arg(long, default_value = "mediaroute.provider")]
    identity: String,

    /// Maximum number of registered clients
    #[arg(long, default_value = "64")]
    max_clients: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = if let Some(config_path) = args.config {
        info!("Loading config from {:?}", config_path);
        ServerConfig::from_file(&config_path)?
    } else {
        ServerConfig {
            bind_address: args.bind.parse()?,
            port: args.port,
            identity: args.identity,
            max_clients: args.max_clients,
            ..Default::default()
        }
    };

    info!("+----------------------------------------------------+");
    info!(
        "|     Media Route Provider Server v{}             |",
        env!("CARGO_PKG_VERSION")
    );
    info!("+----------------------------------------------------+");
    info!("|  Bind:     {:38} |", bind_addr(&config));
    info!("|  Identity: {:38} |", config.identity);
    info!("|  Routes:   {:38} |", config.routes.len());
    info!("|  Clients:  {:38} |", format!("max {}", config.max_clients));
    info!("+----------------------------------------------------+");

    let server = ProviderServer::new(config).await?;

    let server_handle = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received, stopping server...");
        server_handle.shutdown().await;
    });

    server.run().await?;

    info!("Provider server stopped");
    Ok(())
}
