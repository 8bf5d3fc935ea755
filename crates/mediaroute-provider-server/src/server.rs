// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Provider server core.
//!
//! The provider and its [`ProviderService`] live on one dedicated thread;
//! connection tasks reach it through a [`ServiceHandle`] and receive replies
//! through a per-connection channel.

use crate::config::ServerConfig;
use crate::provider::build_provider;
use mediaroute::remote::{ClientSink, ServiceMessage};
use mediaroute::service::{ProviderService, ServiceConfig, ServiceHandle};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{debug, error, info, warn};

pub mod connection;

pub use connection::ClientConnection;

const SERVICE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Provider server - serves the configured routes to remote routers.
#[derive(Clone)]
pub struct ProviderServer {
    config: Arc<ServerConfig>,
    service: ServiceHandle,
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
    service_stop: Arc<AtomicBool>,
}

impl ProviderServer {
    /// Create a new provider server and start its service thread.
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let service_stop = Arc::new(AtomicBool::new(false));
        let service = spawn_service(&config, Arc::clone(&service_stop)).await?;

        Ok(Self {
            config: Arc::new(config),
            service,
            shutdown: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
            service_stop,
        })
    }

    /// Bind the configured address and run the server.
    pub async fn run(&self) -> Result<(), ServerError> {
        let addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;
        self.serve(listener).await
    }

    /// Accept connections on `listener` until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyRunning);
        }

        if let Ok(addr) = listener.local_addr() {
            info!("Provider server listening on {}", addr);
        }

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            info!("New connection from {}", peer_addr);

                            let conn = ClientConnection::new(
                                stream,
                                peer_addr,
                                self.config.max_message_size,
                            );
                            let service = self.service.clone();
                            let shutdown = self.shutdown.clone();

                            tokio::spawn(async move {
                                if let Err(e) = Self::handle_connection(conn, service, shutdown).await {
                                    warn!("Connection error from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.service_stop.store(true, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Handle a client connection.
    async fn handle_connection(
        conn: ClientConnection,
        service: ServiceHandle,
        shutdown: Arc<Notify>,
    ) -> Result<(), ServerError> {
        let peer_addr = conn.peer_addr();
        let (mut reader, mut writer) = conn.into_split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServiceMessage>();
        let client = service.attach(Box::new(ChannelSink(outbound_tx)));
        debug!("{} is {}", peer_addr, client);

        // Ends once the dispatcher drops the sink or the peer stops reading.
        let mut writer_task = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                if let Err(e) = writer.send_message(&msg).await {
                    warn!("Failed to send to {}: {}", peer_addr, e);
                    return;
                }
            }
            writer.shutdown().await.ok();
        });

        let result = loop {
            tokio::select! {
                result = reader.read_message() => {
                    match result {
                        Ok(Some(msg)) => {
                            if !service.deliver(client, msg) {
                                break Err(ServerError::ServiceStopped);
                            }
                        }
                        Ok(None) => {
                            info!("Connection closed: {}", peer_addr);
                            break Ok(());
                        }
                        Err(e) => break Err(e.into()),
                    }
                }
                _ = &mut writer_task => {
                    debug!("Writer for {} finished", peer_addr);
                    break Ok(());
                }
                _ = shutdown.notified() => {
                    debug!("Connection handler shutting down: {}", peer_addr);
                    break Ok(());
                }
            }
        };

        service.detach(client);
        result
    }

    /// Stop accepting connections and stop the service thread.
    pub async fn shutdown(&self) {
        self.shutdown.notify_waiters();
        self.service_stop.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Build the provider and its dispatcher on a dedicated thread.
async fn spawn_service(
    config: &ServerConfig,
    stop: Arc<AtomicBool>,
) -> Result<ServiceHandle, ServerError> {
    let config = config.clone();
    let (handle_tx, handle_rx) = oneshot::channel();

    std::thread::Builder::new()
        .name("mediaroute-service".into())
        .spawn(move || {
            let provider = build_provider(&config);
            let mut service = ProviderService::new(
                Box::new(provider),
                ServiceConfig {
                    max_clients: config.max_clients,
                },
            );
            if handle_tx.send(service.handle()).is_err() {
                return;
            }
            info!(
                "Serving {} route(s) as '{}'",
                config.routes.len(),
                config.identity
            );
            while !stop.load(Ordering::SeqCst) {
                service.run_once(SERVICE_POLL_INTERVAL);
            }
            service.shutdown();
            debug!("Service thread stopped");
        })?;

    handle_rx.await.map_err(|_| ServerError::ServiceStopped)
}

/// Routes dispatcher replies into a connection's writer task.
struct ChannelSink(mpsc::UnboundedSender<ServiceMessage>);

impl ClientSink for ChannelSink {
    fn send(&self, msg: ServiceMessage) -> bool {
        self.0.send(msg).is_ok()
    }
}

/// Server error types.
#[derive(Debug)]
pub enum ServerError {
    Config(String),
    Bind(String),
    AlreadyRunning,
    ServiceStopped,
    Io(String),
    Protocol(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(s) => write!(f, "Configuration error: {}", s),
            Self::Bind(s) => write!(f, "Bind error: {}", s),
            Self::AlreadyRunning => write!(f, "Server already running"),
            Self::ServiceStopped => write!(f, "Provider service stopped"),
            Self::Io(s) => write!(f, "I/O error: {}", s),
            Self::Protocol(s) => write!(f, "Protocol error: {}", s),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<connection::ConnectionError> for ServerError {
    fn from(e: connection::ConnectionError) -> Self {
        match e {
            connection::ConnectionError::Io(s) => Self::Io(s),
            connection::ConnectionError::Protocol(s) => Self::Protocol(s),
        }
    }
}

/// Address the server would bind for `config`.
pub fn bind_addr(config: &ServerConfig) -> SocketAddr {
    SocketAddr::new(config.bind_address, config.port)
}
