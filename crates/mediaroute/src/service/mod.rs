// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Provider-side service dispatcher.
//!
//! Serves one local provider to any number of clients. Each client registers
//! with a protocol version and receives the descriptor filtered to the routes
//! whose version window includes that version. Client discovery requests are
//! merged into one composite request forwarded to the provider; controllers
//! are looked up per (client, controller id).
//!
//! Transports feed the dispatcher through a [`ServiceHandle`] from any thread;
//! the dispatcher itself runs on a single thread and drains its queue in
//! [`ProviderService::process_pending`] or [`ProviderService::run_once`].

mod client;

use crate::descriptor::{DiscoveryRequest, ProviderDescriptor, RouteSelector};
use crate::provider::{
    ControlRequestCallback, ControlResult, DescriptorListener, MediaRouteProvider, UnselectReason,
};
use crate::remote::link::ClientSink;
use crate::remote::protocol::{
    ClientMessage, ClientOp, ServiceMessage, ServiceOp, CLIENT_VERSION_1, CLIENT_VERSION_2,
    SERVICE_VERSION_CURRENT,
};
use client::ClientRecord;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Identifier of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// REGISTER fails once this many clients are registered.
    pub max_clients: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { max_clients: 64 }
    }
}

pub(crate) enum ServiceEvent {
    Attach {
        client: ClientId,
        sink: Box<dyn ClientSink>,
    },
    Message {
        client: ClientId,
        msg: ClientMessage,
    },
    Detach {
        client: ClientId,
    },
    DescriptorChanged,
    ControlResult {
        client: ClientId,
        request_id: u32,
        result: ControlResult,
    },
}

/// Thread-safe entry point for transports.
#[derive(Clone)]
pub struct ServiceHandle {
    tx: Sender<ServiceEvent>,
    next_client: Arc<AtomicU64>,
}

impl ServiceHandle {
    /// Announce a new connection whose replies go to `sink`.
    pub fn attach(&self, sink: Box<dyn ClientSink>) -> ClientId {
        let client = ClientId(self.next_client.fetch_add(1, Ordering::Relaxed) + 1);
        let _ = self.tx.send(ServiceEvent::Attach { client, sink });
        client
    }

    /// Deliver an inbound message. Returns `false` if the dispatcher is gone.
    pub fn deliver(&self, client: ClientId, msg: ClientMessage) -> bool {
        self.tx.send(ServiceEvent::Message { client, msg }).is_ok()
    }

    /// Report that the connection died or was closed.
    pub fn detach(&self, client: ClientId) -> bool {
        self.tx.send(ServiceEvent::Detach { client }).is_ok()
    }
}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServiceHandle")
    }
}

/// Dispatcher serving one provider to many clients.
pub struct ProviderService {
    provider: Box<dyn MediaRouteProvider>,
    config: ServiceConfig,
    tx: Sender<ServiceEvent>,
    rx: Receiver<ServiceEvent>,
    next_client: Arc<AtomicU64>,
    connections: HashMap<ClientId, Box<dyn ClientSink>>,
    clients: Vec<ClientRecord>,
    composite: Option<DiscoveryRequest>,
}

impl ProviderService {
    pub fn new(mut provider: Box<dyn MediaRouteProvider>, config: ServiceConfig) -> Self {
        let (tx, rx) = channel::unbounded();
        let notify = tx.clone();
        provider.set_descriptor_listener(Some(DescriptorListener::new(move || {
            let _ = notify.send(ServiceEvent::DescriptorChanged);
        })));
        info!(
            "Serving provider {} (max {} clients)",
            provider.metadata().identity(),
            config.max_clients
        );
        Self {
            provider,
            config,
            tx,
            rx,
            next_client: Arc::new(AtomicU64::new(0)),
            connections: HashMap::new(),
            clients: Vec::new(),
            composite: None,
        }
    }

    pub fn handle(&self) -> ServiceHandle {
        ServiceHandle {
            tx: self.tx.clone(),
            next_client: Arc::clone(&self.next_client),
        }
    }

    pub fn provider(&self) -> &dyn MediaRouteProvider {
        self.provider.as_ref()
    }

    /// Number of registered clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn is_registered(&self, client: ClientId) -> bool {
        self.find_client(client).is_some()
    }

    /// Live controllers held for `client`.
    pub fn controller_count(&self, client: ClientId) -> usize {
        self.find_client(client)
            .map_or(0, |i| self.clients[i].controller_count())
    }

    /// Union of all clients' discovery requests, `None` when idle.
    pub fn composite_request(&self) -> Option<&DiscoveryRequest> {
        self.composite.as_ref()
    }

    /// Drain queued events without blocking.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for one event, then drain the queue.
    pub fn run_once(&mut self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => {
                self.handle_event(event);
                1 + self.process_pending()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Dispose every client and stop discovery.
    pub fn shutdown(&mut self) {
        for mut record in self.clients.drain(..) {
            record.dispose();
        }
        self.connections.clear();
        self.update_composite_discovery_request();
        self.provider.set_descriptor_listener(None);
    }

    fn handle_event(&mut self, event: ServiceEvent) {
        match event {
            ServiceEvent::Attach { client, sink } => {
                debug!("{} attached", client);
                self.connections.insert(client, sink);
            }
            ServiceEvent::Message { client, msg } => {
                let request_id = msg.request_id;
                let op = msg.op.name();
                if !self.process_message(client, msg) {
                    debug!("{} {} req={} failed", client, op, request_id);
                    if request_id != 0 {
                        self.send(client, ServiceMessage::generic_failure(request_id));
                    }
                }
            }
            ServiceEvent::Detach { client } => {
                self.connections.remove(&client);
                if let Some(index) = self.find_client(client) {
                    info!("{} died", client);
                    self.dispose_client(index);
                }
            }
            ServiceEvent::DescriptorChanged => self.broadcast_descriptor(),
            ServiceEvent::ControlResult {
                client,
                request_id,
                result,
            } => self.deliver_control_result(client, request_id, result),
        }
    }

    fn process_message(&mut self, client: ClientId, msg: ClientMessage) -> bool {
        trace!("{} <- {} req={} arg={}", client, msg.op.name(), msg.request_id, msg.arg);
        let ClientMessage {
            request_id,
            arg,
            op,
        } = msg;

        if let ClientOp::Register = op {
            return self.register_client(client, request_id, arg);
        }
        let Some(index) = self.find_client(client) else {
            debug!("{} not registered", client);
            return false;
        };

        match op {
            ClientOp::Register => false,
            ClientOp::Unregister => {
                info!("{} unregistered", client);
                self.dispose_client(index);
                self.reply_success(client, request_id);
                true
            }
            ClientOp::CreateController {
                route_id,
                group_route_id,
            } => {
                if route_id.is_empty() {
                    return false;
                }
                let record = &mut self.clients[index];
                let group = if record.version() >= CLIENT_VERSION_2 {
                    group_route_id
                } else {
                    None
                };
                if !record.create_controller(
                    self.provider.as_mut(),
                    arg,
                    &route_id,
                    group.as_deref(),
                ) {
                    return false;
                }
                self.reply_success(client, request_id);
                true
            }
            ClientOp::ReleaseController => {
                if !self.clients[index].release_controller(arg) {
                    return false;
                }
                self.reply_success(client, request_id);
                true
            }
            ClientOp::Select => {
                let Some(controller) = self.clients[index].controller_mut(arg) else {
                    return false;
                };
                controller.on_select();
                self.reply_success(client, request_id);
                true
            }
            ClientOp::Unselect { reason } => {
                let Ok(reason) = UnselectReason::try_from(reason) else {
                    warn!("{} sent invalid unselect reason {}", client, reason);
                    return false;
                };
                let Some(controller) = self.clients[index].controller_mut(arg) else {
                    return false;
                };
                controller.on_unselect(reason);
                self.reply_success(client, request_id);
                true
            }
            ClientOp::SetVolume { volume } => {
                if volume < 0 {
                    return false;
                }
                let Some(controller) = self.clients[index].controller_mut(arg) else {
                    return false;
                };
                controller.on_set_volume(volume);
                self.reply_success(client, request_id);
                true
            }
            ClientOp::UpdateVolume { delta } => {
                if delta == 0 {
                    return false;
                }
                let Some(controller) = self.clients[index].controller_mut(arg) else {
                    return false;
                };
                controller.on_update_volume(delta);
                self.reply_success(client, request_id);
                true
            }
            ClientOp::ControlRequest { request } => {
                let tx = self.tx.clone();
                let callback = ControlRequestCallback::new(move |result| {
                    let _ = tx.send(ServiceEvent::ControlResult {
                        client,
                        request_id,
                        result,
                    });
                });
                let Some(controller) = self.clients[index].controller_mut(arg) else {
                    return false;
                };
                // Accepted requests are answered by SUCCEEDED / FAILED only.
                controller.on_control_request(&request, callback).is_ok()
            }
            ClientOp::SetDiscoveryRequest { request } => {
                let request = match request.as_ref().map(DiscoveryRequest::from_bundle).transpose() {
                    Ok(request) => request,
                    Err(e) => {
                        warn!("{} sent malformed discovery request: {}", client, e);
                        return false;
                    }
                };
                if request.as_ref().is_some_and(|r| !r.is_valid()) {
                    return false;
                }
                if self.clients[index].set_discovery_request(request) {
                    self.update_composite_discovery_request();
                }
                self.reply_success(client, request_id);
                true
            }
        }
    }

    fn register_client(&mut self, client: ClientId, request_id: u32, version: i32) -> bool {
        if version < CLIENT_VERSION_1 {
            warn!("{} requested unsupported version {}", client, version);
            return false;
        }
        if self.find_client(client).is_some() {
            debug!("{} already registered", client);
            return false;
        }
        if !self.connections.contains_key(&client) {
            return false;
        }
        if self.clients.len() >= self.config.max_clients {
            warn!("{} rejected: {} clients registered", client, self.clients.len());
            return false;
        }
        info!("{} registered (version {})", client, version);
        self.clients.push(ClientRecord::new(client, version));
        if request_id != 0 {
            let descriptor = self.descriptor_bundle(version);
            self.send(
                client,
                ServiceMessage {
                    request_id,
                    arg: 0,
                    op: ServiceOp::Registered {
                        service_version: SERVICE_VERSION_CURRENT,
                        descriptor,
                    },
                },
            );
        }
        true
    }

    fn dispose_client(&mut self, index: usize) {
        let mut record = self.clients.remove(index);
        record.dispose();
        self.update_composite_discovery_request();
    }

    fn find_client(&self, client: ClientId) -> Option<usize> {
        self.clients.iter().position(|r| r.id() == client)
    }

    fn send(&self, client: ClientId, msg: ServiceMessage) {
        match self.connections.get(&client) {
            Some(sink) => {
                if !sink.send(msg) {
                    debug!("{} sink closed", client);
                }
            }
            None => debug!("{} has no connection", client),
        }
    }

    fn reply_success(&self, client: ClientId, request_id: u32) {
        if request_id != 0 {
            self.send(client, ServiceMessage::generic_success(request_id));
        }
    }

    fn descriptor_bundle(&self, version: i32) -> Option<serde_json::Value> {
        let descriptor = self.provider.descriptor()?;
        filtered_bundle(&descriptor, version)
    }

    fn broadcast_descriptor(&self) {
        let descriptor = self.provider.descriptor();
        debug!("Broadcasting descriptor to {} clients", self.clients.len());
        for record in &self.clients {
            let bundle = descriptor
                .as_ref()
                .and_then(|d| filtered_bundle(d, record.version()));
            self.send(
                record.id(),
                ServiceMessage {
                    request_id: 0,
                    arg: 0,
                    op: ServiceOp::DescriptorChanged { descriptor: bundle },
                },
            );
        }
    }

    fn deliver_control_result(&self, client: ClientId, request_id: u32, result: ControlResult) {
        if request_id == 0 {
            return;
        }
        if self.find_client(client).is_none() {
            debug!("{} gone, dropping control result {}", client, request_id);
            return;
        }
        let op = match result {
            Ok(data) => ServiceOp::ControlRequestSucceeded { data },
            Err(e) => ServiceOp::ControlRequestFailed {
                error: e.message,
                data: e.data,
            },
        };
        self.send(
            client,
            ServiceMessage {
                request_id,
                arg: 0,
                op,
            },
        );
    }

    fn update_composite_discovery_request(&mut self) {
        let mut composite: Option<DiscoveryRequest> = None;
        let mut merged = false;
        let mut active_scan = false;
        let mut selector = RouteSelector::builder();

        for record in &self.clients {
            let Some(request) = record.discovery_request() else {
                continue;
            };
            if request.selector().is_empty() && !request.is_active_scan() {
                continue;
            }
            active_scan |= request.is_active_scan();
            match &composite {
                None => {
                    selector = selector.add_selector(request.selector());
                    composite = Some(request.clone());
                }
                Some(_) => {
                    selector = selector.add_selector(request.selector());
                    merged = true;
                }
            }
        }
        if merged {
            composite = Some(DiscoveryRequest::new(selector.build(), active_scan));
        }

        if self.composite != composite {
            debug!("Composite discovery request: {:?}", composite);
            self.composite = composite;
            self.provider.set_discovery_request(self.composite.as_ref());
        }
    }
}

fn filtered_bundle(descriptor: &ProviderDescriptor, version: i32) -> Option<serde_json::Value> {
    match descriptor.for_client_version(version).as_bundle() {
        Ok(bundle) => Some(bundle),
        Err(e) => {
            warn!("Cannot encode provider descriptor: {}", e);
            None
        }
    }
}

impl fmt::Debug for ProviderService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderService")
            .field("provider", &self.provider.metadata().identity())
            .field("clients", &self.clients.len())
            .field("composite", &self.composite)
            .finish()
    }
}
