// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process transport.
//!
//! Connects proxies to [`ProviderService`](crate::service::ProviderService)
//! instances in the same process by endpoint name. Messages still go through
//! both sides' queues, so ordering and asynchrony match a real link.

use super::link::{ClientSink, LinkEvent, MessageLink, ServiceConnector};
use super::protocol::{ClientMessage, ServiceMessage};
use crate::error::LinkError;
use crate::runtime::LinkEventSender;
use crate::service::{ClientId, ServiceHandle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

struct LiveLink {
    id: u64,
    endpoint: String,
    client: ClientId,
    events: LinkEventSender,
    service: ServiceHandle,
}

#[derive(Default)]
struct Hub {
    endpoints: HashMap<String, ServiceHandle>,
    links: Vec<LiveLink>,
    next_id: u64,
}

/// Connector resolving endpoint names to in-process services.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    hub: Arc<Mutex<Hub>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `service` reachable under `endpoint`.
    pub fn register_endpoint(&self, endpoint: impl Into<String>, service: ServiceHandle) {
        self.hub.lock().endpoints.insert(endpoint.into(), service);
    }

    /// Make `endpoint` unreachable for future binds.
    pub fn remove_endpoint(&self, endpoint: &str) {
        self.hub.lock().endpoints.remove(endpoint);
    }

    /// Number of open links to `endpoint`.
    pub fn link_count(&self, endpoint: &str) -> usize {
        self.hub
            .lock()
            .links
            .iter()
            .filter(|l| l.endpoint == endpoint)
            .count()
    }

    /// Kill every link to `endpoint`, as if the service process died.
    ///
    /// Both sides observe link death: proxies get [`LinkEvent::Down`] and the
    /// service gets a detach.
    pub fn sever(&self, endpoint: &str) -> usize {
        let severed: Vec<LiveLink> = {
            let mut hub = self.hub.lock();
            let (gone, kept): (Vec<LiveLink>, Vec<LiveLink>) =
                hub.links.drain(..).partition(|l| l.endpoint == endpoint);
            hub.links = kept;
            gone
        };
        for link in &severed {
            debug!("Severing {} ({})", link.events.link_id(), link.client);
            link.service.detach(link.client);
            link.events.send(LinkEvent::Down);
        }
        severed.len()
    }
}

impl ServiceConnector for MemoryConnector {
    fn bind(&self, endpoint: &str, events: LinkEventSender) -> Result<(), LinkError> {
        let service = self.hub.lock().endpoints.get(endpoint).cloned();
        let Some(service) = service else {
            events.send(LinkEvent::BindFailed(format!("no endpoint {}", endpoint)));
            return Ok(());
        };
        let client = service.attach(Box::new(MemorySink {
            events: events.clone(),
        }));
        let id = {
            let mut hub = self.hub.lock();
            hub.next_id += 1;
            let id = hub.next_id;
            hub.links.push(LiveLink {
                id,
                endpoint: endpoint.to_string(),
                client,
                events: events.clone(),
                service: service.clone(),
            });
            id
        };
        events.send(LinkEvent::Connected(Box::new(MemoryLink {
            hub: Arc::clone(&self.hub),
            id,
            client,
            service,
            closed: false,
        })));
        Ok(())
    }
}

struct MemorySink {
    events: LinkEventSender,
}

impl ClientSink for MemorySink {
    fn send(&self, msg: ServiceMessage) -> bool {
        self.events.send(LinkEvent::Message(msg))
    }
}

struct MemoryLink {
    hub: Arc<Mutex<Hub>>,
    id: u64,
    client: ClientId,
    service: ServiceHandle,
    closed: bool,
}

impl MessageLink for MemoryLink {
    fn send(&mut self, msg: &ClientMessage) -> Result<(), LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }
        let alive = self.hub.lock().links.iter().any(|l| l.id == self.id);
        if !alive || !self.service.deliver(self.client, msg.clone()) {
            return Err(LinkError::Closed);
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let id = self.id;
        let was_live = {
            let mut hub = self.hub.lock();
            let before = hub.links.len();
            hub.links.retain(|l| l.id != id);
            hub.links.len() != before
        };
        if was_live {
            self.service.detach(self.client);
        }
    }
}

impl Drop for MemoryLink {
    fn drop(&mut self) {
        self.close();
    }
}
