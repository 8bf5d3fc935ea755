// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process providers.

use super::{DescriptorListener, MediaRouteProvider, ProviderMetadata, RouteController};
use crate::descriptor::{DiscoveryRequest, ProviderDescriptor};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct PublisherState {
    descriptor: Option<Arc<ProviderDescriptor>>,
    listener: Option<DescriptorListener>,
}

/// Thread-safe holder of a provider's current descriptor.
///
/// Device-discovery code publishes from whatever thread it runs on; the
/// listener is notified outside the lock.
#[derive(Clone, Default)]
pub struct DescriptorPublisher {
    state: Arc<Mutex<PublisherState>>,
}

impl DescriptorPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publisher seeded with an initial descriptor.
    pub fn with_descriptor(descriptor: ProviderDescriptor) -> Self {
        let publisher = Self::new();
        publisher.state.lock().descriptor = Some(Arc::new(descriptor));
        publisher
    }

    /// Replace the published descriptor. Returns `false` if unchanged.
    pub fn publish(&self, descriptor: Option<ProviderDescriptor>) -> bool {
        let listener = {
            let mut state = self.state.lock();
            if state.descriptor.as_deref() == descriptor.as_ref() {
                return false;
            }
            state.descriptor = descriptor.map(Arc::new);
            state.listener.clone()
        };
        if let Some(listener) = listener {
            listener.notify();
        }
        true
    }

    pub fn current(&self) -> Option<Arc<ProviderDescriptor>> {
        self.state.lock().descriptor.clone()
    }

    fn set_listener(&self, listener: Option<DescriptorListener>) {
        self.state.lock().listener = listener;
    }
}

/// Behavior plugged into a [`LocalProvider`].
pub trait LocalRouteHandler {
    /// Called when the composite discovery request changes.
    fn on_discovery_request_changed(&mut self, _request: Option<&DiscoveryRequest>) {}

    fn create_route_controller(
        &mut self,
        route_id: &str,
        group_route_id: Option<&str>,
    ) -> Option<Box<dyn RouteController>>;
}

/// Provider living in the same process as its consumer.
pub struct LocalProvider {
    metadata: ProviderMetadata,
    publisher: DescriptorPublisher,
    handler: Box<dyn LocalRouteHandler>,
    discovery_request: Option<DiscoveryRequest>,
}

impl LocalProvider {
    pub fn new(
        metadata: ProviderMetadata,
        publisher: DescriptorPublisher,
        handler: Box<dyn LocalRouteHandler>,
    ) -> Self {
        Self {
            metadata,
            publisher,
            handler,
            discovery_request: None,
        }
    }

    pub fn publisher(&self) -> &DescriptorPublisher {
        &self.publisher
    }

    pub fn discovery_request(&self) -> Option<&DiscoveryRequest> {
        self.discovery_request.as_ref()
    }
}

impl MediaRouteProvider for LocalProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    fn descriptor(&self) -> Option<Arc<ProviderDescriptor>> {
        self.publisher.current()
    }

    fn set_descriptor_listener(&mut self, listener: Option<DescriptorListener>) {
        self.publisher.set_listener(listener);
    }

    fn set_discovery_request(&mut self, request: Option<&DiscoveryRequest>) {
        if self.discovery_request.as_ref() == request {
            return;
        }
        debug!(
            "Provider {} discovery request: {:?}",
            self.metadata.identity(),
            request
        );
        self.discovery_request = request.cloned();
        self.handler.on_discovery_request_changed(request);
    }

    fn create_route_controller(
        &mut self,
        route_id: &str,
        group_route_id: Option<&str>,
    ) -> Option<Box<dyn RouteController>> {
        self.handler.create_route_controller(route_id, group_route_id)
    }
}
