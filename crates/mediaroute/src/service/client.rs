// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-client state held by the service dispatcher.

use super::ClientId;
use crate::descriptor::DiscoveryRequest;
use crate::provider::{MediaRouteProvider, RouteController};
use std::collections::HashMap;
use tracing::debug;

/// One registered client.
pub(crate) struct ClientRecord {
    id: ClientId,
    version: i32,
    discovery_request: Option<DiscoveryRequest>,
    controllers: HashMap<i32, Box<dyn RouteController>>,
}

impl ClientRecord {
    pub fn new(id: ClientId, version: i32) -> Self {
        Self {
            id,
            version,
            discovery_request: None,
            controllers: HashMap::new(),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn discovery_request(&self) -> Option<&DiscoveryRequest> {
        self.discovery_request.as_ref()
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    /// Create a controller under the client-chosen id.
    pub fn create_controller(
        &mut self,
        provider: &mut dyn MediaRouteProvider,
        controller_id: i32,
        route_id: &str,
        group_route_id: Option<&str>,
    ) -> bool {
        if self.controllers.contains_key(&controller_id) {
            debug!("{} reused controller id {}", self.id, controller_id);
            return false;
        }
        match provider.create_route_controller(route_id, group_route_id) {
            Some(controller) => {
                self.controllers.insert(controller_id, controller);
                true
            }
            None => false,
        }
    }

    pub fn release_controller(&mut self, controller_id: i32) -> bool {
        match self.controllers.remove(&controller_id) {
            Some(mut controller) => {
                controller.on_release();
                true
            }
            None => false,
        }
    }

    pub fn controller_mut(&mut self, controller_id: i32) -> Option<&mut Box<dyn RouteController>> {
        self.controllers.get_mut(&controller_id)
    }

    /// Replace this client's discovery request. Returns `true` on change.
    pub fn set_discovery_request(&mut self, request: Option<DiscoveryRequest>) -> bool {
        if self.discovery_request == request {
            return false;
        }
        self.discovery_request = request;
        true
    }

    /// Release every controller and drop the discovery request.
    pub fn dispose(&mut self) {
        for (_, mut controller) in self.controllers.drain() {
            controller.on_release();
        }
        self.discovery_request = None;
    }
}
