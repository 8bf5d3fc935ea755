// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Provider serving the routes listed in the configuration.
//!
//! Controllers keep the route volume in the published descriptor, so every
//! client sees volume changes through `DESCRIPTOR_CHANGED`.

use crate::config::ServerConfig;
use mediaroute::descriptor::{
    ControlRequest, DiscoveryRequest, ProviderDescriptor, VolumeHandling,
};
use mediaroute::provider::{
    ControlRequestCallback, DescriptorPublisher, LocalProvider, LocalRouteHandler,
    ProviderMetadata, RouteController, UnselectReason,
};
use serde_json::json;
use tracing::{debug, info};

/// Build the provider for `config`.
pub fn build_provider(config: &ServerConfig) -> LocalProvider {
    let publisher = DescriptorPublisher::with_descriptor(config.descriptor());
    LocalProvider::new(
        ProviderMetadata::new(config.identity.clone()),
        publisher.clone(),
        Box::new(StaticRouteHandler { publisher }),
    )
}

struct StaticRouteHandler {
    publisher: DescriptorPublisher,
}

impl LocalRouteHandler for StaticRouteHandler {
    fn on_discovery_request_changed(&mut self, request: Option<&DiscoveryRequest>) {
        match request {
            Some(request) => info!(
                "Discovery request: active_scan={} selector={:?}",
                request.is_active_scan(),
                request.selector()
            ),
            None => info!("Discovery stopped"),
        }
    }

    fn create_route_controller(
        &mut self,
        route_id: &str,
        group_route_id: Option<&str>,
    ) -> Option<Box<dyn RouteController>> {
        let known = self
            .publisher
            .current()
            .is_some_and(|descriptor| descriptor.route(route_id).is_some());
        if !known {
            debug!("No route '{}' to control", route_id);
            return None;
        }
        Some(Box::new(StaticRouteController {
            route_id: route_id.to_string(),
            group_route_id: group_route_id.map(str::to_string),
            publisher: self.publisher.clone(),
        }))
    }
}

/// Controller for one configured route.
struct StaticRouteController {
    route_id: String,
    group_route_id: Option<String>,
    publisher: DescriptorPublisher,
}

impl StaticRouteController {
    fn label(&self) -> String {
        match &self.group_route_id {
            Some(group) => format!("{}/{}", group, self.route_id),
            None => self.route_id.clone(),
        }
    }

    /// Republish the descriptor with this route's volume set by `f`.
    fn change_volume(&self, f: impl FnOnce(i32) -> i32) {
        let Some(current) = self.publisher.current() else {
            return;
        };
        let Some(route) = current.route(&self.route_id) else {
            return;
        };
        if route.volume_handling() != VolumeHandling::Variable {
            debug!("Route '{}' has fixed volume", self.route_id);
            return;
        }
        let volume = f(route.volume()).clamp(0, route.volume_max());
        if volume == route.volume() {
            return;
        }

        let routes = current
            .routes()
            .iter()
            .map(|r| {
                if r.id() == self.route_id {
                    r.to_builder().volume(volume).build()
                } else {
                    r.clone()
                }
            })
            .collect();
        info!("Route '{}' volume -> {}", self.route_id, volume);
        self.publisher.publish(Some(ProviderDescriptor::new(routes)));
    }
}

impl RouteController for StaticRouteController {
    fn on_select(&mut self) {
        info!("Selected {}", self.label());
    }

    fn on_unselect(&mut self, reason: UnselectReason) {
        info!("Unselected {} ({})", self.label(), reason);
    }

    fn on_release(&mut self) {
        debug!("Released {}", self.label());
    }

    fn on_set_volume(&mut self, volume: i32) {
        self.change_volume(|_| volume);
    }

    fn on_update_volume(&mut self, delta: i32) {
        self.change_volume(|current| current.saturating_add(delta));
    }

    fn on_control_request(
        &mut self,
        request: &ControlRequest,
        callback: ControlRequestCallback,
    ) -> Result<(), ControlRequestCallback> {
        if request.action() != "ping" {
            return Err(callback);
        }
        let mut data = serde_json::Map::new();
        data.insert("pong".into(), json!(true));
        data.insert("route".into(), json!(self.route_id));
        callback.succeed(Some(data));
        Ok(())
    }
}
