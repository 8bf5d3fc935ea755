// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use mediaroute::descriptor::{
    ControlFilter, ControlRequest, DiscoveryRequest, ProviderDescriptor, RouteDescriptor,
    CATEGORY_LIVE_AUDIO, CATEGORY_LIVE_VIDEO, CATEGORY_REMOTE_PLAYBACK, DEFAULT_ROUTE_ID,
};
use mediaroute::provider::{
    ControlRequestCallback, DescriptorPublisher, LocalProvider, LocalRouteHandler,
    ProviderMetadata, RouteController, UnselectReason,
};
use mediaroute::service::{ProviderService, ServiceConfig};
use mediaroute::{ProviderId, Registry, RouteInfo, RouterCallback};
use parking_lot::Mutex;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Append-only record shared between a test and the objects it observes.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }
}

/// Controller that journals every call and answers `ping`.
pub struct JournalController {
    name: String,
    journal: Journal,
}

impl RouteController for JournalController {
    fn on_select(&mut self) {
        self.journal.push(format!("{} select", self.name));
    }

    fn on_unselect(&mut self, reason: UnselectReason) {
        self.journal.push(format!("{} unselect {}", self.name, reason));
    }

    fn on_release(&mut self) {
        self.journal.push(format!("{} release", self.name));
    }

    fn on_set_volume(&mut self, volume: i32) {
        self.journal.push(format!("{} volume {}", self.name, volume));
    }

    fn on_update_volume(&mut self, delta: i32) {
        self.journal.push(format!("{} delta {}", self.name, delta));
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
        callback.succeed(Some(data));
        Ok(())
    }
}

pub struct JournalHandler {
    pub journal: Journal,
    pub requests: Arc<Mutex<Vec<Option<DiscoveryRequest>>>>,
}

impl LocalRouteHandler for JournalHandler {
    fn on_discovery_request_changed(&mut self, request: Option<&DiscoveryRequest>) {
        self.requests.lock().push(request.cloned());
    }

    fn create_route_controller(
        &mut self,
        route_id: &str,
        group_route_id: Option<&str>,
    ) -> Option<Box<dyn RouteController>> {
        let name = match group_route_id {
            Some(group) => format!("{}/{}", group, route_id),
            None => route_id.to_string(),
        };
        Some(Box::new(JournalController {
            name,
            journal: self.journal.clone(),
        }))
    }
}

/// An in-process provider plus the handles tests poke at.
pub struct LocalFixture {
    pub publisher: DescriptorPublisher,
    pub journal: Journal,
    pub requests: Arc<Mutex<Vec<Option<DiscoveryRequest>>>>,
}

impl LocalFixture {
    pub fn new(routes: Vec<RouteDescriptor>) -> Self {
        Self {
            publisher: DescriptorPublisher::with_descriptor(ProviderDescriptor::new(routes)),
            journal: Journal::default(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn provider(&self, metadata: ProviderMetadata) -> LocalProvider {
        LocalProvider::new(
            metadata,
            self.publisher.clone(),
            Box::new(JournalHandler {
                journal: self.journal.clone(),
                requests: Arc::clone(&self.requests),
            }),
        )
    }

    /// Add this provider to `registry` directly.
    pub fn add_to(&self, registry: &mut Registry, metadata: ProviderMetadata) -> ProviderId {
        registry.add_provider(Box::new(self.provider(metadata)))
    }

    /// Serve this provider through a dispatcher.
    pub fn serve(&self, identity: &str) -> ProviderService {
        ProviderService::new(
            Box::new(self.provider(ProviderMetadata::new(identity))),
            ServiceConfig::default(),
        )
    }
}

pub fn default_route() -> RouteDescriptor {
    RouteDescriptor::builder(DEFAULT_ROUTE_ID, "Phone")
        .add_control_filter(ControlFilter::new().with_category(CATEGORY_LIVE_AUDIO))
        .add_control_filter(ControlFilter::new().with_category(CATEGORY_LIVE_VIDEO))
        .volume_max(15)
        .build()
}

pub fn bluetooth_route() -> RouteDescriptor {
    RouteDescriptor::builder("bt", "Headset")
        .add_control_filter(ControlFilter::new().with_category(CATEGORY_LIVE_AUDIO))
        .build()
}

pub fn remote_route(id: &str, name: &str) -> RouteDescriptor {
    RouteDescriptor::builder(id, name)
        .add_control_filter(
            ControlFilter::new()
                .with_category(CATEGORY_REMOTE_PLAYBACK)
                .with_action("ping"),
        )
        .volume_max(20)
        .build()
}

/// Route events recorded as strings, in delivery order.
pub struct EventLog(pub Rc<RefCell<Vec<String>>>);

impl RouterCallback for EventLog {
    fn on_route_added(&mut self, _: &Registry, route: &RouteInfo) {
        self.0.borrow_mut().push(format!("added {}", route.unique_id()));
    }

    fn on_route_removed(&mut self, _: &Registry, route: &RouteInfo) {
        self.0.borrow_mut().push(format!("removed {}", route.unique_id()));
    }

    fn on_route_changed(&mut self, _: &Registry, route: &RouteInfo) {
        self.0.borrow_mut().push(format!("changed {}", route.unique_id()));
    }

    fn on_route_selected(&mut self, _: &Registry, route: &RouteInfo) {
        self.0.borrow_mut().push(format!("selected {}", route.unique_id()));
    }

    fn on_route_unselected(&mut self, _: &Registry, route: &RouteInfo, reason: UnselectReason) {
        self.0
            .borrow_mut()
            .push(format!("unselected {} {}", route.unique_id(), reason));
    }
}

/// Drive the registry and the services until both queues are quiet.
pub fn pump(registry: &mut Registry, services: &mut [&mut ProviderService]) {
    for _ in 0..100 {
        let mut handled = registry.process_pending();
        for service in services.iter_mut() {
            handled += service.process_pending();
        }
        if handled == 0 {
            return;
        }
    }
}

/// Pump until `done` holds or `timeout` elapses; timers get a chance to fire.
pub fn pump_until<F>(
    registry: &mut Registry,
    services: &mut [&mut ProviderService],
    timeout: Duration,
    mut done: F,
) -> bool
where
    F: FnMut(&Registry) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        pump(registry, services);
        if done(registry) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        registry.run_once(Duration::from_millis(5));
    }
}
