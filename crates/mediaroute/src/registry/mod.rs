// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Route registry.
//!
//! Tracks every provider and the routes they publish, assigns globally unique
//! route ids, keeps the default, bluetooth and selected routes consistent as
//! descriptors change, and aggregates the callbacks' discovery needs into a
//! single request pushed to every provider.
//!
//! The registry is the single owner of its state and lives on the control
//! thread. Providers report changes through [`DescriptorListener`]s that post
//! onto the control queue; the registry applies them in
//! [`Registry::process_pending`] / [`Registry::run_once`]. Events are queued
//! while an operation runs and delivered to callbacks once it has finished.

mod callback;
mod discovery;
mod ingest;
mod provider_info;
mod route_info;
mod selection;
mod unique_id;

pub use callback::{
    AvailabilityFlags, CallbackFlags, CallbackId, RouterCallback, RouterId,
};
pub use route_info::{ChangeFlags, RouteInfo};

use crate::config::RouterConfig;
use crate::descriptor::{
    ControlRequest, DiscoveryRequest, PlaybackType, RouteSelector, VolumeHandling,
};
use crate::error::{Result, RouterError};
use crate::provider::{
    ControlRequestCallback, ControlRequestError, DescriptorListener, MediaRouteProvider,
    ProviderMetadata, RouteController, UnselectReason,
};
use crate::runtime::{ControlContext, ControlHandle, ControlMessage};
use callback::{CallbackRecord, RouterEvent, RouterRecord, Routers};
use provider_info::ProviderInfo;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use unique_id::UniqueIdTable;

/// Handle of a provider added to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(pub(crate) u64);

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provider#{}", self.0)
    }
}

/// Playback parameters of the selected route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackInfo {
    pub playback_type: PlaybackType,
    pub playback_stream: i32,
    pub volume: i32,
    pub volume_max: i32,
    pub volume_handling: VolumeHandling,
}

/// Registry of providers, routes and router callbacks.
pub struct Registry {
    ctx: ControlContext,
    config: RouterConfig,
    providers: Vec<ProviderInfo>,
    next_provider: u64,
    routes: HashMap<String, RouteInfo>,
    route_order: Vec<String>,
    unique_ids: UniqueIdTable,
    routers: Routers,
    next_router: u64,
    next_callback: u64,
    discovery_request: Option<DiscoveryRequest>,
    default_route: Option<String>,
    bluetooth_route: Option<String>,
    selected_route: Option<String>,
    selected_controller: Option<Box<dyn RouteController>>,
    member_controllers: BTreeMap<String, Box<dyn RouteController>>,
    playback_info: Option<PlaybackInfo>,
    pending_events: Vec<RouterEvent>,
}

impl Registry {
    pub fn new(config: RouterConfig) -> Self {
        let unique_ids = UniqueIdTable::new(config.max_unique_id_suffix);
        Self {
            ctx: ControlContext::new(),
            config,
            providers: Vec::new(),
            next_provider: 0,
            routes: HashMap::new(),
            route_order: Vec::new(),
            unique_ids,
            routers: BTreeMap::new(),
            next_router: 0,
            next_callback: 0,
            discovery_request: None,
            default_route: None,
            bluetooth_route: None,
            selected_route: None,
            selected_controller: None,
            member_controllers: BTreeMap::new(),
            playback_info: None,
            pending_events: Vec::new(),
        }
    }

    /// Control context shared with remote proxies created for this registry.
    pub fn context(&self) -> &ControlContext {
        &self.ctx
    }

    /// Cross-thread entry point onto the control thread.
    pub fn handle(&self) -> ControlHandle {
        self.ctx.handle()
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    // ----------------------------------------------------------------------
    // Control loop
    // ----------------------------------------------------------------------

    /// Apply everything already queued and run due timers, without blocking.
    ///
    /// Returns the number of messages and timers handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = self.run_timers();
        while let Some(msg) = self.ctx.try_recv() {
            self.handle_message(msg);
            handled += 1;
            handled += self.run_timers();
        }
        handled
    }

    /// Wait up to `timeout` for work, then drain the queue.
    pub fn run_once(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut handled = self.process_pending();
        if handled > 0 {
            return handled;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if let Some(msg) = self.ctx.wait(remaining) {
            self.handle_message(msg);
            handled += 1;
        }
        handled + self.process_pending()
    }

    fn run_timers(&mut self) -> usize {
        let ran = self.ctx.run_due_timers();
        if ran > 0 {
            // Timer tasks only touch proxies; their descriptor notices arrive
            // through the queue.
            self.dispatch_events();
        }
        ran
    }

    fn handle_message(&mut self, msg: ControlMessage) {
        match msg {
            ControlMessage::ProviderChanged(id) => {
                if let Some(index) = self.provider_index(id) {
                    let descriptor = self.providers[index].provider.descriptor();
                    self.update_provider_contents(index, descriptor);
                } else {
                    debug!("Ignoring change notice from removed {}", id);
                }
            }
            ControlMessage::Link { link, event } => self.ctx.dispatch_link_event(link, event),
            ControlMessage::Command(command) => command(self),
        }
        self.dispatch_events();
    }

    /// Deliver queued events to the callbacks.
    fn dispatch_events(&mut self) {
        while !self.pending_events.is_empty() {
            let events = std::mem::take(&mut self.pending_events);
            let mut routers = std::mem::take(&mut self.routers);
            callback::dispatch(&mut routers, self, &events);
            self.routers = routers;
        }
    }

    pub(crate) fn push_event(&mut self, event: RouterEvent) {
        self.pending_events.push(event);
    }

    // ----------------------------------------------------------------------
    // Providers
    // ----------------------------------------------------------------------

    /// Add a provider and ingest its current descriptor.
    pub fn add_provider(&mut self, provider: Box<dyn MediaRouteProvider>) -> ProviderId {
        self.next_provider += 1;
        let id = ProviderId(self.next_provider);
        let info = ProviderInfo::new(id, provider);
        info!(
            "Provider added: {} ({}{})",
            info.metadata.identity(),
            id,
            if info.metadata.is_system() { ", system" } else { "" }
        );
        let metadata = info.metadata.clone();
        self.providers.push(info);
        self.push_event(RouterEvent::ProviderAdded(id, metadata));

        let index = self.providers.len() - 1;
        let descriptor = self.providers[index].provider.descriptor();
        self.update_provider_contents(index, descriptor);

        let handle = self.ctx.handle();
        let listener = DescriptorListener::new(move || {
            handle.notify_provider_changed(id);
        });
        let request = self.discovery_request.clone();
        let provider = &mut self.providers[index].provider;
        provider.set_descriptor_listener(Some(listener));
        provider.set_discovery_request(request.as_ref());

        self.dispatch_events();
        id
    }

    /// Remove a provider; its routes are torn down and the provider returned.
    pub fn remove_provider(&mut self, id: ProviderId) -> Result<Box<dyn MediaRouteProvider>> {
        let index = self
            .provider_index(id)
            .ok_or(RouterError::UnknownProvider(id.0))?;
        {
            let provider = &mut self.providers[index].provider;
            provider.set_descriptor_listener(None);
            provider.set_discovery_request(None);
        }
        self.update_provider_contents(index, None);

        let info = self.providers.remove(index);
        info!("Provider removed: {} ({})", info.metadata.identity(), id);
        self.push_event(RouterEvent::ProviderRemoved(id, info.metadata));
        self.dispatch_events();
        Ok(info.provider)
    }

    pub fn providers(&self) -> Vec<(ProviderId, &ProviderMetadata)> {
        self.providers.iter().map(|p| (p.id, &p.metadata)).collect()
    }

    pub fn provider_metadata(&self, id: ProviderId) -> Option<&ProviderMetadata> {
        self.provider_index(id).map(|i| &self.providers[i].metadata)
    }

    /// Metadata of the provider that published `route`.
    pub fn provider_of_route(&self, route: &RouteInfo) -> Option<&ProviderMetadata> {
        self.provider_metadata(route.provider())
    }

    /// Live routes of one provider, in its published order.
    pub fn provider_routes(&self, id: ProviderId) -> Vec<&RouteInfo> {
        self.provider_index(id)
            .map(|i| {
                self.providers[i]
                    .routes
                    .iter()
                    .filter_map(|slot| self.routes.get(&slot.unique_id))
                    .filter(|r| r.is_live())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn provider_index(&self, id: ProviderId) -> Option<usize> {
        self.providers.iter().position(|p| p.id == id)
    }

    // ----------------------------------------------------------------------
    // Routers and callbacks
    // ----------------------------------------------------------------------

    pub fn create_router(&mut self) -> RouterId {
        self.next_router += 1;
        let id = RouterId(self.next_router);
        self.routers.insert(id, RouterRecord::default());
        debug!("Created {}", id);
        id
    }

    /// Drop a router and all of its callbacks.
    pub fn destroy_router(&mut self, router: RouterId) -> Result<()> {
        self.routers
            .remove(&router)
            .ok_or(RouterError::UnknownRouter(router.0))?;
        debug!("Destroyed {}", router);
        self.update_discovery_request();
        self.dispatch_events();
        Ok(())
    }

    /// Register `callback` for routes matching `selector`.
    pub fn add_callback(
        &mut self,
        router: RouterId,
        selector: RouteSelector,
        flags: CallbackFlags,
        callback: Box<dyn RouterCallback>,
    ) -> Result<CallbackId> {
        if !selector.is_valid() {
            return Err(RouterError::InvalidSelector(format!("{:?}", selector)));
        }
        self.next_callback += 1;
        let id = CallbackId(self.next_callback);
        self.routers
            .get_mut(&router)
            .ok_or(RouterError::UnknownRouter(router.0))?
            .callbacks
            .push(CallbackRecord {
                id,
                selector,
                flags,
                callback,
            });
        debug!("{}: added callback {:?} flags={:?}", router, id, flags);
        self.update_discovery_request();
        self.dispatch_events();
        Ok(id)
    }

    /// Widen a registration's selector and replace its flags.
    pub fn update_callback(
        &mut self,
        router: RouterId,
        callback: CallbackId,
        selector: &RouteSelector,
        flags: CallbackFlags,
    ) -> Result<()> {
        let record = self
            .routers
            .get_mut(&router)
            .ok_or(RouterError::UnknownRouter(router.0))?
            .callbacks
            .iter_mut()
            .find(|r| r.id == callback)
            .ok_or(RouterError::UnknownCallback(callback.0))?;
        let mut changed = false;
        if record.flags != flags {
            record.flags = flags;
            changed = true;
        }
        if !record.selector.contains(selector) {
            record.selector = RouteSelector::builder()
                .add_selector(&record.selector)
                .add_selector(selector)
                .build();
            changed = true;
        }
        if changed {
            self.update_discovery_request();
            self.dispatch_events();
        }
        Ok(())
    }

    pub fn remove_callback(
        &mut self,
        router: RouterId,
        callback: CallbackId,
    ) -> Result<Box<dyn RouterCallback>> {
        let callbacks = &mut self
            .routers
            .get_mut(&router)
            .ok_or(RouterError::UnknownRouter(router.0))?
            .callbacks;
        let pos = callbacks
            .iter()
            .position(|r| r.id == callback)
            .ok_or(RouterError::UnknownCallback(callback.0))?;
        let record = callbacks.remove(pos);
        self.update_discovery_request();
        self.dispatch_events();
        Ok(record.callback)
    }

    // ----------------------------------------------------------------------
    // Route queries
    // ----------------------------------------------------------------------

    /// Live routes in the order they were first published.
    pub fn routes(&self) -> Vec<&RouteInfo> {
        self.route_order
            .iter()
            .filter_map(|id| self.routes.get(id))
            .filter(|r| r.is_live())
            .collect()
    }

    /// Live route by unique id.
    pub fn route(&self, unique_id: &str) -> Option<&RouteInfo> {
        self.routes.get(unique_id).filter(|r| r.is_live())
    }

    pub fn default_route(&self) -> Result<&RouteInfo> {
        self.default_route
            .as_deref()
            .and_then(|id| self.routes.get(id))
            .ok_or(RouterError::NotReady)
    }

    pub fn bluetooth_route(&self) -> Option<&RouteInfo> {
        self.bluetooth_route
            .as_deref()
            .and_then(|id| self.routes.get(id))
    }

    pub fn selected_route(&self) -> Result<&RouteInfo> {
        self.selected_route
            .as_deref()
            .and_then(|id| self.routes.get(id))
            .ok_or(RouterError::NotReady)
    }

    pub fn is_default_or_bluetooth(&self, route: &RouteInfo) -> bool {
        let id = Some(route.unique_id());
        self.default_route.as_deref() == id || self.bluetooth_route.as_deref() == id
    }

    /// Composite discovery request currently pushed to providers.
    pub fn discovery_request(&self) -> Option<&DiscoveryRequest> {
        self.discovery_request.as_ref()
    }

    pub fn playback_info(&self) -> Option<&PlaybackInfo> {
        self.playback_info.as_ref()
    }

    fn live_route(&self, unique_id: &str) -> Result<&RouteInfo> {
        self.route(unique_id)
            .ok_or_else(|| RouterError::UntrackedRoute(unique_id.to_string()))
    }

    // ----------------------------------------------------------------------
    // Volume and control requests
    // ----------------------------------------------------------------------

    fn controller_for(&mut self, unique_id: &str) -> Option<&mut Box<dyn RouteController>> {
        if self.selected_route.as_deref() == Some(unique_id) {
            if let Some(controller) = self.selected_controller.as_mut() {
                return Some(controller);
            }
        }
        self.member_controllers.get_mut(unique_id)
    }

    /// Ask the route's controller to set an absolute volume, clamped to the
    /// route's range.
    pub fn request_set_volume(&mut self, unique_id: &str, volume: i32) -> Result<()> {
        let max = self.live_route(unique_id)?.volume_max().max(0);
        let volume = volume.clamp(0, max);
        match self.controller_for(unique_id) {
            Some(controller) => controller.on_set_volume(volume),
            None => debug!("No controller for {}, dropping volume request", unique_id),
        }
        Ok(())
    }

    /// Ask the route's controller to adjust its volume by `delta`.
    pub fn request_update_volume(&mut self, unique_id: &str, delta: i32) -> Result<()> {
        self.live_route(unique_id)?;
        if delta == 0 {
            return Ok(());
        }
        match self.controller_for(unique_id) {
            Some(controller) => controller.on_update_volume(delta),
            None => debug!("No controller for {}, dropping volume request", unique_id),
        }
        Ok(())
    }

    /// Send a control request to the route's controller.
    ///
    /// Routes without an active controller, and controllers that decline the
    /// request, fail `callback` with no message.
    pub fn send_control_request(
        &mut self,
        unique_id: &str,
        request: &ControlRequest,
        callback: ControlRequestCallback,
    ) -> Result<()> {
        self.live_route(unique_id)?;
        let rejected = match self.controller_for(unique_id) {
            Some(controller) => controller.on_control_request(request, callback).err(),
            None => Some(callback),
        };
        if let Some(callback) = rejected {
            debug!("Control request {} rejected by {}", request.action(), unique_id);
            callback.fail(ControlRequestError::unknown());
        }
        Ok(())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        if let Some(mut controller) = self.selected_controller.take() {
            controller.on_unselect(UnselectReason::Unknown);
            controller.on_release();
        }
        for (_, mut controller) in std::mem::take(&mut self.member_controllers) {
            controller.on_unselect(UnselectReason::Unknown);
            controller.on_release();
        }
        for info in &mut self.providers {
            info.provider.set_descriptor_listener(None);
        }
        if !self.pending_events.is_empty() {
            warn!("Dropping {} undelivered router events", self.pending_events.len());
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("providers", &self.providers.len())
            .field("routes", &self.route_order.len())
            .field("routers", &self.routers.len())
            .field("selected", &self.selected_route)
            .field("default", &self.default_route)
            .finish()
    }
}

#[cfg(test)]
mod tests;
