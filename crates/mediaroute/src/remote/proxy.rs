// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Proxy making a provider behind a service endpoint look local.
//!
//! The proxy binds only while it is started and either a discovery request is
//! active or one of its controllers is alive. After a bind it registers,
//! adopts the service's descriptor, re-attaches existing controllers and
//! flushes the discovery request. Link death drops the descriptor (so the
//! registry tears the routes down) and schedules a rebind with exponential
//! backoff while binding is still wanted.

use super::connection::{Connection, ConnectionNotice};
use super::link::{LinkEvent, LinkEventHandler, ServiceConnector};
use crate::config::RemoteConfig;
use crate::descriptor::{ControlRequest, DiscoveryRequest, ProviderDescriptor};
use crate::provider::{
    ControlRequestCallback, ControlRequestError, ControlResult, DescriptorListener,
    MediaRouteProvider, ProviderMetadata, RouteController, UnselectReason,
};
use crate::runtime::{ControlContext, LinkId, TimerId};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Deferred side effect, run once the proxy state is no longer borrowed.
enum Effect {
    Notify(DescriptorListener),
    Complete(ControlRequestCallback, ControlResult),
}

struct ControllerState {
    route_id: String,
    group_route_id: Option<String>,
    remote_id: Option<i32>,
    selected: bool,
    pending_set_volume: Option<i32>,
    pending_update_delta: i32,
}

struct ProxyState {
    ctx: ControlContext,
    endpoint: String,
    connector: Box<dyn ServiceConnector>,
    config: RemoteConfig,
    started: bool,
    bound: bool,
    link: Option<LinkId>,
    connection: Option<Connection>,
    ready: bool,
    descriptor: Option<Arc<ProviderDescriptor>>,
    listener: Option<DescriptorListener>,
    discovery_request: Option<DiscoveryRequest>,
    controllers: BTreeMap<u64, ControllerState>,
    next_controller_key: u64,
    rebind_timer: Option<TimerId>,
    rebind_attempts: u32,
}

struct ProxyShared {
    metadata: ProviderMetadata,
    me: Weak<ProxyShared>,
    state: RefCell<ProxyState>,
}

/// Provider proxy for one service endpoint.
///
/// Cheap to clone; clones share state. Lives on the control thread.
#[derive(Clone)]
pub struct RemoteProviderProxy {
    shared: Rc<ProxyShared>,
}

impl RemoteProviderProxy {
    pub fn new(
        ctx: &ControlContext,
        metadata: ProviderMetadata,
        endpoint: impl Into<String>,
        connector: Box<dyn ServiceConnector>,
        config: RemoteConfig,
    ) -> Self {
        let state = ProxyState {
            ctx: ctx.clone(),
            endpoint: endpoint.into(),
            connector,
            config,
            started: false,
            bound: false,
            link: None,
            connection: None,
            ready: false,
            descriptor: None,
            listener: None,
            discovery_request: None,
            controllers: BTreeMap::new(),
            next_controller_key: 1,
            rebind_timer: None,
            rebind_attempts: 0,
        };
        let shared = Rc::new_cyclic(|me| ProxyShared {
            metadata,
            me: me.clone(),
            state: RefCell::new(state),
        });
        Self { shared }
    }

    /// Allow binding. Binding happens once there is something to do.
    pub fn start(&self) {
        self.shared.with_state(|st, me, fx| {
            if !st.started {
                debug!("{}: start", st.endpoint);
                st.started = true;
                st.update_binding(me, fx);
            }
        });
    }

    /// Forbid binding and drop any connection.
    pub fn stop(&self) {
        self.shared.with_state(|st, me, fx| {
            if st.started {
                debug!("{}: stop", st.endpoint);
                st.started = false;
                st.update_binding(me, fx);
            }
        });
    }

    pub fn endpoint(&self) -> String {
        self.shared.state.borrow().endpoint.clone()
    }

    pub fn is_started(&self) -> bool {
        self.shared.state.borrow().started
    }

    /// True while binding is wanted (a link may still be pending).
    pub fn is_bound(&self) -> bool {
        self.shared.state.borrow().bound
    }

    /// True once the service accepted registration on the current link.
    pub fn is_connected(&self) -> bool {
        self.shared.state.borrow().ready
    }

    pub fn controller_count(&self) -> usize {
        self.shared.state.borrow().controllers.len()
    }

    /// Negotiated service version, 0 while not registered.
    pub fn service_version(&self) -> i32 {
        self.shared
            .state
            .borrow()
            .connection
            .as_ref()
            .map_or(0, Connection::service_version)
    }
}

impl fmt::Debug for RemoteProviderProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.shared.state.borrow();
        f.debug_struct("RemoteProviderProxy")
            .field("identity", &self.shared.metadata.identity())
            .field("endpoint", &st.endpoint)
            .field("bound", &st.bound)
            .field("ready", &st.ready)
            .field("controllers", &st.controllers.len())
            .finish()
    }
}

impl ProxyShared {
    fn with_state<R>(
        &self,
        f: impl FnOnce(&mut ProxyState, &Weak<ProxyShared>, &mut Vec<Effect>) -> R,
    ) -> R {
        let mut effects = Vec::new();
        let result = {
            let mut st = self.state.borrow_mut();
            f(&mut st, &self.me, &mut effects)
        };
        for effect in effects {
            match effect {
                Effect::Notify(listener) => listener.notify(),
                Effect::Complete(callback, result) => callback.complete(result),
            }
        }
        result
    }

    fn on_rebind_timer(&self) {
        self.with_state(|st, me, _fx| {
            st.rebind_timer = None;
            if st.bound && st.link.is_none() && st.should_bind() {
                st.start_link(me);
            }
        });
    }

    fn on_reply_timeout(&self, link: LinkId, request_id: u32) {
        self.with_state(|st, _me, fx| {
            let Some(conn) = st.connection.as_mut() else {
                return;
            };
            if conn.link_id() != link {
                return;
            }
            if let Some(callback) = conn.take_pending(request_id) {
                warn!("{}: control request {} timed out", st.endpoint, request_id);
                fx.push(Effect::Complete(
                    callback,
                    Err(ControlRequestError::new("Request timed out")),
                ));
            }
        });
    }
}

impl LinkEventHandler for ProxyShared {
    fn on_link_event(&self, link: LinkId, event: LinkEvent) {
        self.with_state(|st, me, fx| st.handle_link_event(link, event, me, fx));
    }
}

impl ProxyState {
    fn should_bind(&self) -> bool {
        self.started && (self.discovery_request.is_some() || !self.controllers.is_empty())
    }

    fn update_binding(&mut self, me: &Weak<ProxyShared>, fx: &mut Vec<Effect>) {
        if self.should_bind() {
            self.bind(me);
        } else {
            self.unbind(fx);
        }
    }

    fn bind(&mut self, me: &Weak<ProxyShared>) {
        if self.bound {
            return;
        }
        self.bound = true;
        self.rebind_attempts = 0;
        self.start_link(me);
    }

    fn start_link(&mut self, me: &Weak<ProxyShared>) {
        let handler: Weak<dyn LinkEventHandler> = me.clone();
        let events = self.ctx.register_link(handler);
        let link = events.link_id();
        self.link = Some(link);
        info!("{}: binding ({})", self.endpoint, link);
        if let Err(e) = self.connector.bind(&self.endpoint, events) {
            warn!("{}: bind failed: {}", self.endpoint, e);
            self.ctx.unregister_link(link);
            self.link = None;
            self.schedule_rebind(me);
        }
    }

    fn unbind(&mut self, fx: &mut Vec<Effect>) {
        if !self.bound {
            return;
        }
        info!("{}: unbinding", self.endpoint);
        self.bound = false;
        if let Some(timer) = self.rebind_timer.take() {
            self.ctx.cancel_timer(timer);
        }
        self.disconnect(fx);
        if let Some(link) = self.link.take() {
            self.ctx.unregister_link(link);
        }
    }

    fn disconnect(&mut self, fx: &mut Vec<Effect>) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        self.set_descriptor(None, fx);
        self.ready = false;
        for controller in self.controllers.values_mut() {
            controller.remote_id = None;
        }
        for callback in connection.dispose() {
            fx.push(Effect::Complete(callback, Err(ControlRequestError::unknown())));
        }
    }

    fn schedule_rebind(&mut self, me: &Weak<ProxyShared>) {
        if self.rebind_timer.is_some() {
            return;
        }
        let delay = self.config.rebind_delay(self.rebind_attempts);
        self.rebind_attempts = self.rebind_attempts.saturating_add(1);
        debug!("{}: rebind in {:?}", self.endpoint, delay);
        let me = me.clone();
        self.rebind_timer = Some(self.ctx.schedule(delay, move || {
            if let Some(shared) = me.upgrade() {
                shared.on_rebind_timer();
            }
        }));
    }

    fn set_descriptor(&mut self, descriptor: Option<ProviderDescriptor>, fx: &mut Vec<Effect>) {
        if self.descriptor.as_deref() == descriptor.as_ref() {
            return;
        }
        self.descriptor = descriptor.map(Arc::new);
        if let Some(listener) = &self.listener {
            fx.push(Effect::Notify(listener.clone()));
        }
    }

    fn handle_link_event(
        &mut self,
        link: LinkId,
        event: LinkEvent,
        me: &Weak<ProxyShared>,
        fx: &mut Vec<Effect>,
    ) {
        if self.link != Some(link) {
            debug!("{}: event for stale {}", self.endpoint, link);
            if let LinkEvent::Connected(mut orphan) = event {
                orphan.close();
            }
            return;
        }
        match event {
            LinkEvent::Connected(message_link) => {
                let mut connection =
                    Connection::new(message_link, link, self.config.client_version);
                match connection.register() {
                    Ok(()) => {
                        debug!("{}: connected, registering", self.endpoint);
                        self.connection = Some(connection);
                    }
                    Err(e) => {
                        warn!("{}: register failed: {}", self.endpoint, e);
                        let _ = connection.dispose();
                        self.link_lost(link, me, fx);
                    }
                }
            }
            LinkEvent::BindFailed(reason) => {
                warn!("{}: bind failed: {}", self.endpoint, reason);
                self.ctx.unregister_link(link);
                self.link = None;
                if self.bound {
                    self.schedule_rebind(me);
                }
            }
            LinkEvent::Message(msg) => {
                let notice = match self.connection.as_mut() {
                    Some(connection) => connection.handle_message(msg),
                    None => {
                        debug!("{}: message before connection", self.endpoint);
                        None
                    }
                };
                if let Some(notice) = notice {
                    self.handle_notice(notice, fx);
                }
            }
            LinkEvent::Down => {
                info!("{}: service connection died", self.endpoint);
                self.link_lost(link, me, fx);
            }
        }
    }

    fn link_lost(&mut self, link: LinkId, me: &Weak<ProxyShared>, fx: &mut Vec<Effect>) {
        self.disconnect(fx);
        self.ctx.unregister_link(link);
        self.link = None;
        if self.bound {
            self.schedule_rebind(me);
        }
    }

    fn handle_notice(&mut self, notice: ConnectionNotice, fx: &mut Vec<Effect>) {
        match notice {
            ConnectionNotice::Ready(descriptor) => {
                info!(
                    "{}: registered (service version {})",
                    self.endpoint,
                    self.connection.as_ref().map_or(0, Connection::service_version)
                );
                self.rebind_attempts = 0;
                self.set_descriptor(descriptor, fx);
                self.ready = true;
                self.attach_controllers();
                let request = self.discovery_request.clone();
                if let (Some(request), Some(connection)) = (request, self.connection.as_mut()) {
                    connection.set_discovery_request(Some(&request));
                }
            }
            ConnectionNotice::DescriptorChanged(descriptor) => {
                self.set_descriptor(descriptor, fx);
            }
            ConnectionNotice::RegistrationFailed => {
                warn!("{}: registration failed", self.endpoint);
                self.unbind(fx);
            }
            ConnectionNotice::Completed(callback, result) => {
                fx.push(Effect::Complete(callback, result));
            }
        }
    }

    fn attach_controllers(&mut self) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        for controller in self.controllers.values_mut() {
            attach(connection, controller);
        }
    }

    fn attached(&mut self, key: u64) -> Option<(&mut Connection, &mut ControllerState)> {
        if !self.ready {
            return None;
        }
        let connection = self.connection.as_mut()?;
        let controller = self.controllers.get_mut(&key)?;
        controller.remote_id?;
        Some((connection, controller))
    }
}

fn attach(connection: &mut Connection, controller: &mut ControllerState) {
    let id = connection
        .create_route_controller(&controller.route_id, controller.group_route_id.as_deref());
    controller.remote_id = Some(id);
    if controller.selected {
        connection.select_route(id);
        if let Some(volume) = controller.pending_set_volume.take() {
            connection.set_volume(id, volume);
        }
        if controller.pending_update_delta != 0 {
            connection.update_volume(id, controller.pending_update_delta);
            controller.pending_update_delta = 0;
        }
    }
}

impl MediaRouteProvider for RemoteProviderProxy {
    fn metadata(&self) -> &ProviderMetadata {
        &self.shared.metadata
    }

    fn descriptor(&self) -> Option<Arc<ProviderDescriptor>> {
        self.shared.state.borrow().descriptor.clone()
    }

    fn set_descriptor_listener(&mut self, listener: Option<DescriptorListener>) {
        self.shared.state.borrow_mut().listener = listener;
    }

    fn set_discovery_request(&mut self, request: Option<&DiscoveryRequest>) {
        self.shared.with_state(|st, me, fx| {
            st.discovery_request = request.cloned();
            if st.ready {
                if let Some(connection) = st.connection.as_mut() {
                    connection.set_discovery_request(request);
                }
            }
            st.update_binding(me, fx);
        });
    }

    fn create_route_controller(
        &mut self,
        route_id: &str,
        group_route_id: Option<&str>,
    ) -> Option<Box<dyn RouteController>> {
        let key = self.shared.with_state(|st, me, fx| {
            let known = st
                .descriptor
                .as_ref()
                .is_some_and(|d| d.route(route_id).is_some());
            if !known {
                debug!("{}: no route {} to control", st.endpoint, route_id);
                return None;
            }
            let key = st.next_controller_key;
            st.next_controller_key += 1;
            let mut controller = ControllerState {
                route_id: route_id.to_string(),
                group_route_id: group_route_id.map(str::to_string),
                remote_id: None,
                selected: false,
                pending_set_volume: None,
                pending_update_delta: 0,
            };
            if st.ready {
                if let Some(connection) = st.connection.as_mut() {
                    attach(connection, &mut controller);
                }
            }
            st.controllers.insert(key, controller);
            st.update_binding(me, fx);
            Some(key)
        })?;
        Some(Box::new(RemoteRouteController {
            shared: Rc::clone(&self.shared),
            key,
            released: false,
        }))
    }
}

/// Controller for one route of a remote provider.
///
/// Commands issued before the connection is ready are buffered: the latest
/// absolute volume wins and relative deltas accumulate.
pub struct RemoteRouteController {
    shared: Rc<ProxyShared>,
    key: u64,
    released: bool,
}

impl RemoteRouteController {
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let key = self.key;
        self.shared.with_state(|st, me, fx| {
            let Some(controller) = st.controllers.remove(&key) else {
                return;
            };
            if let (Some(id), Some(connection)) = (controller.remote_id, st.connection.as_mut()) {
                connection.release_route_controller(id);
            }
            st.update_binding(me, fx);
        });
    }
}

impl RouteController for RemoteRouteController {
    fn on_select(&mut self) {
        let key = self.key;
        self.shared.with_state(|st, _me, _fx| {
            if let Some(controller) = st.controllers.get_mut(&key) {
                controller.selected = true;
            }
            if let Some((connection, controller)) = st.attached(key) {
                if let Some(id) = controller.remote_id {
                    connection.select_route(id);
                }
            }
        });
    }

    fn on_unselect(&mut self, reason: UnselectReason) {
        let key = self.key;
        self.shared.with_state(|st, _me, _fx| {
            if let Some(controller) = st.controllers.get_mut(&key) {
                controller.selected = false;
            }
            if let Some((connection, controller)) = st.attached(key) {
                if let Some(id) = controller.remote_id {
                    connection.unselect_route(id, reason);
                }
            }
        });
    }

    fn on_release(&mut self) {
        self.release();
    }

    fn on_set_volume(&mut self, volume: i32) {
        let key = self.key;
        self.shared.with_state(|st, _me, _fx| {
            if let Some((connection, controller)) = st.attached(key) {
                if let Some(id) = controller.remote_id {
                    connection.set_volume(id, volume);
                }
            } else if let Some(controller) = st.controllers.get_mut(&key) {
                controller.pending_set_volume = Some(volume);
                controller.pending_update_delta = 0;
            }
        });
    }

    fn on_update_volume(&mut self, delta: i32) {
        let key = self.key;
        self.shared.with_state(|st, _me, _fx| {
            if let Some((connection, controller)) = st.attached(key) {
                if let Some(id) = controller.remote_id {
                    connection.update_volume(id, delta);
                }
            } else if let Some(controller) = st.controllers.get_mut(&key) {
                controller.pending_update_delta =
                    controller.pending_update_delta.saturating_add(delta);
            }
        });
    }

    fn on_control_request(
        &mut self,
        request: &ControlRequest,
        callback: ControlRequestCallback,
    ) -> Result<(), ControlRequestCallback> {
        let key = self.key;
        let me = Rc::downgrade(&self.shared);
        self.shared.with_state(|st, _me, _fx| {
            let timeout = st.config.reply_timeout();
            let ctx = st.ctx.clone();
            let Some((connection, controller)) = st.attached(key) else {
                return Err(callback);
            };
            let Some(id) = controller.remote_id else {
                return Err(callback);
            };
            let link = connection.link_id();
            let request_id = connection.send_control_request(id, request, callback)?;
            if let Some(timeout) = timeout {
                ctx.schedule(timeout, move || {
                    if let Some(shared) = me.upgrade() {
                        shared.on_reply_timeout(link, request_id);
                    }
                });
            }
            Ok(())
        })
    }
}

impl Drop for RemoteRouteController {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if self.shared.state.try_borrow_mut().is_ok() {
            self.release();
        } else {
            warn!("Remote route controller dropped without release");
        }
    }
}
