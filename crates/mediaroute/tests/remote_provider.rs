// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Remote proxy against the service dispatcher over the in-memory transport.

mod support;

use mediaroute::descriptor::{
    ControlRequest, ProviderDescriptor, RouteSelector, CATEGORY_REMOTE_PLAYBACK,
};
use mediaroute::provider::{
    ControlRequestCallback, ControlResult, MediaRouteProvider, ProviderMetadata, RouteController,
};
use mediaroute::remote::{MemoryConnector, RemoteProviderProxy};
use mediaroute::service::ProviderService;
use mediaroute::{CallbackFlags, CallbackId, RemoteConfig, Registry, RouterId};
use parking_lot::Mutex;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use support::*;

struct Remote {
    registry: Registry,
    service: ProviderService,
    cast: LocalFixture,
    connector: MemoryConnector,
    proxy: RemoteProviderProxy,
    events: Rc<RefCell<Vec<String>>>,
}

impl Remote {
    fn new() -> Self {
        let config = RemoteConfig {
            rebind_initial_delay_ms: 10,
            rebind_max_delay_ms: 40,
            ..RemoteConfig::default()
        };
        let mut registry = Registry::default();
        let sys = LocalFixture::new(vec![default_route(), bluetooth_route()]);
        sys.add_to(&mut registry, ProviderMetadata::system("android"));

        let cast = LocalFixture::new(vec![remote_route("tv", "TV"), remote_route("hifi", "HiFi")]);
        let service = cast.serve("cast.service");
        let connector = MemoryConnector::new();
        connector.register_endpoint("cast", service.handle());

        let proxy = RemoteProviderProxy::new(
            registry.context(),
            ProviderMetadata::new("cast"),
            "cast",
            Box::new(connector.clone()),
            config,
        );
        proxy.start();
        registry.add_provider(Box::new(proxy.clone()));

        let events = Rc::new(RefCell::new(Vec::new()));
        let router = registry.create_router();
        registry
            .add_callback(
                router,
                RouteSelector::EMPTY,
                CallbackFlags::UNFILTERED_EVENTS,
                Box::new(EventLog(Rc::clone(&events))),
            )
            .unwrap();

        Self {
            registry,
            service,
            cast,
            connector,
            proxy,
            events,
        }
    }

    fn discover(&mut self) -> (RouterId, CallbackId) {
        let router = self.registry.create_router();
        let id = self
            .registry
            .add_callback(
                router,
                RouteSelector::from_categories([CATEGORY_REMOTE_PLAYBACK]),
                CallbackFlags::REQUEST_DISCOVERY,
                Box::new(EventLog(Rc::default())),
            )
            .unwrap();
        self.pump();
        (router, id)
    }

    fn pump(&mut self) {
        pump(&mut self.registry, &mut [&mut self.service]);
    }

    fn pump_until<F: FnMut(&Registry) -> bool>(&mut self, done: F) -> bool {
        pump_until(
            &mut self.registry,
            &mut [&mut self.service],
            Duration::from_secs(2),
            done,
        )
    }

    fn control(&mut self, route: &str, action: &str) -> ControlResult {
        let outcome: Arc<Mutex<Option<ControlResult>>> = Arc::default();
        let slot = Arc::clone(&outcome);
        self.registry
            .send_control_request(
                route,
                &ControlRequest::new(action),
                ControlRequestCallback::new(move |result| *slot.lock() = Some(result)),
            )
            .unwrap();
        self.pump();
        let result = outcome.lock().take();
        result.expect("control request never completed")
    }
}

#[test]
fn test_binds_only_when_needed() {
    let mut remote = Remote::new();
    remote.pump();
    assert!(!remote.proxy.is_bound());
    assert_eq!(remote.connector.link_count("cast"), 0);
    assert!(remote.registry.route("cast:tv").is_none());

    let (router, callback) = remote.discover();
    assert!(remote.proxy.is_connected());
    assert_eq!(remote.proxy.service_version(), 2);
    assert_eq!(remote.connector.link_count("cast"), 1);
    assert!(remote.registry.route("cast:tv").is_some());
    assert!(remote.registry.route("cast:hifi").is_some());

    let composite = remote.service.composite_request().unwrap();
    assert!(composite.selector().has_control_category(CATEGORY_REMOTE_PLAYBACK));
    assert!(remote.cast.requests.lock().last().unwrap().is_some());

    // Nothing left to do: the proxy lets go of the service.
    remote.registry.remove_callback(router, callback).unwrap();
    remote.pump();
    assert!(!remote.proxy.is_bound());
    assert_eq!(remote.connector.link_count("cast"), 0);
    assert_eq!(remote.service.client_count(), 0);
    assert!(remote.registry.route("cast:tv").is_none());
    assert!(remote.events.borrow().contains(&"removed cast:tv".to_string()));
}

#[test]
fn test_selection_volume_and_control_requests() {
    let mut remote = Remote::new();
    remote.discover();

    remote.registry.select_route("cast:tv").unwrap();
    remote.registry.request_set_volume("cast:tv", 99).unwrap();
    remote.registry.request_update_volume("cast:tv", -3).unwrap();
    remote.pump();
    assert_eq!(remote.proxy.controller_count(), 1);
    assert_eq!(
        remote.cast.journal.take(),
        vec!["tv select", "tv volume 20", "tv delta -3"]
    );

    let pong = remote.control("cast:tv", "ping").unwrap().unwrap();
    assert_eq!(pong.get("pong"), Some(&json!(true)));
    let rejected = remote.control("cast:tv", "seek").unwrap_err();
    assert_eq!(rejected.message, None);

    remote.registry.select_route("android:DEFAULT_ROUTE").unwrap();
    remote.pump();
    assert_eq!(
        remote.cast.journal.take(),
        vec!["tv unselect route-changed", "tv release"]
    );
    assert_eq!(remote.proxy.controller_count(), 0);
}

#[test]
fn test_descriptor_changes_reach_the_registry() {
    let mut remote = Remote::new();
    remote.discover();
    remote.events.borrow_mut().clear();

    remote.cast.publisher.publish(Some(ProviderDescriptor::new(vec![
        remote_route("tv", "Living room TV"),
    ])));
    remote.pump();

    assert_eq!(
        remote.registry.route("cast:tv").unwrap().name(),
        "Living room TV"
    );
    assert!(remote.registry.route("cast:hifi").is_none());
    assert_eq!(
        *remote.events.borrow(),
        vec!["changed cast:tv", "removed cast:hifi"]
    );
}

#[test]
fn test_link_death_falls_back_and_rebinds() {
    let mut remote = Remote::new();
    remote.discover();
    remote.registry.select_route("cast:tv").unwrap();
    remote.pump();
    remote.events.borrow_mut().clear();

    assert_eq!(remote.connector.sever("cast"), 1);
    remote.pump();

    assert!(!remote.proxy.is_connected());
    assert_eq!(remote.registry.selected_route().unwrap().unique_id(), "android:bt");
    assert!(remote.registry.route("cast:tv").is_none());
    assert_eq!(remote.proxy.controller_count(), 0);
    let events = remote.events.borrow().clone();
    assert_eq!(
        events[..2],
        ["unselected cast:tv unknown".to_string(), "selected android:bt".to_string()]
    );
    let position = |wanted: &str| events.iter().position(|e| e == wanted);
    let fallback = position("selected android:bt").unwrap();
    assert!(position("removed cast:tv").unwrap() > fallback);
    assert!(position("removed cast:hifi").unwrap() > fallback);
    let releases = remote
        .cast
        .journal
        .entries()
        .iter()
        .filter(|e| *e == "tv release")
        .count();
    assert_eq!(releases, 1);

    // Discovery is still wanted, so the proxy comes back after a backoff.
    assert!(remote.pump_until(|registry| registry.route("cast:tv").is_some()));
    assert!(remote.proxy.is_connected());
    assert_eq!(remote.connector.link_count("cast"), 1);
    assert_eq!(remote.service.client_count(), 1);
}

#[test]
fn test_volume_deltas_buffered_while_down_saturate() {
    let mut remote = Remote::new();
    remote.discover();
    let mut provider = remote.proxy.clone();
    let mut tv = provider.create_route_controller("tv", None).unwrap();
    tv.on_select();
    remote.pump();
    remote.cast.journal.take();

    assert_eq!(remote.connector.sever("cast"), 1);
    remote.pump();
    tv.on_update_volume(i32::MAX);
    tv.on_update_volume(1);
    tv.on_update_volume(i32::MAX);
    remote.cast.journal.take();

    assert!(remote.pump_until(|registry| registry.route("cast:tv").is_some()));
    remote.pump();
    let journal = remote.cast.journal.take();
    assert_eq!(journal, vec!["tv select", "tv delta 2147483647"]);

    tv.on_release();
    remote.pump();
    assert_eq!(remote.cast.journal.take(), vec!["tv release"]);
}

#[test]
fn test_unreachable_endpoint_retries_until_available() {
    let mut remote = Remote::new();
    remote.connector.remove_endpoint("cast");
    remote.discover();
    assert!(remote.proxy.is_bound());
    assert!(!remote.proxy.is_connected());

    remote
        .connector
        .register_endpoint("cast", remote.service.handle());
    assert!(remote.pump_until(|registry| registry.route("cast:tv").is_some()));
}

#[test]
fn test_stop_tears_down() {
    let mut remote = Remote::new();
    remote.discover();
    remote.registry.select_route("cast:hifi").unwrap();
    remote.pump();

    remote.proxy.stop();
    remote.pump();

    assert!(!remote.proxy.is_bound());
    assert_eq!(remote.service.client_count(), 0);
    assert!(remote.registry.route("cast:hifi").is_none());
    assert_eq!(remote.registry.selected_route().unwrap().unique_id(), "android:bt");
}
