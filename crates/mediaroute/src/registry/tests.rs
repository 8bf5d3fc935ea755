// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::*;
use crate::descriptor::{
    ControlFilter, ProviderDescriptor, RouteDescriptor, CATEGORY_LIVE_AUDIO, CATEGORY_LIVE_VIDEO,
    CATEGORY_REMOTE_PLAYBACK, DEFAULT_ROUTE_ID,
};
use crate::provider::{DescriptorPublisher, LocalProvider, LocalRouteHandler};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

type Log = Rc<RefCell<Vec<String>>>;

struct Recorder(Log);

impl RouterCallback for Recorder {
    fn on_route_added(&mut self, _: &Registry, route: &RouteInfo) {
        self.0.borrow_mut().push(format!("added {}", route.unique_id()));
    }
    fn on_route_removed(&mut self, _: &Registry, route: &RouteInfo) {
        self.0.borrow_mut().push(format!("removed {}", route.unique_id()));
    }
    fn on_route_changed(&mut self, _: &Registry, route: &RouteInfo) {
        self.0.borrow_mut().push(format!("changed {}", route.unique_id()));
    }
    fn on_route_volume_changed(&mut self, _: &Registry, route: &RouteInfo) {
        self.0.borrow_mut().push(format!("volume {}", route.unique_id()));
    }
    fn on_route_selected(&mut self, registry: &Registry, route: &RouteInfo) {
        // The registry is already consistent when callbacks run.
        assert_eq!(registry.selected_route().unwrap().unique_id(), route.unique_id());
        self.0.borrow_mut().push(format!("selected {}", route.unique_id()));
    }
    fn on_route_unselected(&mut self, _: &Registry, route: &RouteInfo, reason: UnselectReason) {
        self.0
            .borrow_mut()
            .push(format!("unselected {} {}", route.unique_id(), reason));
    }
    fn on_provider_added(&mut self, _: &Registry, _: ProviderId, metadata: &ProviderMetadata) {
        self.0
            .borrow_mut()
            .push(format!("provider+ {}", metadata.identity()));
    }
    fn on_provider_removed(&mut self, _: &Registry, _: ProviderId, metadata: &ProviderMetadata) {
        self.0
            .borrow_mut()
            .push(format!("provider- {}", metadata.identity()));
    }
}

struct LoggingController {
    name: String,
    log: Log,
}

impl RouteController for LoggingController {
    fn on_select(&mut self) {
        self.log.borrow_mut().push(format!("{} select", self.name));
    }
    fn on_unselect(&mut self, reason: UnselectReason) {
        self.log
            .borrow_mut()
            .push(format!("{} unselect {}", self.name, reason));
    }
    fn on_release(&mut self) {
        self.log.borrow_mut().push(format!("{} release", self.name));
    }
    fn on_set_volume(&mut self, volume: i32) {
        self.log
            .borrow_mut()
            .push(format!("{} volume {}", self.name, volume));
    }
}

struct Handler {
    log: Log,
    requests: Rc<RefCell<Vec<Option<DiscoveryRequest>>>>,
}

impl LocalRouteHandler for Handler {
    fn on_discovery_request_changed(&mut self, request: Option<&DiscoveryRequest>) {
        self.requests.borrow_mut().push(request.cloned());
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
        Some(Box::new(LoggingController {
            name,
            log: Rc::clone(&self.log),
        }))
    }
}

struct Fixture {
    publisher: DescriptorPublisher,
    controllers: Log,
    requests: Rc<RefCell<Vec<Option<DiscoveryRequest>>>>,
    id: ProviderId,
}

fn add_local(registry: &mut Registry, metadata: ProviderMetadata, routes: Vec<RouteDescriptor>) -> Fixture {
    let publisher = DescriptorPublisher::with_descriptor(ProviderDescriptor::new(routes));
    let controllers = Log::default();
    let requests = Rc::new(RefCell::new(Vec::new()));
    let provider = LocalProvider::new(
        metadata,
        publisher.clone(),
        Box::new(Handler {
            log: Rc::clone(&controllers),
            requests: Rc::clone(&requests),
        }),
    );
    let id = registry.add_provider(Box::new(provider));
    Fixture {
        publisher,
        controllers,
        requests,
        id,
    }
}

fn audio_filter() -> ControlFilter {
    ControlFilter::new().with_category(CATEGORY_LIVE_AUDIO)
}

fn default_route() -> RouteDescriptor {
    RouteDescriptor::builder(DEFAULT_ROUTE_ID, "Phone")
        .add_control_filter(audio_filter())
        .add_control_filter(ControlFilter::new().with_category(CATEGORY_LIVE_VIDEO))
        .volume_max(15)
        .build()
}

fn bluetooth_route() -> RouteDescriptor {
    RouteDescriptor::builder("bt", "Headset")
        .add_control_filter(audio_filter())
        .build()
}

fn remote_route(id: &str) -> RouteDescriptor {
    RouteDescriptor::builder(id, id)
        .add_control_filter(ControlFilter::new().with_category(CATEGORY_REMOTE_PLAYBACK))
        .volume_max(10)
        .build()
}

fn recorder(registry: &mut Registry, selector: RouteSelector, flags: CallbackFlags) -> Log {
    let log = Log::default();
    let router = registry.create_router();
    registry
        .add_callback(router, selector, flags, Box::new(Recorder(Rc::clone(&log))))
        .unwrap();
    log
}

#[test]
fn test_system_provider_selects_default() {
    let mut registry = Registry::default();
    let log = recorder(&mut registry, RouteSelector::EMPTY, CallbackFlags::UNFILTERED_EVENTS);
    assert_eq!(registry.default_route(), Err(RouterError::NotReady));

    let sys = add_local(&mut registry, ProviderMetadata::system("sys"), vec![default_route()]);
    assert_eq!(registry.default_route().unwrap().unique_id(), "sys:DEFAULT_ROUTE");
    assert_eq!(registry.selected_route().unwrap().unique_id(), "sys:DEFAULT_ROUTE");
    assert_eq!(
        *log.borrow(),
        vec![
            "provider+ sys",
            "added sys:DEFAULT_ROUTE",
            "selected sys:DEFAULT_ROUTE",
        ]
    );
    assert_eq!(*sys.controllers.borrow(), vec!["DEFAULT_ROUTE select"]);
    assert_eq!(registry.playback_info().unwrap().volume_max, 15);
}

#[test]
fn test_selection_falls_back_when_route_disappears() {
    let mut registry = Registry::default();
    let sys = add_local(
        &mut registry,
        ProviderMetadata::system("sys"),
        vec![default_route(), bluetooth_route()],
    );
    let cast = add_local(&mut registry, ProviderMetadata::new("cast"), vec![remote_route("tv")]);
    assert_eq!(registry.bluetooth_route().unwrap().unique_id(), "sys:bt");
    // Fallback prefers the live-audio-only system route.
    assert_eq!(registry.selected_route().unwrap().unique_id(), "sys:bt");

    registry.select_route("cast:tv").unwrap();
    let log = recorder(&mut registry, RouteSelector::EMPTY, CallbackFlags::UNFILTERED_EVENTS);

    cast.publisher.publish(Some(ProviderDescriptor::default()));
    registry.process_pending();

    assert_eq!(registry.selected_route().unwrap().unique_id(), "sys:bt");
    assert_eq!(
        *log.borrow(),
        vec![
            "unselected cast:tv unknown",
            "selected sys:bt",
            "removed cast:tv",
        ]
    );
    assert_eq!(
        *cast.controllers.borrow(),
        vec!["tv select", "tv unselect unknown", "tv release"]
    );

    // Losing the bluetooth route falls back to the default route.
    sys.publisher
        .publish(Some(ProviderDescriptor::new(vec![default_route()])));
    registry.process_pending();
    assert!(registry.bluetooth_route().is_none());
    assert_eq!(registry.selected_route().unwrap().unique_id(), "sys:DEFAULT_ROUTE");
}

#[test]
fn test_select_route_errors() {
    let mut registry = Registry::default();
    assert_eq!(registry.unselect(UnselectReason::Stopped), Err(RouterError::NotReady));

    add_local(
        &mut registry,
        ProviderMetadata::system("sys"),
        vec![
            default_route(),
            remote_route("off").to_builder().enabled(false).build(),
        ],
    );
    assert_eq!(
        registry.select_route("nope"),
        Err(RouterError::UntrackedRoute("nope".into()))
    );
    assert_eq!(
        registry.select_route("sys:off"),
        Err(RouterError::DisabledRoute("sys:off".into()))
    );
}

#[test]
fn test_unselect_orders_events() {
    let mut registry = Registry::default();
    add_local(&mut registry, ProviderMetadata::system("sys"), vec![default_route()]);
    let cast = add_local(&mut registry, ProviderMetadata::new("cast"), vec![remote_route("tv")]);
    registry.select_route("cast:tv").unwrap();

    let log = recorder(&mut registry, RouteSelector::EMPTY, CallbackFlags::UNFILTERED_EVENTS);
    registry.unselect(UnselectReason::Stopped).unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["unselected cast:tv stopped", "selected sys:DEFAULT_ROUTE"]
    );
    assert_eq!(
        *cast.controllers.borrow(),
        vec!["tv select", "tv unselect stopped", "tv release"]
    );
    // Already on the fallback: no further events.
    registry.unselect(UnselectReason::Stopped).unwrap();
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn test_update_selected_route_keeps_matching() {
    let mut registry = Registry::default();
    add_local(&mut registry, ProviderMetadata::system("sys"), vec![default_route()]);
    add_local(&mut registry, ProviderMetadata::new("cast"), vec![remote_route("tv")]);
    registry.select_route("cast:tv").unwrap();

    let remote = RouteSelector::from_categories([CATEGORY_REMOTE_PLAYBACK]);
    assert_eq!(registry.update_selected_route(&remote).unwrap().unique_id(), "cast:tv");

    let video = RouteSelector::from_categories([CATEGORY_LIVE_VIDEO]);
    assert_eq!(
        registry.update_selected_route(&video).unwrap().unique_id(),
        "sys:DEFAULT_ROUTE"
    );
}

#[test]
fn test_route_events_are_filtered_by_selector() {
    let mut registry = Registry::default();
    let remote = recorder(
        &mut registry,
        RouteSelector::from_categories([CATEGORY_REMOTE_PLAYBACK]),
        CallbackFlags::NONE,
    );
    let all = recorder(
        &mut registry,
        RouteSelector::from_categories([CATEGORY_REMOTE_PLAYBACK]),
        CallbackFlags::UNFILTERED_EVENTS,
    );
    add_local(
        &mut registry,
        ProviderMetadata::new("p"),
        vec![bluetooth_route(), remote_route("tv")],
    );
    assert_eq!(*remote.borrow(), vec!["provider+ p", "added p:tv"]);
    assert_eq!(*all.borrow(), vec!["provider+ p", "added p:bt", "added p:tv"]);
}

#[test]
fn test_descriptor_updates_reorder_and_report_changes() {
    let mut registry = Registry::default();
    let p = add_local(
        &mut registry,
        ProviderMetadata::new("p"),
        vec![remote_route("a"), remote_route("b")],
    );
    let log = recorder(&mut registry, RouteSelector::EMPTY, CallbackFlags::UNFILTERED_EVENTS);

    p.publisher.publish(Some(ProviderDescriptor::new(vec![
        remote_route("b").to_builder().volume(3).build(),
        remote_route("a").to_builder().name("A!").build(),
        remote_route("c"),
        // Invalid and duplicate entries are skipped individually.
        RouteDescriptor::builder("", "nameless").build(),
        remote_route("c"),
    ])));
    registry.process_pending();

    let order: Vec<&str> = registry
        .provider_routes(p.id)
        .iter()
        .map(|r| r.unique_id())
        .collect();
    assert_eq!(order, vec!["p:b", "p:a", "p:c"]);
    assert_eq!(
        *log.borrow(),
        vec!["volume p:b", "changed p:a", "added p:c"]
    );
    assert_eq!(registry.route("p:a").unwrap().name(), "A!");
}

#[test]
fn test_unique_ids_disambiguate_and_stay_stable() {
    let mut registry = Registry::default();
    add_local(&mut registry, ProviderMetadata::new("a:b"), vec![remote_route("c")]);
    let second = add_local(&mut registry, ProviderMetadata::new("a"), vec![remote_route("b:c")]);
    assert!(registry.route("a:b:c").is_some());
    assert!(registry.route("a:b:c_2").is_some());

    second.publisher.publish(Some(ProviderDescriptor::default()));
    registry.process_pending();
    assert!(registry.route("a:b:c_2").is_none());

    second
        .publisher
        .publish(Some(ProviderDescriptor::new(vec![remote_route("b:c")])));
    registry.process_pending();
    assert_eq!(
        registry.provider_routes(second.id)[0].unique_id(),
        "a:b:c_2"
    );
}

#[test]
fn test_unique_id_exhaustion_skips_route() {
    let config = RouterConfig {
        max_unique_id_suffix: 1,
        ..RouterConfig::default()
    };
    let mut registry = Registry::new(config);
    add_local(&mut registry, ProviderMetadata::new("a:b"), vec![remote_route("c")]);
    let second = add_local(
        &mut registry,
        ProviderMetadata::new("a"),
        vec![remote_route("b:c"), remote_route("d")],
    );
    let ids: Vec<&str> = registry
        .provider_routes(second.id)
        .iter()
        .map(|r| r.unique_id())
        .collect();
    assert_eq!(ids, vec!["a:d"]);
}

#[test]
fn test_group_selection_creates_member_controllers() {
    let mut registry = Registry::default();
    add_local(&mut registry, ProviderMetadata::system("sys"), vec![default_route()]);
    let p = add_local(
        &mut registry,
        ProviderMetadata::new("p"),
        vec![
            RouteDescriptor::builder("g", "Everywhere")
                .group_member_ids(["x", "y"])
                .build(),
            remote_route("x"),
            remote_route("y"),
        ],
    );
    let group = registry.route("p:g").unwrap();
    assert_eq!(group.members(), ["p:x".to_string(), "p:y".to_string()]);

    registry.select_route("p:g").unwrap();
    assert_eq!(
        *p.controllers.borrow(),
        vec!["g select", "g/x select", "g/y select"]
    );

    // Dropping a member releases its controller only.
    p.controllers.borrow_mut().clear();
    p.publisher.publish(Some(ProviderDescriptor::new(vec![
        RouteDescriptor::builder("g", "Everywhere")
            .group_member_ids(["x"])
            .build(),
        remote_route("x"),
    ])));
    registry.process_pending();
    assert_eq!(
        *p.controllers.borrow(),
        vec!["g/y unselect unknown", "g/y release"]
    );
    assert_eq!(registry.selected_route().unwrap().unique_id(), "p:g");

    registry.request_set_volume("p:x", 4).unwrap();
    assert_eq!(p.controllers.borrow().last().unwrap(), "g/x volume 4");
}

#[test]
fn test_group_membership_swap_touches_only_changed_members() {
    let mut registry = Registry::default();
    add_local(&mut registry, ProviderMetadata::system("sys"), vec![default_route()]);
    let group = |members: [&str; 2]| {
        RouteDescriptor::builder("g", "Everywhere")
            .group_member_ids(members)
            .build()
    };
    let p = add_local(
        &mut registry,
        ProviderMetadata::new("p"),
        vec![
            group(["a", "b"]),
            remote_route("a"),
            remote_route("b"),
            remote_route("c"),
        ],
    );
    registry.select_route("p:g").unwrap();
    p.controllers.borrow_mut().clear();

    p.publisher.publish(Some(ProviderDescriptor::new(vec![
        group(["b", "c"]),
        remote_route("a"),
        remote_route("b"),
        remote_route("c"),
    ])));
    registry.process_pending();

    let journal = p.controllers.borrow().clone();
    assert_eq!(
        journal,
        vec!["g/a unselect unknown", "g/a release", "g/c select"]
    );
    assert_eq!(journal.iter().filter(|e| e.ends_with("release")).count(), 1);
    assert!(!journal.iter().any(|e| e.starts_with("g/b")));
    assert_eq!(
        registry.route("p:g").unwrap().members(),
        ["p:b".to_string(), "p:c".to_string()]
    );

    registry.request_set_volume("p:b", 3).unwrap();
    registry.request_set_volume("p:c", 5).unwrap();
    assert_eq!(
        p.controllers.borrow()[3..],
        ["g/b volume 3".to_string(), "g/c volume 5".to_string()]
    );
}

#[test]
fn test_drop_unselects_before_release() {
    let mut registry = Registry::default();
    add_local(&mut registry, ProviderMetadata::system("sys"), vec![default_route()]);
    let p = add_local(
        &mut registry,
        ProviderMetadata::new("p"),
        vec![
            RouteDescriptor::builder("g", "Everywhere")
                .group_member_ids(["x"])
                .build(),
            remote_route("x"),
        ],
    );
    registry.select_route("p:g").unwrap();
    p.controllers.borrow_mut().clear();

    drop(registry);
    assert_eq!(
        *p.controllers.borrow(),
        vec![
            "g unselect unknown",
            "g release",
            "g/x unselect unknown",
            "g/x release",
        ]
    );
}

#[test]
fn test_volume_is_clamped() {
    let mut registry = Registry::default();
    let sys = add_local(&mut registry, ProviderMetadata::system("sys"), vec![default_route()]);
    registry.request_set_volume("sys:DEFAULT_ROUTE", 99).unwrap();
    registry.request_set_volume("sys:DEFAULT_ROUTE", -4).unwrap();
    assert_eq!(
        *sys.controllers.borrow(),
        vec![
            "DEFAULT_ROUTE select",
            "DEFAULT_ROUTE volume 15",
            "DEFAULT_ROUTE volume 0",
        ]
    );
    assert!(registry.request_set_volume("ghost", 1).is_err());
}

#[test]
fn test_control_request_without_controller_fails() {
    let mut registry = Registry::default();
    add_local(&mut registry, ProviderMetadata::system("sys"), vec![default_route()]);
    add_local(&mut registry, ProviderMetadata::new("cast"), vec![remote_route("tv")]);

    let outcome = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&outcome);
    registry
        .send_control_request(
            "cast:tv",
            &ControlRequest::new("play"),
            ControlRequestCallback::new(move |result| *slot.lock() = Some(result)),
        )
        .unwrap();
    let result = outcome.lock().take().unwrap();
    assert_eq!(result.unwrap_err().message, None);

    // The selected route's controller declines by default too.
    let slot = Arc::clone(&outcome);
    registry
        .send_control_request(
            "sys:DEFAULT_ROUTE",
            &ControlRequest::new("play"),
            ControlRequestCallback::new(move |result| *slot.lock() = Some(result)),
        )
        .unwrap();
    assert!(outcome.lock().take().unwrap().is_err());

    assert_eq!(
        registry.send_control_request("ghost", &ControlRequest::new("play"), ControlRequestCallback::none()),
        Err(RouterError::UntrackedRoute("ghost".into()))
    );
}

#[test]
fn test_discovery_request_aggregation() {
    let mut registry = Registry::default();
    let p = add_local(&mut registry, ProviderMetadata::new("p"), vec![remote_route("tv")]);
    assert!(registry.discovery_request().is_none());

    let router = registry.create_router();
    let cb = registry
        .add_callback(
            router,
            RouteSelector::from_categories([CATEGORY_REMOTE_PLAYBACK]),
            CallbackFlags::REQUEST_DISCOVERY,
            Box::new(Recorder(Log::default())),
        )
        .unwrap();
    let request = registry.discovery_request().unwrap().clone();
    assert!(!request.is_active_scan());
    assert!(request.selector().has_control_category(CATEGORY_REMOTE_PLAYBACK));

    registry
        .update_callback(
            router,
            cb,
            &RouteSelector::from_categories([CATEGORY_LIVE_AUDIO]),
            CallbackFlags::PERFORM_ACTIVE_SCAN,
        )
        .unwrap();
    let request = registry.discovery_request().unwrap();
    assert!(request.is_active_scan());
    assert_eq!(request.selector().control_categories().len(), 2);

    registry.destroy_router(router).unwrap();
    assert!(registry.discovery_request().is_none());

    let seen = p.requests.borrow();
    assert_eq!(seen.len(), 3);
    assert!(seen[2].is_none());
}

#[test]
fn test_low_ram_drops_passive_discovery() {
    let config = RouterConfig {
        low_ram_device: true,
        ..RouterConfig::default()
    };
    let mut registry = Registry::new(config);
    let selector = RouteSelector::from_categories([CATEGORY_REMOTE_PLAYBACK]);
    let router = registry.create_router();
    registry
        .add_callback(
            router,
            selector.clone(),
            CallbackFlags::REQUEST_DISCOVERY,
            Box::new(Recorder(Log::default())),
        )
        .unwrap();
    assert!(registry.discovery_request().is_none());

    registry
        .add_callback(
            router,
            selector.clone(),
            CallbackFlags::FORCE_DISCOVERY,
            Box::new(Recorder(Log::default())),
        )
        .unwrap();
    assert!(registry.discovery_request().is_some());

    // Optimistic availability on low-RAM devices.
    assert!(registry.is_route_available(&selector, AvailabilityFlags::NONE));
    assert!(!registry.is_route_available(&selector, AvailabilityFlags::REQUIRE_MATCH));
}

#[test]
fn test_route_availability() {
    let mut registry = Registry::default();
    add_local(
        &mut registry,
        ProviderMetadata::system("sys"),
        vec![default_route(), bluetooth_route()],
    );
    let audio = RouteSelector::from_categories([CATEGORY_LIVE_AUDIO]);
    assert!(!registry.is_route_available(&RouteSelector::EMPTY, AvailabilityFlags::NONE));
    assert!(registry.is_route_available(&audio, AvailabilityFlags::NONE));
    assert!(!registry.is_route_available(&audio, AvailabilityFlags::IGNORE_DEFAULT_ROUTE));

    add_local(
        &mut registry,
        ProviderMetadata::new("speakers"),
        vec![RouteDescriptor::builder("kitchen", "Kitchen")
            .add_control_filter(audio_filter())
            .build()],
    );
    assert!(registry.is_route_available(&audio, AvailabilityFlags::IGNORE_DEFAULT_ROUTE));
}

#[test]
fn test_remove_provider() {
    let mut registry = Registry::default();
    add_local(&mut registry, ProviderMetadata::system("sys"), vec![default_route()]);
    let cast = add_local(&mut registry, ProviderMetadata::new("cast"), vec![remote_route("tv")]);
    registry.select_route("cast:tv").unwrap();
    let log = recorder(&mut registry, RouteSelector::EMPTY, CallbackFlags::UNFILTERED_EVENTS);

    registry.remove_provider(cast.id).unwrap();
    assert_eq!(registry.selected_route().unwrap().unique_id(), "sys:DEFAULT_ROUTE");
    assert!(registry.route("cast:tv").is_none());
    assert_eq!(
        *log.borrow(),
        vec![
            "unselected cast:tv unknown",
            "selected sys:DEFAULT_ROUTE",
            "removed cast:tv",
            "provider- cast",
        ]
    );
    assert!(matches!(
        registry.remove_provider(cast.id),
        Err(RouterError::UnknownProvider(_))
    ));

    // Late notices from the removed provider are ignored.
    cast.publisher.publish(None);
    registry.process_pending();
    assert_eq!(log.borrow().len(), 4);
}

#[test]
fn test_commands_posted_from_other_threads() {
    let mut registry = Registry::default();
    add_local(&mut registry, ProviderMetadata::system("sys"), vec![default_route()]);
    add_local(&mut registry, ProviderMetadata::new("cast"), vec![remote_route("tv")]);

    let handle = registry.handle();
    std::thread::spawn(move || {
        handle.post(|registry| {
            registry.select_route("cast:tv").unwrap();
        });
    })
    .join()
    .unwrap();

    registry.run_once(std::time::Duration::from_secs(1));
    assert_eq!(registry.selected_route().unwrap().unique_id(), "cast:tv");
}
