// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Router handles, callback registrations and event fan-out.

use super::route_info::RouteInfo;
use super::{ProviderId, Registry};
use crate::descriptor::RouteSelector;
use crate::provider::{ProviderMetadata, UnselectReason};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;

/// Application handle to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouterId(pub(crate) u64);

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "router#{}", self.0)
    }
}

/// One callback registration on a router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(pub(crate) u64);

/// Discovery and delivery flags of a callback registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CallbackFlags(u32);

impl CallbackFlags {
    pub const NONE: CallbackFlags = CallbackFlags(0);
    /// Actively scan for routes; costs power.
    pub const PERFORM_ACTIVE_SCAN: CallbackFlags = CallbackFlags(1);
    /// Deliver route events regardless of the registration's selector.
    pub const UNFILTERED_EVENTS: CallbackFlags = CallbackFlags(2);
    /// Request passive discovery; ignored on low-RAM devices.
    pub const REQUEST_DISCOVERY: CallbackFlags = CallbackFlags(4);
    /// Request passive discovery even on low-RAM devices.
    pub const FORCE_DISCOVERY: CallbackFlags = CallbackFlags(8);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits & 0xf)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: CallbackFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CallbackFlags {
    type Output = CallbackFlags;

    fn bitor(self, rhs: CallbackFlags) -> CallbackFlags {
        CallbackFlags(self.0 | rhs.0)
    }
}

/// Flags for [`Registry::is_route_available`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AvailabilityFlags(u32);

impl AvailabilityFlags {
    pub const NONE: AvailabilityFlags = AvailabilityFlags(0);
    /// Do not count the default or bluetooth route as a match.
    pub const IGNORE_DEFAULT_ROUTE: AvailabilityFlags = AvailabilityFlags(1);
    /// Answer from real routes even on low-RAM devices.
    pub const REQUIRE_MATCH: AvailabilityFlags = AvailabilityFlags(2);

    pub fn contains(self, other: AvailabilityFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AvailabilityFlags {
    type Output = AvailabilityFlags;

    fn bitor(self, rhs: AvailabilityFlags) -> AvailabilityFlags {
        AvailabilityFlags(self.0 | rhs.0)
    }
}

/// Receiver of registry events.
///
/// Every method receives a read-only view of the registry as it stands after
/// the change, plus a snapshot of the route involved. Callbacks run on the
/// control thread after the triggering operation has finished.
#[allow(unused_variables)]
pub trait RouterCallback {
    fn on_route_added(&mut self, registry: &Registry, route: &RouteInfo) {}

    fn on_route_removed(&mut self, registry: &Registry, route: &RouteInfo) {}

    fn on_route_changed(&mut self, registry: &Registry, route: &RouteInfo) {}

    fn on_route_volume_changed(&mut self, registry: &Registry, route: &RouteInfo) {}

    fn on_route_presentation_display_changed(&mut self, registry: &Registry, route: &RouteInfo) {}

    fn on_route_selected(&mut self, registry: &Registry, route: &RouteInfo) {}

    fn on_route_unselected(&mut self, registry: &Registry, route: &RouteInfo, reason: UnselectReason) {}

    fn on_provider_added(&mut self, registry: &Registry, provider: ProviderId, metadata: &ProviderMetadata) {}

    fn on_provider_removed(&mut self, registry: &Registry, provider: ProviderId, metadata: &ProviderMetadata) {}

    fn on_provider_changed(&mut self, registry: &Registry, provider: ProviderId, metadata: &ProviderMetadata) {}
}

/// Queued notification, delivered once the current operation completes.
#[derive(Debug, Clone)]
pub(crate) enum RouterEvent {
    RouteAdded(RouteInfo),
    RouteRemoved(RouteInfo),
    RouteChanged(RouteInfo),
    RouteVolumeChanged(RouteInfo),
    RoutePresentationDisplayChanged(RouteInfo),
    RouteSelected(RouteInfo),
    RouteUnselected(RouteInfo, UnselectReason),
    ProviderAdded(ProviderId, ProviderMetadata),
    ProviderRemoved(ProviderId, ProviderMetadata),
    ProviderChanged(ProviderId, ProviderMetadata),
}

impl RouterEvent {
    fn route(&self) -> Option<&RouteInfo> {
        match self {
            RouterEvent::RouteAdded(r)
            | RouterEvent::RouteRemoved(r)
            | RouterEvent::RouteChanged(r)
            | RouterEvent::RouteVolumeChanged(r)
            | RouterEvent::RoutePresentationDisplayChanged(r)
            | RouterEvent::RouteSelected(r)
            | RouterEvent::RouteUnselected(r, _) => Some(r),
            RouterEvent::ProviderAdded(..)
            | RouterEvent::ProviderRemoved(..)
            | RouterEvent::ProviderChanged(..) => None,
        }
    }

    fn deliver(&self, callback: &mut dyn RouterCallback, registry: &Registry) {
        match self {
            RouterEvent::RouteAdded(r) => callback.on_route_added(registry, r),
            RouterEvent::RouteRemoved(r) => callback.on_route_removed(registry, r),
            RouterEvent::RouteChanged(r) => callback.on_route_changed(registry, r),
            RouterEvent::RouteVolumeChanged(r) => callback.on_route_volume_changed(registry, r),
            RouterEvent::RoutePresentationDisplayChanged(r) => {
                callback.on_route_presentation_display_changed(registry, r)
            }
            RouterEvent::RouteSelected(r) => callback.on_route_selected(registry, r),
            RouterEvent::RouteUnselected(r, reason) => {
                callback.on_route_unselected(registry, r, *reason)
            }
            RouterEvent::ProviderAdded(id, m) => callback.on_provider_added(registry, *id, m),
            RouterEvent::ProviderRemoved(id, m) => callback.on_provider_removed(registry, *id, m),
            RouterEvent::ProviderChanged(id, m) => callback.on_provider_changed(registry, *id, m),
        }
    }
}

pub(crate) struct CallbackRecord {
    pub(crate) id: CallbackId,
    pub(crate) selector: RouteSelector,
    pub(crate) flags: CallbackFlags,
    pub(crate) callback: Box<dyn RouterCallback>,
}

impl CallbackRecord {
    fn wants(&self, event: &RouterEvent) -> bool {
        match event.route() {
            Some(route) => {
                self.flags.contains(CallbackFlags::UNFILTERED_EVENTS)
                    || route.matches_selector(&self.selector)
            }
            None => true,
        }
    }
}

#[derive(Default)]
pub(crate) struct RouterRecord {
    pub(crate) callbacks: Vec<CallbackRecord>,
}

pub(crate) type Routers = BTreeMap<RouterId, RouterRecord>;

/// Deliver `events` in order to every interested callback.
pub(crate) fn dispatch(routers: &mut Routers, registry: &Registry, events: &[RouterEvent]) {
    for event in events {
        for router in routers.values_mut() {
            for record in router.callbacks.iter_mut() {
                if record.wants(event) {
                    event.deliver(record.callback.as_mut(), registry);
                }
            }
        }
    }
}
