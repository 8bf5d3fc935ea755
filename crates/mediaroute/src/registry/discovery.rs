// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{AvailabilityFlags, CallbackFlags, Registry};
use crate::descriptor::{DiscoveryRequest, RouteSelector};
use tracing::info;

impl Registry {
    /// Recompute the composite discovery request from every callback and
    /// push it to all providers if it changed.
    pub(crate) fn update_discovery_request(&mut self) {
        let mut builder = RouteSelector::builder();
        let mut discover = false;
        let mut active_scan = false;
        for record in self.routers.values().flat_map(|r| r.callbacks.iter()) {
            builder = builder.add_selector(&record.selector);
            if record.flags.contains(CallbackFlags::PERFORM_ACTIVE_SCAN) {
                discover = true;
                active_scan = true;
            }
            if record.flags.contains(CallbackFlags::REQUEST_DISCOVERY)
                && !self.config.low_ram_device
            {
                discover = true;
            }
            if record.flags.contains(CallbackFlags::FORCE_DISCOVERY) {
                discover = true;
            }
        }
        let selector = if discover {
            builder.build()
        } else {
            RouteSelector::EMPTY
        };

        if let Some(current) = &self.discovery_request {
            if current.selector() == &selector && current.is_active_scan() == active_scan {
                return;
            }
        }
        let request = if selector.is_empty() && !active_scan {
            if self.discovery_request.is_none() {
                return;
            }
            None
        } else {
            Some(DiscoveryRequest::new(selector, active_scan))
        };

        match &request {
            Some(r) => info!(
                "Updated discovery request: categories={:?} active_scan={}",
                r.selector().control_categories(),
                r.is_active_scan()
            ),
            None => info!("Discovery stopped"),
        }
        for info in &mut self.providers {
            info.provider.set_discovery_request(request.as_ref());
        }
        self.discovery_request = request;
    }

    /// Whether any route matching `selector` is available.
    ///
    /// Low-RAM devices answer optimistically unless
    /// [`AvailabilityFlags::REQUIRE_MATCH`] is set.
    pub fn is_route_available(&self, selector: &RouteSelector, flags: AvailabilityFlags) -> bool {
        if selector.is_empty() {
            return false;
        }
        if !flags.contains(AvailabilityFlags::REQUIRE_MATCH) && self.config.low_ram_device {
            return true;
        }
        let ignore_default = flags.contains(AvailabilityFlags::IGNORE_DEFAULT_ROUTE);
        self.routes().into_iter().any(|route| {
            !(ignore_default && self.is_default_or_bluetooth(route))
                && route.matches_selector(selector)
        })
    }
}
