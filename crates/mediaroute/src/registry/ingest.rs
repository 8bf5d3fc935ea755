// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Merging a provider's published descriptor into the route table.

use super::callback::RouterEvent;
use super::provider_info::RouteSlot;
use super::route_info::{ChangeFlags, RouteInfo};
use super::Registry;
use crate::descriptor::{ProviderDescriptor, RouteDescriptor};
use std::sync::Arc;
use tracing::{debug, warn};

impl Registry {
    /// Reconcile provider `index`'s routes with `descriptor`.
    ///
    /// Routes are matched by descriptor id. New routes are inserted in
    /// published order, existing ones are moved into place and updated, and
    /// routes the descriptor no longer lists are removed once the selection
    /// has been moved off them. Groups are resolved after all plain routes so
    /// their members are known.
    pub(crate) fn update_provider_contents(
        &mut self,
        index: usize,
        descriptor: Option<Arc<ProviderDescriptor>>,
    ) {
        if !self.providers[index].update_descriptor(descriptor.clone()) {
            return;
        }
        let provider_id = self.providers[index].id;
        let identity = self.providers[index].metadata.identity().to_string();
        let system = self.providers[index].metadata.is_system();

        let mut target = 0;
        let mut selected_changed = false;
        let mut added_groups: Vec<(String, RouteDescriptor)> = Vec::new();
        let mut updated_groups: Vec<(String, RouteDescriptor)> = Vec::new();

        for route in descriptor.iter().flat_map(|d| d.routes()) {
            if !route.is_valid() {
                warn!("{}: ignoring invalid route {:?}", identity, route.id());
                continue;
            }
            match self.providers[index].find_route(route.id()) {
                None => {
                    let routes = &self.routes;
                    let unique_id = match self.unique_ids.assign(&identity, route.id(), |u| {
                        routes.contains_key(u)
                    }) {
                        Ok(unique_id) => unique_id,
                        Err(e) => {
                            warn!("{}: skipping route: {}", identity, e);
                            continue;
                        }
                    };
                    self.providers[index].routes.insert(
                        target,
                        RouteSlot {
                            descriptor_id: route.id().to_string(),
                            unique_id: unique_id.clone(),
                        },
                    );
                    target += 1;

                    let info =
                        RouteInfo::new(unique_id.clone(), provider_id, &identity, system, route.clone());
                    self.routes.insert(unique_id.clone(), info.clone());
                    self.route_order.push(unique_id.clone());
                    if route.is_group() {
                        added_groups.push((unique_id, route.clone()));
                    } else {
                        debug!("Route added: {}", unique_id);
                        self.push_event(RouterEvent::RouteAdded(info));
                    }
                }
                Some(source) if source < target => {
                    warn!("{}: ignoring duplicate route id {}", identity, route.id());
                }
                Some(source) => {
                    self.providers[index].routes.swap(source, target);
                    let unique_id = self.providers[index].routes[target].unique_id.clone();
                    target += 1;
                    if route.is_group() {
                        updated_groups.push((unique_id, route.clone()));
                    } else if self.apply_route_descriptor(&unique_id, route.clone(), None)
                        && self.selected_route.as_deref() == Some(unique_id.as_str())
                    {
                        selected_changed = true;
                    }
                }
            }
        }

        for (unique_id, route) in added_groups {
            let members = self.resolve_members(index, target, &route);
            if let Some(info) = self.routes.get_mut(&unique_id) {
                info.update_descriptor(route, Some(members));
                debug!("Route added: {}", unique_id);
                let snapshot = info.clone();
                self.push_event(RouterEvent::RouteAdded(snapshot));
            }
        }
        for (unique_id, route) in updated_groups {
            let members = self.resolve_members(index, target, &route);
            if self.apply_route_descriptor(&unique_id, route, Some(members))
                && self.selected_route.as_deref() == Some(unique_id.as_str())
            {
                selected_changed = true;
            }
        }

        let removed = self.providers[index].routes.split_off(target);
        for slot in &removed {
            if let Some(info) = self.routes.get_mut(&slot.unique_id) {
                info.mark_removed();
            }
        }
        if !removed.is_empty() {
            self.route_order
                .retain(|id| !removed.iter().any(|slot| &slot.unique_id == id));
        }

        self.update_selected_route_if_needed(selected_changed);

        for slot in removed.into_iter().rev() {
            if let Some(info) = self.routes.remove(&slot.unique_id) {
                debug!("Route removed: {}", slot.unique_id);
                self.push_event(RouterEvent::RouteRemoved(info));
            }
        }

        let metadata = self.providers[index].metadata.clone();
        self.push_event(RouterEvent::ProviderChanged(provider_id, metadata));
    }

    /// Update one route and queue its change events. Returns true on any
    /// change.
    fn apply_route_descriptor(
        &mut self,
        unique_id: &str,
        descriptor: RouteDescriptor,
        members: Option<Vec<String>>,
    ) -> bool {
        let Some(info) = self.routes.get_mut(unique_id) else {
            return false;
        };
        let flags = info.update_descriptor(descriptor, members);
        if !flags.any() {
            return false;
        }
        debug!("Route changed: {} {:?}", unique_id, flags);
        let snapshot = info.clone();
        let ChangeFlags {
            general,
            volume,
            presentation_display,
        } = flags;
        if general {
            self.push_event(RouterEvent::RouteChanged(snapshot.clone()));
        }
        if volume {
            self.push_event(RouterEvent::RouteVolumeChanged(snapshot.clone()));
        }
        if presentation_display {
            self.push_event(RouterEvent::RoutePresentationDisplayChanged(snapshot));
        }
        true
    }

    /// Unique ids of a group's members among the provider's live routes.
    fn resolve_members(&self, index: usize, live: usize, group: &RouteDescriptor) -> Vec<String> {
        let slots = &self.providers[index].routes[..live];
        group
            .group_member_ids()
            .unwrap_or_default()
            .iter()
            .filter_map(|member| {
                let slot = slots.iter().find(|s| &s.descriptor_id == member);
                if slot.is_none() {
                    debug!("Group {} lists unknown member {}", group.id(), member);
                }
                slot
            })
            .filter(|slot| slot.descriptor_id != group.id())
            .map(|slot| slot.unique_id.clone())
            .collect()
    }
}
