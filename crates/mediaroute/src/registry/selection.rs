// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Default, bluetooth and selected route tracking.

use super::callback::RouterEvent;
use super::{PlaybackInfo, Registry, RouteInfo};
use crate::descriptor::RouteSelector;
use crate::error::{Result, RouterError};
use crate::provider::{RouteController, UnselectReason};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

impl Registry {
    /// Select a route by unique id.
    pub fn select_route(&mut self, unique_id: &str) -> Result<()> {
        let route = self
            .route(unique_id)
            .ok_or_else(|| RouterError::UntrackedRoute(unique_id.to_string()))?;
        if !route.is_enabled() {
            return Err(RouterError::DisabledRoute(unique_id.to_string()));
        }
        self.set_selected_route(Some(unique_id.to_string()), UnselectReason::RouteChanged);
        self.dispatch_events();
        Ok(())
    }

    /// Move the selection to the fallback route.
    ///
    /// Fails with [`RouterError::NotReady`] until a default route exists.
    pub fn unselect(&mut self, reason: UnselectReason) -> Result<()> {
        self.default_route()?;
        let fallback = self.choose_fallback_route();
        self.set_selected_route(fallback, reason);
        self.dispatch_events();
        Ok(())
    }

    /// Keep the selection only if it is the default or bluetooth route or
    /// matches `selector`; otherwise fall back. Returns the selected route.
    pub fn update_selected_route(&mut self, selector: &RouteSelector) -> Result<&RouteInfo> {
        self.default_route()?;
        let keep = {
            let selected = self.selected_route()?;
            self.is_default_or_bluetooth(selected) || selected.matches_selector(selector)
        };
        if !keep {
            let fallback = self.choose_fallback_route();
            self.set_selected_route(fallback, UnselectReason::RouteChanged);
            self.dispatch_events();
        }
        self.selected_route()
    }

    /// First selectable system route that is live-audio only, else the
    /// default route.
    pub(crate) fn choose_fallback_route(&self) -> Option<String> {
        self.route_order
            .iter()
            .filter_map(|id| self.routes.get(id))
            .find(|r| {
                self.default_route.as_deref() != Some(r.unique_id())
                    && r.is_system_live_audio_only()
                    && r.is_selectable()
            })
            .map(|r| r.unique_id().to_string())
            .or_else(|| self.default_route.clone())
    }

    fn is_selectable(&self, unique_id: &str) -> bool {
        self.routes.get(unique_id).is_some_and(RouteInfo::is_selectable)
    }

    /// Restore the default/bluetooth/selected invariants after routes
    /// changed.
    pub(crate) fn update_selected_route_if_needed(&mut self, selected_descriptor_changed: bool) {
        if let Some(id) = self.default_route.clone() {
            if !self.is_selectable(&id) {
                info!("Clearing the default route because it is no longer selectable: {}", id);
                self.default_route = None;
            }
        }
        if self.default_route.is_none() {
            self.default_route = self
                .route_order
                .iter()
                .filter_map(|id| self.routes.get(id))
                .find(|r| r.is_default_candidate() && r.is_selectable())
                .map(|r| r.unique_id().to_string());
            if let Some(id) = &self.default_route {
                info!("Found default route: {}", id);
            }
        }

        if let Some(id) = self.bluetooth_route.clone() {
            if !self.is_selectable(&id) {
                info!("Clearing the bluetooth route because it is no longer selectable: {}", id);
                self.bluetooth_route = None;
            }
        }
        if self.bluetooth_route.is_none() {
            self.bluetooth_route = self
                .route_order
                .iter()
                .filter_map(|id| self.routes.get(id))
                .find(|r| r.is_system_live_audio_only() && r.is_selectable())
                .map(|r| r.unique_id().to_string());
            if let Some(id) = &self.bluetooth_route {
                info!("Found bluetooth route: {}", id);
            }
        }

        match self.selected_route.clone() {
            Some(id) if !self.is_selectable(&id) => {
                info!("Unselecting the current route because it is no longer selectable: {}", id);
                let fallback = self.choose_fallback_route();
                self.set_selected_route(fallback, UnselectReason::Unknown);
            }
            None => {
                if let Some(fallback) = self.choose_fallback_route() {
                    self.set_selected_route(Some(fallback), UnselectReason::Unknown);
                }
            }
            Some(id) if selected_descriptor_changed => {
                if self.routes.get(&id).is_some_and(RouteInfo::is_group) {
                    self.sync_member_controllers();
                }
                self.update_playback_info();
            }
            Some(_) => {}
        }
    }

    /// Swap the selection, releasing the old controllers before creating the
    /// new ones. Queues the unselected event ahead of the selected one.
    pub(crate) fn set_selected_route(&mut self, target: Option<String>, reason: UnselectReason) {
        if self.selected_route == target {
            return;
        }

        if let Some(old) = self.selected_route.take() {
            info!("Route unselected: {} (reason: {})", old, reason);
            if let Some(mut controller) = self.selected_controller.take() {
                controller.on_unselect(reason);
                controller.on_release();
            }
            for (_, mut controller) in std::mem::take(&mut self.member_controllers) {
                controller.on_unselect(reason);
                controller.on_release();
            }
            if let Some(info) = self.routes.get(&old) {
                let snapshot = info.clone();
                self.push_event(RouterEvent::RouteUnselected(snapshot, reason));
            }
        }

        if let Some(new) = target {
            let Some(route) = self.routes.get(&new).cloned() else {
                warn!("Cannot select untracked route {}", new);
                self.update_playback_info();
                return;
            };
            self.selected_route = Some(new.clone());
            self.selected_controller = self.create_controller(&route, None);
            if let Some(controller) = self.selected_controller.as_mut() {
                controller.on_select();
            }
            if route.is_group() {
                self.sync_member_controllers();
            }
            info!("Route selected: {}", new);
            self.push_event(RouterEvent::RouteSelected(route));
        }
        self.update_playback_info();
    }

    fn create_controller(
        &mut self,
        route: &RouteInfo,
        group: Option<&RouteInfo>,
    ) -> Option<Box<dyn RouteController>> {
        let index = self.provider_index(route.provider())?;
        let controller = self.providers[index]
            .provider
            .create_route_controller(route.descriptor_id(), group.map(RouteInfo::descriptor_id));
        if controller.is_none() {
            debug!("{} has no controller for {}", route.provider_identity(), route.unique_id());
        }
        controller
    }

    /// Reconcile member controllers with the selected group's members.
    fn sync_member_controllers(&mut self) {
        let Some(group) = self
            .selected_route
            .as_ref()
            .and_then(|id| self.routes.get(id))
            .cloned()
        else {
            return;
        };
        let wanted: BTreeSet<&str> = group.members().iter().map(String::as_str).collect();

        let stale: Vec<String> = self
            .member_controllers
            .keys()
            .filter(|id| !wanted.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            if let Some(mut controller) = self.member_controllers.remove(&id) {
                controller.on_unselect(UnselectReason::Unknown);
                controller.on_release();
            }
        }

        for member_id in group.members() {
            if self.member_controllers.contains_key(member_id) {
                continue;
            }
            let Some(member) = self.routes.get(member_id).cloned() else {
                continue;
            };
            if let Some(mut controller) = self.create_controller(&member, Some(&group)) {
                controller.on_select();
                self.member_controllers.insert(member_id.clone(), controller);
            }
        }
    }

    fn update_playback_info(&mut self) {
        self.playback_info = self
            .selected_route
            .as_ref()
            .and_then(|id| self.routes.get(id))
            .map(|route| {
                let d = route.descriptor();
                PlaybackInfo {
                    playback_type: d.playback_type(),
                    playback_stream: d.playback_stream(),
                    volume: d.volume(),
                    volume_max: d.volume_max(),
                    volume_handling: d.volume_handling(),
                }
            });
    }
}
