// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registry-side route records.

use super::ProviderId;
use crate::descriptor::{
    ControlRequest, RouteDescriptor, RouteSelector, VolumeHandling, DEFAULT_ROUTE_ID,
};

/// Which parts of a route changed on a descriptor update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeFlags {
    pub general: bool,
    pub volume: bool,
    pub presentation_display: bool,
}

impl ChangeFlags {
    pub fn any(self) -> bool {
        self.general || self.volume || self.presentation_display
    }
}

/// A route tracked by the registry.
///
/// Owns the latest descriptor published for the route plus its globally
/// unique id. Group routes also carry the unique ids of their members.
/// Snapshots handed to callbacks are plain clones.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteInfo {
    unique_id: String,
    descriptor_id: String,
    provider: ProviderId,
    provider_identity: String,
    system: bool,
    descriptor: RouteDescriptor,
    members: Option<Vec<String>>,
    live: bool,
}

impl RouteInfo {
    pub(crate) fn new(
        unique_id: String,
        provider: ProviderId,
        provider_identity: &str,
        system: bool,
        descriptor: RouteDescriptor,
    ) -> Self {
        let members = descriptor.is_group().then(Vec::new);
        Self {
            unique_id,
            descriptor_id: descriptor.id().to_string(),
            provider,
            provider_identity: provider_identity.to_string(),
            system,
            descriptor,
            members,
            live: true,
        }
    }

    /// Globally unique id, stable for a (provider identity, descriptor id)
    /// pair.
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Provider-local id.
    pub fn descriptor_id(&self) -> &str {
        &self.descriptor_id
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn provider_identity(&self) -> &str {
        &self.provider_identity
    }

    /// Latest descriptor. Removed routes keep their last descriptor.
    pub fn descriptor(&self) -> &RouteDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// False once the provider stopped publishing the route.
    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn is_enabled(&self) -> bool {
        self.descriptor.is_enabled()
    }

    pub fn is_selectable(&self) -> bool {
        self.live && self.descriptor.is_enabled()
    }

    pub fn is_group(&self) -> bool {
        self.members.is_some()
    }

    /// Unique ids of the member routes (empty unless a group).
    pub fn members(&self) -> &[String] {
        self.members.as_deref().unwrap_or_default()
    }

    pub fn is_system_route(&self) -> bool {
        self.system
    }

    /// The system provider's default route.
    pub fn is_default_candidate(&self) -> bool {
        self.system && self.descriptor_id == DEFAULT_ROUTE_ID
    }

    /// A system route that plays live audio but no video (e.g. a paired
    /// bluetooth sink).
    pub fn is_system_live_audio_only(&self) -> bool {
        self.system && !self.is_default_candidate() && self.descriptor.is_live_audio_only()
    }

    pub fn matches_selector(&self, selector: &RouteSelector) -> bool {
        selector.matches_control_filters(self.descriptor.control_filters())
    }

    pub fn supports_control_category(&self, category: &str) -> bool {
        self.descriptor.supports_control_category(category)
    }

    pub fn supports_control_request(&self, request: &ControlRequest) -> bool {
        self.descriptor.supports_control_request(request)
    }

    pub fn volume(&self) -> i32 {
        self.descriptor.volume()
    }

    pub fn volume_max(&self) -> i32 {
        self.descriptor.volume_max()
    }

    pub fn volume_handling(&self) -> VolumeHandling {
        self.descriptor.volume_handling()
    }

    /// Install a new descriptor and report what changed.
    pub(crate) fn update_descriptor(
        &mut self,
        descriptor: RouteDescriptor,
        members: Option<Vec<String>>,
    ) -> ChangeFlags {
        let old = &self.descriptor;
        let mut flags = ChangeFlags {
            general: false,
            volume: old.volume() != descriptor.volume()
                || old.volume_max() != descriptor.volume_max()
                || old.volume_handling() != descriptor.volume_handling(),
            presentation_display: old.presentation_display_id()
                != descriptor.presentation_display_id(),
        };
        flags.general = strip_mirrored(old) != strip_mirrored(&descriptor) || self.members != members;
        self.descriptor = descriptor;
        self.members = members;
        flags
    }

    pub(crate) fn mark_removed(&mut self) {
        self.live = false;
    }
}

/// Descriptor with the volume and presentation fields blanked, so general
/// changes can be told apart from volume-only or display-only changes.
fn strip_mirrored(descriptor: &RouteDescriptor) -> RouteDescriptor {
    descriptor
        .to_builder()
        .volume(0)
        .volume_max(0)
        .volume_handling(VolumeHandling::Fixed)
        .presentation_display_id(None)
        .build()
}
