// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Route descriptors.
//!
//! A [`RouteDescriptor`] is an immutable snapshot of one route as published by
//! a provider. Providers replace descriptors wholesale; nothing mutates a
//! descriptor in place. Use [`RouteDescriptor::to_builder`] to derive a
//! modified copy.

use super::control::{
    ControlFilter, ControlRequest, Extras, CATEGORY_LIVE_AUDIO, CATEGORY_LIVE_VIDEO,
};
use crate::error::DescriptorError;
use serde::{Deserialize, Serialize};

/// Descriptor id the system provider uses for its default route.
pub const DEFAULT_ROUTE_ID: &str = "DEFAULT_ROUTE";

/// Connection state of a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Where the media is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackType {
    /// Played by this device (speaker, wired headset, bluetooth sink).
    Local,
    /// Played by a remote device.
    #[default]
    Remote,
}

/// Kind of output device behind a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    #[default]
    Unknown,
    Tv,
    Speaker,
    Bluetooth,
}

/// Whether the route volume can be changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeHandling {
    #[default]
    Fixed,
    Variable,
}

fn default_true() -> bool {
    true
}

fn default_playback_stream() -> i32 {
    -1
}

fn default_min_client_version() -> i32 {
    1
}

fn default_max_client_version() -> i32 {
    i32::MAX
}

/// Immutable description of a single route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    id: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    icon_uri: Option<String>,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    connection_state: ConnectionState,
    #[serde(default)]
    can_disconnect: bool,
    #[serde(default)]
    control_filters: Vec<ControlFilter>,
    #[serde(default)]
    playback_type: PlaybackType,
    #[serde(default = "default_playback_stream")]
    playback_stream: i32,
    #[serde(default)]
    device_type: DeviceType,
    #[serde(default)]
    volume: i32,
    #[serde(default)]
    volume_max: i32,
    #[serde(default)]
    volume_handling: VolumeHandling,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    presentation_display_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group_member_ids: Option<Vec<String>>,
    #[serde(default = "default_min_client_version")]
    min_client_version: i32,
    #[serde(default = "default_max_client_version")]
    max_client_version: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extras: Option<Extras>,
}

impl RouteDescriptor {
    /// Start building a descriptor with the mandatory id and name.
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> RouteDescriptorBuilder {
        RouteDescriptorBuilder {
            descriptor: RouteDescriptor {
                id: id.into(),
                name: name.into(),
                description: None,
                icon_uri: None,
                enabled: true,
                connection_state: ConnectionState::Disconnected,
                can_disconnect: false,
                control_filters: Vec::new(),
                playback_type: PlaybackType::Remote,
                playback_stream: -1,
                device_type: DeviceType::Unknown,
                volume: 0,
                volume_max: 0,
                volume_handling: VolumeHandling::Fixed,
                presentation_display_id: None,
                group_member_ids: None,
                min_client_version: default_min_client_version(),
                max_client_version: default_max_client_version(),
                extras: None,
            },
        }
    }

    /// Builder seeded with a copy of this descriptor.
    pub fn to_builder(&self) -> RouteDescriptorBuilder {
        RouteDescriptorBuilder {
            descriptor: self.clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn icon_uri(&self) -> Option<&str> {
        self.icon_uri.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn can_disconnect(&self) -> bool {
        self.can_disconnect
    }

    pub fn control_filters(&self) -> &[ControlFilter] {
        &self.control_filters
    }

    pub fn playback_type(&self) -> PlaybackType {
        self.playback_type
    }

    pub fn playback_stream(&self) -> i32 {
        self.playback_stream
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn volume(&self) -> i32 {
        self.volume
    }

    pub fn volume_max(&self) -> i32 {
        self.volume_max
    }

    pub fn volume_handling(&self) -> VolumeHandling {
        self.volume_handling
    }

    pub fn presentation_display_id(&self) -> Option<i32> {
        self.presentation_display_id
    }

    /// Member descriptor ids when this route is a group.
    pub fn group_member_ids(&self) -> Option<&[String]> {
        self.group_member_ids.as_deref()
    }

    pub fn is_group(&self) -> bool {
        self.group_member_ids.is_some()
    }

    pub fn min_client_version(&self) -> i32 {
        self.min_client_version
    }

    pub fn max_client_version(&self) -> i32 {
        self.max_client_version
    }

    pub fn extras(&self) -> Option<&Extras> {
        self.extras.as_ref()
    }

    /// True if `version` falls in `[min_client_version, max_client_version]`.
    pub fn supports_client_version(&self, version: i32) -> bool {
        self.min_client_version <= version && version <= self.max_client_version
    }

    /// True if the route plays live audio but cannot present live video.
    pub fn is_live_audio_only(&self) -> bool {
        self.supports_control_category(CATEGORY_LIVE_AUDIO)
            && !self.supports_control_category(CATEGORY_LIVE_VIDEO)
    }

    pub fn supports_control_category(&self, category: &str) -> bool {
        self.control_filters.iter().any(|f| f.has_category(category))
    }

    pub fn supports_control_request(&self, request: &ControlRequest) -> bool {
        self.control_filters.iter().any(|f| f.matches(request))
    }

    /// A descriptor is valid when its id and name are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty()
    }

    /// Encode into the wire form.
    pub fn as_bundle(&self) -> Result<serde_json::Value, DescriptorError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode from the wire form.
    pub fn from_bundle(bundle: &serde_json::Value) -> Result<Self, DescriptorError> {
        Ok(Self::deserialize(bundle)?)
    }
}

/// Builder for [`RouteDescriptor`].
#[derive(Debug, Clone)]
pub struct RouteDescriptorBuilder {
    descriptor: RouteDescriptor,
}

impl RouteDescriptorBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.descriptor.id = id.into();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.descriptor.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.description = Some(description.into());
        self
    }

    pub fn icon_uri(mut self, icon_uri: impl Into<String>) -> Self {
        self.descriptor.icon_uri = Some(icon_uri.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.descriptor.enabled = enabled;
        self
    }

    pub fn connection_state(mut self, state: ConnectionState) -> Self {
        self.descriptor.connection_state = state;
        self
    }

    pub fn can_disconnect(mut self, can_disconnect: bool) -> Self {
        self.descriptor.can_disconnect = can_disconnect;
        self
    }

    pub fn add_control_filter(mut self, filter: ControlFilter) -> Self {
        if !self.descriptor.control_filters.contains(&filter) {
            self.descriptor.control_filters.push(filter);
        }
        self
    }

    pub fn control_filters(mut self, filters: Vec<ControlFilter>) -> Self {
        self.descriptor.control_filters.clear();
        for filter in filters {
            self = self.add_control_filter(filter);
        }
        self
    }

    pub fn playback_type(mut self, playback_type: PlaybackType) -> Self {
        self.descriptor.playback_type = playback_type;
        self
    }

    pub fn playback_stream(mut self, stream: i32) -> Self {
        self.descriptor.playback_stream = stream;
        self
    }

    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.descriptor.device_type = device_type;
        self
    }

    pub fn volume(mut self, volume: i32) -> Self {
        self.descriptor.volume = volume;
        self
    }

    pub fn volume_max(mut self, volume_max: i32) -> Self {
        self.descriptor.volume_max = volume_max;
        self
    }

    pub fn volume_handling(mut self, handling: VolumeHandling) -> Self {
        self.descriptor.volume_handling = handling;
        self
    }

    pub fn presentation_display_id(mut self, display_id: Option<i32>) -> Self {
        self.descriptor.presentation_display_id = display_id;
        self
    }

    /// Mark the route as a group of the given member descriptor ids.
    pub fn group_member_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.descriptor.group_member_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn client_version_range(mut self, min: i32, max: i32) -> Self {
        self.descriptor.min_client_version = min;
        self.descriptor.max_client_version = max;
        self
    }

    pub fn extras(mut self, extras: Extras) -> Self {
        self.descriptor.extras = Some(extras);
        self
    }

    pub fn build(self) -> RouteDescriptor {
        self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::control::CATEGORY_REMOTE_PLAYBACK;

    fn speaker() -> RouteDescriptor {
        RouteDescriptor::builder("speaker", "Kitchen speaker")
            .description("Wi-Fi speaker")
            .add_control_filter(ControlFilter::new().with_category(CATEGORY_LIVE_AUDIO))
            .playback_type(PlaybackType::Remote)
            .device_type(DeviceType::Speaker)
            .volume(4)
            .volume_max(10)
            .volume_handling(VolumeHandling::Variable)
            .build()
    }

    #[test]
    fn test_builder_defaults() {
        let d = RouteDescriptor::builder("a", "A").build();
        assert!(d.is_enabled());
        assert_eq!(d.playback_stream(), -1);
        assert_eq!(d.min_client_version(), 1);
        assert_eq!(d.max_client_version(), i32::MAX);
        assert!(!d.is_group());
        assert!(d.is_valid());
    }

    #[test]
    fn test_validity() {
        assert!(!RouteDescriptor::builder("", "A").build().is_valid());
        assert!(!RouteDescriptor::builder("a", "").build().is_valid());
    }

    #[test]
    fn test_bundle_round_trip() {
        let d = speaker()
            .to_builder()
            .group_member_ids(["x", "y"])
            .presentation_display_id(Some(3))
            .build();
        let bundle = d.as_bundle().unwrap();
        assert_eq!(RouteDescriptor::from_bundle(&bundle).unwrap(), d);
    }

    #[test]
    fn test_from_bundle_fills_defaults() {
        let bundle = serde_json::json!({ "id": "x", "name": "X" });
        let d = RouteDescriptor::from_bundle(&bundle).unwrap();
        assert!(d.is_enabled());
        assert_eq!(d.max_client_version(), i32::MAX);
    }

    #[test]
    fn test_from_bundle_rejects_missing_id() {
        let bundle = serde_json::json!({ "name": "X" });
        assert!(RouteDescriptor::from_bundle(&bundle).is_err());
    }

    #[test]
    fn test_live_audio_only() {
        assert!(speaker().is_live_audio_only());
        let playback = speaker()
            .to_builder()
            .add_control_filter(ControlFilter::new().with_category(CATEGORY_REMOTE_PLAYBACK))
            .build();
        assert!(playback.is_live_audio_only());
        let tv = speaker()
            .to_builder()
            .add_control_filter(ControlFilter::new().with_category(CATEGORY_LIVE_VIDEO))
            .build();
        assert!(!tv.is_live_audio_only());
        assert!(!RouteDescriptor::builder("a", "A").build().is_live_audio_only());
    }

    #[test]
    fn test_client_version_window() {
        let d = speaker().to_builder().client_version_range(2, 3).build();
        assert!(!d.supports_client_version(1));
        assert!(d.supports_client_version(2));
        assert!(d.supports_client_version(3));
        assert!(!d.supports_client_version(4));
    }
}
