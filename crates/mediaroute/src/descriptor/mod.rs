// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Immutable, serializable value types exchanged between providers, the
//! registry and remote peers.
//!
//! Every type here has an `as_bundle` / `from_bundle` pair producing the JSON
//! value used on the wire.

pub mod control;
pub mod discovery;
pub mod provider;
pub mod route;
pub mod selector;

pub use control::{
    ControlFilter, ControlRequest, Extras, CATEGORY_LIVE_AUDIO, CATEGORY_LIVE_VIDEO,
    CATEGORY_REMOTE_PLAYBACK,
};
pub use discovery::DiscoveryRequest;
pub use provider::{ProviderDescriptor, ProviderDescriptorBuilder};
pub use route::{
    ConnectionState, DeviceType, PlaybackType, RouteDescriptor, RouteDescriptorBuilder,
    VolumeHandling, DEFAULT_ROUTE_ID,
};
pub use selector::{RouteSelector, RouteSelectorBuilder};
