// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Provider capability.
//!
//! A provider publishes a [`ProviderDescriptor`], reacts to the aggregated
//! [`DiscoveryRequest`], and creates [`RouteController`]s for its routes. The
//! registry consumes providers through [`MediaRouteProvider`] regardless of
//! whether they run in-process ([`LocalProvider`]) or behind a service
//! endpoint ([`crate::remote::RemoteProviderProxy`]).

pub mod controller;
pub mod local;

pub use controller::{
    ControlRequestCallback, ControlRequestError, ControlResult, RouteController, UnselectReason,
};
pub use local::{DescriptorPublisher, LocalProvider, LocalRouteHandler};

use crate::descriptor::{DiscoveryRequest, ProviderDescriptor};
use std::fmt;
use std::sync::Arc;

/// Static identity of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderMetadata {
    identity: String,
    system: bool,
}

impl ProviderMetadata {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            system: false,
        }
    }

    /// Metadata of the system provider, owner of the default route.
    pub fn system(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            system: true,
        }
    }

    /// Stable identity used to derive unique route ids.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn is_system(&self) -> bool {
        self.system
    }
}

/// Notification hook a provider fires when its descriptor changes.
///
/// Safe to call from any thread; the consumer re-reads the descriptor on its
/// own control thread.
#[derive(Clone)]
pub struct DescriptorListener(Arc<dyn Fn() + Send + Sync>);

impl DescriptorListener {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn notify(&self) {
        (self.0)();
    }
}

impl fmt::Debug for DescriptorListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DescriptorListener")
    }
}

/// A component publishing routes.
pub trait MediaRouteProvider {
    fn metadata(&self) -> &ProviderMetadata;

    /// Current descriptor, `None` while nothing is published.
    fn descriptor(&self) -> Option<Arc<ProviderDescriptor>>;

    /// Install (or clear) the descriptor-change hook.
    fn set_descriptor_listener(&mut self, listener: Option<DescriptorListener>);

    /// Push the composite discovery request; `None` when discovery is idle.
    fn set_discovery_request(&mut self, request: Option<&DiscoveryRequest>);

    /// Create a controller for `route_id`, optionally as a member of
    /// `group_route_id`.
    fn create_route_controller(
        &mut self,
        route_id: &str,
        group_route_id: Option<&str>,
    ) -> Option<Box<dyn RouteController>>;
}
