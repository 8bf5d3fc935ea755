// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Provider descriptors: the full route set a provider publishes.

use super::route::RouteDescriptor;
use crate::error::DescriptorError;
use serde::{Deserialize, Serialize};

/// Immutable ordered list of the routes a provider currently publishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    #[serde(default)]
    routes: Vec<RouteDescriptor>,
}

impl ProviderDescriptor {
    pub fn new(routes: Vec<RouteDescriptor>) -> Self {
        Self { routes }
    }

    pub fn builder() -> ProviderDescriptorBuilder {
        ProviderDescriptorBuilder::default()
    }

    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    pub fn route(&self, id: &str) -> Option<&RouteDescriptor> {
        self.routes.iter().find(|r| r.id() == id)
    }

    /// Deep validity: every route must be valid.
    pub fn is_valid(&self) -> bool {
        self.routes.iter().all(RouteDescriptor::is_valid)
    }

    /// Copy keeping only the routes whose version window includes `version`.
    pub fn for_client_version(&self, version: i32) -> ProviderDescriptor {
        ProviderDescriptor {
            routes: self
                .routes
                .iter()
                .filter(|r| r.supports_client_version(version))
                .cloned()
                .collect(),
        }
    }

    pub fn as_bundle(&self) -> Result<serde_json::Value, DescriptorError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_bundle(bundle: &serde_json::Value) -> Result<Self, DescriptorError> {
        Ok(Self::deserialize(bundle)?)
    }
}

/// Builder for [`ProviderDescriptor`].
#[derive(Debug, Clone, Default)]
pub struct ProviderDescriptorBuilder {
    routes: Vec<RouteDescriptor>,
}

impl ProviderDescriptorBuilder {
    pub fn add_route(mut self, route: RouteDescriptor) -> Self {
        self.routes.push(route);
        self
    }

    pub fn add_routes<I: IntoIterator<Item = RouteDescriptor>>(mut self, routes: I) -> Self {
        self.routes.extend(routes);
        self
    }

    pub fn build(self) -> ProviderDescriptor {
        ProviderDescriptor {
            routes: self.routes,
        }
    }
}
