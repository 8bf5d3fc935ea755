// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::ProviderId;
use crate::descriptor::ProviderDescriptor;
use crate::provider::{MediaRouteProvider, ProviderMetadata};
use std::sync::Arc;

/// Position of one of a provider's routes in its published order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RouteSlot {
    pub(crate) descriptor_id: String,
    pub(crate) unique_id: String,
}

/// Registry bookkeeping for one added provider.
pub(crate) struct ProviderInfo {
    pub(crate) id: ProviderId,
    pub(crate) provider: Box<dyn MediaRouteProvider>,
    pub(crate) metadata: ProviderMetadata,
    descriptor: Option<Arc<ProviderDescriptor>>,
    pub(crate) routes: Vec<RouteSlot>,
}

impl ProviderInfo {
    pub(crate) fn new(id: ProviderId, provider: Box<dyn MediaRouteProvider>) -> Self {
        let metadata = provider.metadata().clone();
        Self {
            id,
            provider,
            metadata,
            descriptor: None,
            routes: Vec::new(),
        }
    }

    /// Store `descriptor`; false if it equals the last one ingested.
    pub(crate) fn update_descriptor(&mut self, descriptor: Option<Arc<ProviderDescriptor>>) -> bool {
        if self.descriptor.as_deref() == descriptor.as_deref() {
            return false;
        }
        self.descriptor = descriptor;
        true
    }

    pub(crate) fn find_route(&self, descriptor_id: &str) -> Option<usize> {
        self.routes
            .iter()
            .position(|slot| slot.descriptor_id == descriptor_id)
    }
}
