// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery requests.

use super::selector::RouteSelector;
use crate::error::DescriptorError;
use serde::{Deserialize, Serialize};

/// What routes are of interest, and whether providers should scan actively.
///
/// Equality is structural; the registry and the service dispatcher only push a
/// new request to providers when it differs from the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    #[serde(default)]
    selector: RouteSelector,
    #[serde(default)]
    active_scan: bool,
}

impl DiscoveryRequest {
    pub fn new(selector: RouteSelector, active_scan: bool) -> Self {
        Self {
            selector,
            active_scan,
        }
    }

    pub fn selector(&self) -> &RouteSelector {
        &self.selector
    }

    pub fn is_active_scan(&self) -> bool {
        self.active_scan
    }

    pub fn is_valid(&self) -> bool {
        self.selector.is_valid()
    }

    pub fn as_bundle(&self) -> Result<serde_json::Value, DescriptorError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_bundle(bundle: &serde_json::Value) -> Result<Self, DescriptorError> {
        Ok(Self::deserialize(bundle)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::control::CATEGORY_LIVE_AUDIO;

    #[test]
    fn test_round_trip() {
        let request =
            DiscoveryRequest::new(RouteSelector::from_categories([CATEGORY_LIVE_AUDIO]), true);
        let bundle = request.as_bundle().unwrap();
        assert_eq!(DiscoveryRequest::from_bundle(&bundle).unwrap(), request);
    }

    #[test]
    fn test_structural_equality() {
        let a = DiscoveryRequest::new(RouteSelector::from_categories(["x", "y"]), false);
        let b = DiscoveryRequest::new(RouteSelector::from_categories(["x", "y"]), false);
        let c = DiscoveryRequest::new(RouteSelector::from_categories(["x", "y"]), true);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
