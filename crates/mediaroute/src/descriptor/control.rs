// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Control filters and control requests.
//!
//! A route advertises what it can be driven with through an ordered list of
//! [`ControlFilter`]s. Applications match routes against a selector's
//! categories, and send [`ControlRequest`]s that a filter must accept.

use serde::{Deserialize, Serialize};

/// Free-form key/value payload carried by descriptors and control requests.
pub type Extras = serde_json::Map<String, serde_json::Value>;

/// Route control category: the route can play live audio.
pub const CATEGORY_LIVE_AUDIO: &str = "live-audio";

/// Route control category: the route can present live video.
pub const CATEGORY_LIVE_VIDEO: &str = "live-video";

/// Route control category: the route accepts remote playback commands.
pub const CATEGORY_REMOTE_PLAYBACK: &str = "remote-playback";

/// One control capability advertised by a route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFilter {
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    actions: Vec<String>,
}

impl ControlFilter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a control category (duplicates are ignored).
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
        self
    }

    /// Add an accepted action (duplicates are ignored).
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        let action = action.into();
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
        self
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    pub fn has_action(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == action)
    }

    /// Check whether this filter accepts the request.
    ///
    /// The action must be listed, and the request category (if any) must be
    /// one of the filter's categories.
    pub fn matches(&self, request: &ControlRequest) -> bool {
        if !self.has_action(request.action()) {
            return false;
        }
        match request.category() {
            Some(category) => self.has_category(category),
            None => true,
        }
    }
}

/// A control command sent to the selected route's controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extras: Option<Extras>,
}

impl ControlRequest {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            category: None,
            extras: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_extras(mut self, extras: Extras) -> Self {
        self.extras = Some(extras);
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn extras(&self) -> Option<&Extras> {
        self.extras.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_deduplicates() {
        let filter = ControlFilter::new()
            .with_category(CATEGORY_LIVE_AUDIO)
            .with_category(CATEGORY_LIVE_AUDIO)
            .with_action("play");
        assert_eq!(filter.categories().len(), 1);
        assert!(filter.has_action("play"));
    }

    #[test]
    fn test_filter_matches_request() {
        let filter = ControlFilter::new()
            .with_category(CATEGORY_REMOTE_PLAYBACK)
            .with_action("play")
            .with_action("pause");

        assert!(filter.matches(&ControlRequest::new("play")));
        assert!(filter.matches(&ControlRequest::new("pause").with_category(CATEGORY_REMOTE_PLAYBACK)));
        assert!(!filter.matches(&ControlRequest::new("seek")));
        assert!(!filter.matches(&ControlRequest::new("play").with_category(CATEGORY_LIVE_VIDEO)));
    }
}
