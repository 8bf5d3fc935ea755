// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Route selectors: the set of control categories an application wants.

use super::control::ControlFilter;
use serde::{Deserialize, Serialize};

/// Immutable ordered set of control categories.
///
/// Equality is structural and order-sensitive; selectors built from the same
/// callbacks in the same order compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteSelector {
    #[serde(default)]
    control_categories: Vec<String>,
}

impl RouteSelector {
    /// The empty selector, identity for [`RouteSelectorBuilder::add_selector`].
    pub const EMPTY: RouteSelector = RouteSelector {
        control_categories: Vec::new(),
    };

    pub fn builder() -> RouteSelectorBuilder {
        RouteSelectorBuilder::default()
    }

    /// Shorthand for a selector with the given categories.
    pub fn from_categories<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = Self::builder();
        for category in categories {
            builder = builder.add_category(category);
        }
        builder.build()
    }

    pub fn control_categories(&self) -> &[String] {
        &self.control_categories
    }

    pub fn is_empty(&self) -> bool {
        self.control_categories.is_empty()
    }

    /// A selector is valid when none of its categories is blank.
    pub fn is_valid(&self) -> bool {
        self.control_categories.iter().all(|c| !c.is_empty())
    }

    pub fn has_control_category(&self, category: &str) -> bool {
        self.control_categories.iter().any(|c| c == category)
    }

    /// True if every category of `other` is also in `self`.
    pub fn contains(&self, other: &RouteSelector) -> bool {
        other
            .control_categories
            .iter()
            .all(|c| self.has_control_category(c))
    }

    /// True if any filter advertises any of this selector's categories.
    pub fn matches_control_filters(&self, filters: &[ControlFilter]) -> bool {
        filters.iter().any(|filter| {
            self.control_categories
                .iter()
                .any(|category| filter.has_category(category))
        })
    }
}

/// Builder producing the union of categories in insertion order.
#[derive(Debug, Clone, Default)]
pub struct RouteSelectorBuilder {
    control_categories: Vec<String>,
}

impl RouteSelectorBuilder {
    /// Start from an existing selector.
    pub fn from_selector(selector: &RouteSelector) -> Self {
        Self {
            control_categories: selector.control_categories.clone(),
        }
    }

    pub fn add_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        if !self.control_categories.contains(&category) {
            self.control_categories.push(category);
        }
        self
    }

    pub fn add_selector(mut self, selector: &RouteSelector) -> Self {
        for category in &selector.control_categories {
            if !self.control_categories.contains(category) {
                self.control_categories.push(category.clone());
            }
        }
        self
    }

    pub fn build(self) -> RouteSelector {
        RouteSelector {
            control_categories: self.control_categories,
        }
    }
}
