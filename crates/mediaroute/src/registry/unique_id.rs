// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use crate::error::RouterError;
use std::collections::HashMap;
use tracing::warn;

/// Assigns globally unique route ids.
///
/// The base id is `identity:descriptor_id`; collisions get `_2`, `_3`, ...
/// Assignments are remembered for the registry's lifetime so a route that
/// disappears and comes back resolves to the same id.
#[derive(Debug)]
pub(crate) struct UniqueIdTable {
    assigned: HashMap<(String, String), String>,
    max_suffix: u32,
}

impl UniqueIdTable {
    pub(crate) fn new(max_suffix: u32) -> Self {
        Self {
            assigned: HashMap::new(),
            max_suffix,
        }
    }

    pub(crate) fn assign<F>(
        &mut self,
        identity: &str,
        descriptor_id: &str,
        in_use: F,
    ) -> Result<String, RouterError>
    where
        F: Fn(&str) -> bool,
    {
        let key = (identity.to_string(), descriptor_id.to_string());
        if let Some(known) = self.assigned.get(&key) {
            if !in_use(known) {
                return Ok(known.clone());
            }
        }

        let base = format!("{}:{}", identity, descriptor_id);
        let chosen = if !in_use(&base) {
            Some(base)
        } else {
            warn!("Unique id {} already taken, adding a suffix", base);
            (2..=self.max_suffix)
                .map(|i| format!("{}_{}", base, i))
                .find(|candidate| !in_use(candidate))
        };

        match chosen {
            Some(id) => {
                self.assigned.insert(key, id.clone());
                Ok(id)
            }
            None => Err(RouterError::UniqueIdExhausted {
                identity: key.0,
                descriptor_id: key.1,
                attempts: self.max_suffix.saturating_sub(1),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.assigned.len()
    }
}
