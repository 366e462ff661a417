// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Brute-force backend: hash map storage with linear-scan queries. The reference for correctness.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::Debug;

use crate::backend::Backend;
use crate::error::IndexError;
use crate::types::{EntityId, Position, within_radius};

/// Hash map backend with linear-scan range queries.
///
/// Mutations are O(1); each query is O(n).
#[derive(Clone, Default)]
pub struct BruteForce {
    entries: HashMap<EntityId, Position>,
}

impl BruteForce {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty backend with room for `n` entities.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(n),
        }
    }

    /// Iterate over every tracked `(id, position)` pair in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, Position)> + '_ {
        self.entries.iter().map(|(id, p)| (*id, *p))
    }
}

impl Debug for BruteForce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BruteForce")
            .field("alive", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl Backend for BruteForce {
    fn insert(&mut self, id: EntityId, position: Position) -> Result<(), IndexError> {
        debug_assert!(!position.has_nan(), "NaN coordinate for {id}");
        match self.entries.entry(id) {
            Entry::Occupied(_) => Err(IndexError::DuplicateId(id)),
            Entry::Vacant(v) => {
                v.insert(position);
                Ok(())
            }
        }
    }

    fn update(&mut self, id: EntityId, position: Position) -> Result<(), IndexError> {
        debug_assert!(!position.has_nan(), "NaN coordinate for {id}");
        let slot = self.entries.get_mut(&id).ok_or(IndexError::NotFound(id))?;
        *slot = position;
        Ok(())
    }

    fn remove(&mut self, id: EntityId) -> Result<(), IndexError> {
        self.entries
            .remove(&id)
            .map(|_| ())
            .ok_or(IndexError::NotFound(id))
    }

    fn position(&self, id: EntityId) -> Option<Position> {
        self.entries.get(&id).copied()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn query_range<'a>(
        &'a self,
        center: Position,
        radius: f64,
    ) -> Box<dyn Iterator<Item = EntityId> + 'a> {
        let c = center.to_array();
        let mut out = Vec::new();
        for (id, p) in &self.entries {
            if within_radius(&p.to_array(), &c, radius) {
                out.push(*id);
            }
        }
        Box::new(out.into_iter())
    }
}
