// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend trait for spatial indexing implementations.

use std::fmt::Debug;

use crate::error::IndexError;
use crate::types::{EntityId, Position};

/// Spatial backend abstraction used by `IndexGeneric`.
///
/// Every backend must answer [`query_range`](Backend::query_range) identically for the same
/// sequence of mutations; [`BruteForce`](crate::BruteForce) is the reference.
pub trait Backend: Debug {
    /// Start tracking `id` at `position`.
    ///
    /// Fails with [`IndexError::DuplicateId`] if `id` is already tracked.
    fn insert(&mut self, id: EntityId, position: Position) -> Result<(), IndexError>;

    /// Move a tracked entity.
    ///
    /// Fails with [`IndexError::NotFound`] if `id` is not tracked.
    fn update(&mut self, id: EntityId, position: Position) -> Result<(), IndexError>;

    /// Stop tracking `id`.
    ///
    /// Fails with [`IndexError::NotFound`] if `id` is not tracked.
    fn remove(&mut self, id: EntityId) -> Result<(), IndexError>;

    /// Currently indexed position of `id`, if tracked.
    fn position(&self, id: EntityId) -> Option<Position>;

    /// Number of tracked entities.
    fn len(&self) -> usize;

    /// Whether nothing is tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every tracked entity.
    fn clear(&mut self);

    /// Ids whose indexed position lies within the closed ball of `radius` around `center`.
    fn query_range<'a>(
        &'a self,
        center: Position,
        radius: f64,
    ) -> Box<dyn Iterator<Item = EntityId> + 'a>;
}
