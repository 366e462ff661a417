// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public `Index` API and generic implementation over a pluggable backend.

use std::collections::HashSet;

use log::{trace, warn};

use crate::backend::Backend;
use crate::backends::any::{AnyBackend, BackendKind};
use crate::backends::brute_force::BruteForce;
use crate::backends::kdtree::{KdTree, KdTreeConfig};
use crate::error::IndexError;
use crate::source::{ChangeSink, PositionEvent, PositionEvents, PositionSource};
use crate::types::{EntityId, Position};

/// Summary of one [`IndexGeneric::commit`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entities whose indexed position was replaced.
    pub moved: usize,
    /// Entities that were notified but had not actually moved.
    pub unchanged: usize,
    /// Notifications for entities no longer tracked, or unknown to the source.
    pub stale: usize,
}

impl SyncReport {
    /// True if the commit touched nothing.
    pub fn is_empty(&self) -> bool {
        self.moved == 0 && self.unchanged == 0 && self.stale == 0
    }
}

/// A proximity index over a [`PositionSource`], parameterized by a spatial backend.
///
/// Position-change notifications from the source are queued and applied in one pass right
/// before the next [`query_range`](Self::query_range), or on an explicit
/// [`commit`](Self::commit).
#[derive(Debug)]
pub struct IndexGeneric<S: PositionSource, B: Backend> {
    backend: B,
    source: S,
    pending: ChangeSink,
}

impl<S: PositionSource, B: Backend> IndexGeneric<S, B> {
    /// Create an empty index over `source` using `backend`.
    ///
    /// The backend should be empty; anything already in it is not subscribed at the source.
    pub fn with_backend(source: S, backend: B) -> Self {
        Self {
            backend,
            source,
            pending: ChangeSink::new(),
        }
    }

    /// Start tracking `id` at `position` and subscribe it to change and periodic notifications.
    pub fn add(&mut self, id: EntityId, position: Position) -> Result<(), IndexError> {
        self.backend.insert(id, position)?;
        self.source.subscribe(
            id,
            PositionEvents::CHANGED | PositionEvents::PERIODIC,
            self.pending.clone(),
        );
        Ok(())
    }

    /// Stop tracking `id` and unsubscribe it.
    pub fn remove(&mut self, id: EntityId) -> Result<(), IndexError> {
        self.backend.remove(id)?;
        self.pending.forget(id);
        self.source.unsubscribe(id);
        Ok(())
    }

    /// Move `id` to `position` immediately.
    ///
    /// Supersedes any queued notification for `id`.
    pub fn update(&mut self, id: EntityId, position: Position) -> Result<(), IndexError> {
        self.backend.update(id, position)?;
        self.pending.forget(id);
        Ok(())
    }

    /// Note that `id` may have moved. Resolved on the next commit.
    pub fn on_position_changed(&mut self, id: EntityId) {
        self.pending.notify(id, PositionEvent::Changed);
    }

    /// Apply every queued notification by reading current positions from the source.
    pub fn commit(&mut self) -> SyncReport {
        let mut report = SyncReport::default();
        if self.pending.is_empty() {
            return report;
        }
        for id in self.pending.drain_sorted() {
            let Some(indexed) = self.backend.position(id) else {
                report.stale += 1;
                continue;
            };
            let Some(current) = self.source.position(id) else {
                warn!("position source has no position for tracked entity {id}");
                report.stale += 1;
                continue;
            };
            if current == indexed {
                report.unchanged += 1;
                continue;
            }
            match self.backend.update(id, current) {
                Ok(()) => report.moved += 1,
                Err(err) => {
                    warn!("failed to resync {id}: {err}");
                    report.stale += 1;
                }
            }
        }
        trace!("commit: {report:?}");
        report
    }

    /// Ids within the closed ball of `radius` around `center`.
    ///
    /// Pending notifications are committed first. `exclude` is accepted so callers can pass the
    /// transmitting entity, but it is not filtered out: an entity inside the ball is always
    /// reported, including the one named by `exclude`.
    pub fn query_range(
        &mut self,
        center: Position,
        radius: f64,
        exclude: Option<EntityId>,
    ) -> HashSet<EntityId> {
        let _ = exclude;
        self.commit();
        self.backend.query_range(center, radius).collect()
    }

    /// Number of tracked entities.
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }

    /// Whether `id` is tracked.
    pub fn contains(&self, id: EntityId) -> bool {
        self.backend.position(id).is_some()
    }

    /// Indexed position of `id`. May lag the source until the next commit.
    pub fn position(&self, id: EntityId) -> Option<Position> {
        self.backend.position(id)
    }

    /// Number of entities with queued notifications.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Untrack everything, unsubscribing each entity.
    pub fn clear(&mut self) {
        let everyone: Vec<EntityId> = self
            .backend
            .query_range(Position::ORIGIN, f64::INFINITY)
            .collect();
        for id in everyone {
            self.source.unsubscribe(id);
        }
        self.backend.clear();
        self.pending.clear();
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The position source.
    pub fn source(&self) -> &S {
        &self.source
    }
}

/// Default index using the brute-force backend.
pub type Index<S> = IndexGeneric<S, BruteForce>;

impl<S: PositionSource> Index<S> {
    /// Create an empty brute-force index over `source`.
    pub fn new(source: S) -> Self {
        Self::with_backend(source, BruteForce::new())
    }

    /// Create a k-d-tree-backed index with default settings.
    pub fn with_kd_tree(source: S) -> IndexGeneric<S, KdTree<3>> {
        IndexGeneric::with_backend(source, KdTree::new())
    }

    /// Create a k-d-tree-backed index.
    pub fn with_kd_tree_config(source: S, config: KdTreeConfig) -> IndexGeneric<S, KdTree<3>> {
        IndexGeneric::with_backend(source, KdTree::with_config(config))
    }

    /// Create an index whose backend is chosen at runtime.
    pub fn with_backend_kind(source: S, kind: BackendKind) -> IndexGeneric<S, AnyBackend> {
        IndexGeneric::with_backend(source, AnyBackend::new(kind))
    }
}
