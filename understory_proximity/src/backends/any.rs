// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime backend selection.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::backend::Backend;
use crate::backends::brute_force::BruteForce;
use crate::backends::kdtree::{KdTree, KdTreeConfig};
use crate::error::IndexError;
use crate::types::{EntityId, Position};

/// Which spatial strategy to use, for callers that pick it from configuration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Hash map with linear-scan queries.
    #[default]
    BruteForce,
    /// Balanced k-d tree.
    KdTree,
}

impl BackendKind {
    /// Canonical configuration name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::BruteForce => "brute-force",
            Self::KdTree => "kd-tree",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string names no known backend.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown spatial index backend `{0}` (expected `brute-force` or `kd-tree`)")]
pub struct ParseBackendKindError(pub String);

impl FromStr for BackendKind {
    type Err = ParseBackendKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "brute-force" | "bruteforce" => Ok(Self::BruteForce),
            "kd-tree" | "kdtree" => Ok(Self::KdTree),
            _ => Err(ParseBackendKindError(s.to_owned())),
        }
    }
}

/// A backend chosen at runtime.
#[derive(Clone, Debug)]
pub enum AnyBackend {
    /// See [`BruteForce`].
    BruteForce(BruteForce),
    /// See [`KdTree`].
    KdTree(KdTree<3>),
}

impl AnyBackend {
    /// Create an empty backend of the given kind with default settings.
    pub fn new(kind: BackendKind) -> Self {
        match kind {
            BackendKind::BruteForce => Self::BruteForce(BruteForce::new()),
            BackendKind::KdTree => Self::KdTree(KdTree::new()),
        }
    }

    /// Create an empty k-d tree backend.
    pub fn with_kd_tree_config(config: KdTreeConfig) -> Self {
        Self::KdTree(KdTree::with_config(config))
    }

    /// Which kind this is.
    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::BruteForce(_) => BackendKind::BruteForce,
            Self::KdTree(_) => BackendKind::KdTree,
        }
    }
}

impl Default for AnyBackend {
    fn default() -> Self {
        Self::new(BackendKind::default())
    }
}

impl Backend for AnyBackend {
    fn insert(&mut self, id: EntityId, position: Position) -> Result<(), IndexError> {
        match self {
            Self::BruteForce(b) => b.insert(id, position),
            Self::KdTree(b) => b.insert(id, position),
        }
    }

    fn update(&mut self, id: EntityId, position: Position) -> Result<(), IndexError> {
        match self {
            Self::BruteForce(b) => b.update(id, position),
            Self::KdTree(b) => b.update(id, position),
        }
    }

    fn remove(&mut self, id: EntityId) -> Result<(), IndexError> {
        match self {
            Self::BruteForce(b) => b.remove(id),
            Self::KdTree(b) => b.remove(id),
        }
    }

    fn position(&self, id: EntityId) -> Option<Position> {
        match self {
            Self::BruteForce(b) => b.position(id),
            Self::KdTree(b) => b.position(id),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::BruteForce(b) => b.len(),
            Self::KdTree(b) => b.len(),
        }
    }

    fn clear(&mut self) {
        match self {
            Self::BruteForce(b) => b.clear(),
            Self::KdTree(b) => b.clear(),
        }
    }

    fn query_range<'a>(
        &'a self,
        center: Position,
        radius: f64,
    ) -> Box<dyn Iterator<Item = EntityId> + 'a> {
        match self {
            Self::BruteForce(b) => b.query_range(center, radius),
            Self::KdTree(b) => b.query_range(center, radius),
        }
    }
}
