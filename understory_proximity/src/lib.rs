// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_proximity --heading-base-level=0

//! Understory Proximity: a 3D proximity index for mobile entities.
//!
//! Understory Proximity answers "which entities are within radius R of point P" for a
//! population that keeps moving.
//!
//! - Add, update, and remove entities by caller-assigned [`EntityId`].
//! - Query the closed ball around a point with [`IndexGeneric::query_range`].
//! - Receive position-change notifications from a [`PositionSource`] and apply them lazily,
//!   in one batch, right before the next query.
//!
//! A typical consumer is a wireless channel model that only wants to schedule receptions for
//! nearby receivers instead of every node in the simulation.
//!
//! Backends are pluggable via a simple trait so you can swap the spatial strategy without API churn.
//! The default backend is a brute-force hash map (linear scan per query).
//! The k-d tree backend keeps nodes in an index-linked arena, bounds its depth, and rebuilds
//! itself to minimum height when the bound is exceeded.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use understory_proximity::{EntityId, Index, Position, PositionTable};
//!
//! // Positions come from a mobility model; here a plain table stands in for it.
//! let mobility = Rc::new(PositionTable::new());
//! let mut idx = Index::with_kd_tree(Rc::clone(&mobility));
//!
//! for (id, x) in [(1, 0.0), (2, 1000.0), (3, 500.0)] {
//!     let p = Position::new(x, 0.0, 0.0);
//!     mobility.set_position(EntityId(id), p);
//!     idx.add(EntityId(id), p).unwrap();
//! }
//!
//! // Who hears a transmission from entity 3?
//! let heard = idx.query_range(Position::new(500.0, 0.0, 0.0), 500.0, Some(EntityId(3)));
//! assert_eq!(heard.len(), 3);
//!
//! // Entity 2 drifts out of range; the index picks that up on the next query.
//! mobility.set_position(EntityId(2), Position::new(1001.0, 0.0, 0.0));
//! let heard = idx.query_range(Position::new(500.0, 0.0, 0.0), 500.0, Some(EntityId(3)));
//! assert!(!heard.contains(&EntityId(2)));
//! ```
//!
//! The transmitter passed as `exclude` is still reported when it lies inside the ball.
//!
//! ## Choosing a backend
//!
//! - `BruteForce` (default): O(1) updates, O(n) queries. Smallest and simplest, and the
//!   reference every other backend must agree with.
//! - `KdTree<3>`: O(log n) expected updates and roughly O(log n + k) queries. Pays an
//!   occasional O(n log n) rebalance when depth exceeds [`KdTreeConfig::allowed_depth`].
//! - `AnyBackend`: either of the above, selected at runtime from a [`BackendKind`] string
//!   such as `"kd-tree"`.
//!
//! ### Float semantics
//!
//! Coordinates must not be NaN. Debug builds assert.
//!
//! ### Threading
//!
//! The index is single-threaded. [`ChangeSink`] is reference-counted without atomics, so an
//! index is neither `Send` nor `Sync`.

pub mod backend;
pub mod backends;
pub mod error;
pub mod index;
pub mod source;
pub mod types;

pub use backend::Backend;
pub use backends::any::{AnyBackend, BackendKind, ParseBackendKindError};
pub use backends::brute_force::BruteForce;
pub use backends::kdtree::{KdTree, KdTreeConfig};
pub use error::IndexError;
pub use index::{Index, IndexGeneric, SyncReport};
pub use source::{ChangeSink, PositionEvent, PositionEvents, PositionSource, PositionTable};
pub use types::{EntityId, Position};
