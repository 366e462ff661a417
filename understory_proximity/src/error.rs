// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

use thiserror::Error;

use crate::types::EntityId;

/// Errors returned by index mutations.
///
/// All of these are contract violations on a single entity; none are transient.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum IndexError {
    /// `add` was called for an id that is already tracked.
    #[error("entity {0} is already tracked")]
    DuplicateId(EntityId),

    /// `remove` or `update` was called for an id that is not tracked.
    #[error("entity {0} is not tracked")]
    NotFound(EntityId),

    /// Internal bookkeeping is inconsistent. Never expected in correct code.
    #[error("index invariant violated: {0}")]
    InvariantViolation(&'static str),
}
