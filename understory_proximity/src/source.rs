// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Position sources and the change-notification channel back into the index.
//!
//! A [`PositionSource`] owns the authoritative position of every entity (typically a mobility
//! model). When an entity is added to an index, the index subscribes it at the source for both
//! [`PositionEvents::CHANGED`] and [`PositionEvents::PERIODIC`] and hands over a [`ChangeSink`].
//! The source reports through the sink; the index resynchronizes lazily before its next query.
//!
//! Two triggers exist because mobility models that compute positions on demand do not always
//! notice that an entity moved. The periodic trigger bounds how stale the index can get.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::trace;

use crate::types::{EntityId, Position};

bitflags::bitflags! {
    /// Notification kinds an index subscribes to.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PositionEvents: u8 {
        /// Fired whenever the entity's position differs from the last reported value.
        const CHANGED  = 0b0000_0001;
        /// Fired on a fixed cadence regardless of movement.
        const PERIODIC = 0b0000_0010;
    }
}

impl Default for PositionEvents {
    fn default() -> Self {
        Self::CHANGED | Self::PERIODIC
    }
}

/// A single notification delivered through a [`ChangeSink`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PositionEvent {
    /// The position changed.
    Changed,
    /// Periodic resynchronization tick.
    Periodic,
}

impl PositionEvent {
    /// The subscription flag that enables this event.
    pub const fn flag(self) -> PositionEvents {
        match self {
            Self::Changed => PositionEvents::CHANGED,
            Self::Periodic => PositionEvents::PERIODIC,
        }
    }
}

/// Shared handle a source uses to tell an index that entities need resynchronizing.
///
/// Notifications are coalesced per entity; both event kinds have the same effect.
/// Single-threaded by construction.
#[derive(Clone, Debug, Default)]
pub struct ChangeSink {
    pending: Rc<RefCell<HashSet<EntityId>>>,
}

impl ChangeSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `id` may have moved.
    pub fn notify(&self, id: EntityId, event: PositionEvent) {
        trace!("position {event:?} for {id}");
        self.pending.borrow_mut().insert(id);
    }

    /// Number of distinct entities awaiting resynchronization.
    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Whether `id` is pending.
    pub fn contains(&self, id: EntityId) -> bool {
        self.pending.borrow().contains(&id)
    }

    /// Drop any pending notification for `id`.
    pub(crate) fn forget(&self, id: EntityId) {
        self.pending.borrow_mut().remove(&id);
    }

    /// Take every pending id, sorted so resynchronization order is deterministic.
    pub(crate) fn drain_sorted(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.pending.borrow_mut().drain().collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn clear(&self) {
        self.pending.borrow_mut().clear();
    }
}

/// Authoritative supplier of entity positions.
///
/// Methods take `&self`; sources shared between a mobility driver and an index use interior
/// mutability (see [`PositionTable`]).
pub trait PositionSource {
    /// Current position of `id`, or `None` if the source does not know it.
    fn position(&self, id: EntityId) -> Option<Position>;

    /// Start reporting `events` for `id` into `sink`.
    fn subscribe(&self, id: EntityId, events: PositionEvents, sink: ChangeSink);

    /// Stop reporting for `id`.
    fn unsubscribe(&self, id: EntityId);
}

impl<S: PositionSource + ?Sized> PositionSource for &S {
    fn position(&self, id: EntityId) -> Option<Position> {
        (**self).position(id)
    }

    fn subscribe(&self, id: EntityId, events: PositionEvents, sink: ChangeSink) {
        (**self).subscribe(id, events, sink);
    }

    fn unsubscribe(&self, id: EntityId) {
        (**self).unsubscribe(id);
    }
}

impl<S: PositionSource + ?Sized> PositionSource for Rc<S> {
    fn position(&self, id: EntityId) -> Option<Position> {
        (**self).position(id)
    }

    fn subscribe(&self, id: EntityId, events: PositionEvents, sink: ChangeSink) {
        (**self).subscribe(id, events, sink);
    }

    fn unsubscribe(&self, id: EntityId) {
        (**self).unsubscribe(id);
    }
}

#[derive(Clone, Debug)]
struct Subscription {
    events: PositionEvents,
    sink: ChangeSink,
}

#[derive(Debug, Default)]
struct TableState {
    positions: HashMap<EntityId, Position>,
    subscriptions: HashMap<EntityId, Subscription>,
}

/// In-memory position source.
///
/// Stands in for a mobility model: the driver writes positions, subscribed indexes are told.
///
/// ```
/// use std::rc::Rc;
/// use understory_proximity::{EntityId, Index, Position, PositionTable};
///
/// let table = Rc::new(PositionTable::new());
/// table.set_position(EntityId(1), Position::new(0.0, 0.0, 0.0));
///
/// let mut index = Index::with_kd_tree(Rc::clone(&table));
/// index.add(EntityId(1), Position::new(0.0, 0.0, 0.0)).unwrap();
///
/// // The driver moves the entity; the index catches up before the next query.
/// table.set_position(EntityId(1), Position::new(50.0, 0.0, 0.0));
/// assert!(index.query_range(Position::new(0.0, 0.0, 0.0), 10.0, None).is_empty());
/// ```
#[derive(Debug, Default)]
pub struct PositionTable {
    state: RefCell<TableState>,
}

impl PositionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `position` for `id` and fire [`PositionEvent::Changed`] if it differs from before.
    pub fn set_position(&self, id: EntityId, position: Position) {
        let mut state = self.state.borrow_mut();
        let previous = state.positions.insert(id, position);
        if previous == Some(position) {
            return;
        }
        if let Some(sub) = state.subscriptions.get(&id)
            && sub.events.contains(PositionEvents::CHANGED)
        {
            sub.sink.notify(id, PositionEvent::Changed);
        }
    }

    /// Store `position` for `id` without notifying anyone.
    ///
    /// Models a mobility model that moves an entity without noticing; only a periodic tick
    /// brings subscribers up to date.
    pub fn set_position_quiet(&self, id: EntityId, position: Position) {
        self.state.borrow_mut().positions.insert(id, position);
    }

    /// Forget `id`'s position. Subscriptions are left alone.
    pub fn forget(&self, id: EntityId) {
        self.state.borrow_mut().positions.remove(&id);
    }

    /// Fire [`PositionEvent::Periodic`] for every subscriber that asked for it.
    pub fn periodic_sync(&self) {
        let state = self.state.borrow();
        for (id, sub) in &state.subscriptions {
            if sub.events.contains(PositionEvents::PERIODIC) {
                sub.sink.notify(*id, PositionEvent::Periodic);
            }
        }
    }

    /// Number of subscribed entities.
    pub fn subscriber_count(&self) -> usize {
        self.state.borrow().subscriptions.len()
    }

    /// Events `id` is subscribed to, if any.
    pub fn subscription(&self, id: EntityId) -> Option<PositionEvents> {
        self.state.borrow().subscriptions.get(&id).map(|s| s.events)
    }
}

impl PositionSource for PositionTable {
    fn position(&self, id: EntityId) -> Option<Position> {
        self.state.borrow().positions.get(&id).copied()
    }

    fn subscribe(&self, id: EntityId, events: PositionEvents, sink: ChangeSink) {
        self.state
            .borrow_mut()
            .subscriptions
            .insert(id, Subscription { events, sink });
    }

    fn unsubscribe(&self, id: EntityId) {
        self.state.borrow_mut().subscriptions.remove(&id);
    }
}
