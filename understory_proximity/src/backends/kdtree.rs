// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Array-backed k-d tree with bounded depth and periodic full rebalance.
//!
//! Nodes live in a single arena (`Vec`) and link to each other by index, so a rebalance can
//! rebuild the whole structure in place. All traversals (insert, successor search, box search)
//! are iterative with an explicit stack.
//!
//! Splitting rule: a node at depth `d` cuts on dimension `d % K`. Its left subtree holds
//! strictly smaller values on that dimension, its right subtree holds greater or equal values.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Debug;

use log::{debug, warn};

use crate::backend::Backend;
use crate::error::IndexError;
use crate::types::{EntityId, Position, search_box, within_radius};

/// Tuning knobs for [`KdTree`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KdTreeConfig {
    /// Maximum number of levels the tree may grow to before a full rebalance is forced.
    ///
    /// Must comfortably exceed `log2` of the expected population, otherwise every insert
    /// rebalances.
    pub allowed_depth: usize,
    /// Arena and lookup capacity reserved up front.
    pub initial_capacity: usize,
}

impl KdTreeConfig {
    /// Allowed depth used by [`KdTreeConfig::default`].
    pub const DEFAULT_ALLOWED_DEPTH: usize = 32;

    /// Set the allowed depth.
    pub const fn with_allowed_depth(mut self, allowed_depth: usize) -> Self {
        self.allowed_depth = allowed_depth;
        self
    }

    /// Set the initial capacity.
    pub const fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }
}

impl Default for KdTreeConfig {
    fn default() -> Self {
        Self {
            allowed_depth: Self::DEFAULT_ALLOWED_DEPTH,
            initial_capacity: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct NodeIdx(usize);

impl NodeIdx {
    const fn get(self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

#[derive(Clone, Debug)]
struct KdNode<const K: usize> {
    coords: [f64; K],
    // `None` only for slots on the free list.
    id: Option<EntityId>,
    depth: usize,
    parent: Option<NodeIdx>,
    left: Option<NodeIdx>,
    right: Option<NodeIdx>,
}

impl<const K: usize> KdNode<K> {
    const fn new(coords: [f64; K], id: EntityId) -> Self {
        Self {
            coords,
            id: Some(id),
            depth: 0,
            parent: None,
            left: None,
            right: None,
        }
    }

    #[inline]
    const fn cutting_dim(&self) -> usize {
        self.depth % K
    }

    fn cmp_on(&self, other: &Self, dim: usize) -> Ordering {
        self.coords[dim].total_cmp(&other.coords[dim])
    }
}

/// A contiguous run of the arena that becomes one subtree during a rebalance.
#[derive(Copy, Clone, Debug)]
struct Span {
    start: usize,
    end: usize,
    attach: Option<(NodeIdx, Side)>,
}

impl Span {
    const fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Height of a minimum-height tree holding `n` nodes, counted in levels.
///
/// This is `ceil(log2(n))`, plus one when `n` is a power of two.
pub fn balanced_height(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let pow2 = n.is_power_of_two();
    let ceil_log2 = n.ilog2() as usize + usize::from(!pow2);
    ceil_log2 + usize::from(pow2)
}

/// Balanced, array-backed k-d tree over `K`-dimensional points.
///
/// Tracks at most one point per [`EntityId`]. Insertions attach new leaves; if the tree then
/// exceeds [`KdTreeConfig::allowed_depth`] levels it is rebuilt to minimum height. Deletions use
/// successor substitution so only leaves are ever unlinked. Updates are a delete followed by an
/// insert, never an in-place coordinate write.
///
/// # Example
///
/// ```
/// use understory_proximity::{EntityId, KdTree};
///
/// let mut tree: KdTree<2> = KdTree::new();
/// tree.insert_point([0.0, 0.0], EntityId(1)).unwrap();
/// tree.insert_point([3.0, 4.0], EntityId(2)).unwrap();
/// tree.insert_point([9.0, 9.0], EntityId(3)).unwrap();
///
/// let mut near = tree.query_radius(&[0.0, 0.0], 5.0);
/// near.sort();
/// assert_eq!(near, vec![EntityId(1), EntityId(2)]);
/// ```
#[derive(Clone)]
pub struct KdTree<const K: usize> {
    nodes: Vec<KdNode<K>>,
    free: Vec<NodeIdx>,
    root: Option<NodeIdx>,
    lookup: HashMap<EntityId, NodeIdx>,
    // Levels, not edges: a lone root gives 1. Only grows between rebalances.
    max_depth: usize,
    allowed_depth: usize,
    len: usize,
}

impl<const K: usize> Default for KdTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const K: usize> Debug for KdTree<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KdTree")
            .field("dims", &K)
            .field("alive", &self.len)
            .field("height", &self.max_depth)
            .field("allowed_depth", &self.allowed_depth)
            .field("free_slots", &self.free.len())
            .finish_non_exhaustive()
    }
}

impl<const K: usize> KdTree<K> {
    /// Create an empty tree with the default configuration.
    pub fn new() -> Self {
        Self::with_config(KdTreeConfig::default())
    }

    /// Create an empty tree.
    pub fn with_config(config: KdTreeConfig) -> Self {
        const { assert!(K > 0, "a k-d tree needs at least one dimension") };
        Self {
            nodes: Vec::with_capacity(config.initial_capacity),
            free: Vec::new(),
            root: None,
            lookup: HashMap::with_capacity(config.initial_capacity),
            max_depth: 0,
            allowed_depth: config.allowed_depth,
            len: 0,
        }
    }

    /// Number of tracked points.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current height bound in levels.
    ///
    /// Exact right after a rebalance, an upper bound after deletions.
    pub fn height(&self) -> usize {
        self.max_depth
    }

    /// Configured depth ceiling.
    pub fn allowed_depth(&self) -> usize {
        self.allowed_depth
    }

    /// Whether `id` is tracked.
    pub fn contains(&self, id: EntityId) -> bool {
        self.lookup.contains_key(&id)
    }

    /// Indexed coordinates of `id`.
    pub fn point(&self, id: EntityId) -> Option<[f64; K]> {
        self.lookup.get(&id).map(|idx| self.nodes[idx.get()].coords)
    }

    /// Iterate over every tracked `(id, point)` pair in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, [f64; K])> + '_ {
        self.nodes
            .iter()
            .filter_map(|n| n.id.map(|id| (id, n.coords)))
    }

    /// Drop every point.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.lookup.clear();
        self.root = None;
        self.max_depth = 0;
        self.len = 0;
    }

    /// Track `id` at `point`.
    pub fn insert_point(&mut self, point: [f64; K], id: EntityId) -> Result<(), IndexError> {
        debug_assert!(
            point.iter().all(|v| !v.is_nan()),
            "NaN coordinate for {id}"
        );
        if self.lookup.contains_key(&id) {
            return Err(IndexError::DuplicateId(id));
        }
        let idx = self.alloc(point, id);
        self.lookup.insert(id, idx);
        self.len += 1;
        match self.root {
            None => {
                self.root = Some(idx);
                self.max_depth = self.max_depth.max(1);
            }
            Some(root) => self.connect(root, idx),
        }
        if self.max_depth > self.allowed_depth {
            self.rebalance();
        }
        Ok(())
    }

    /// Stop tracking `id`.
    pub fn delete(&mut self, id: EntityId) -> Result<(), IndexError> {
        let mut target = self.lookup.remove(&id).ok_or(IndexError::NotFound(id))?;
        loop {
            let (left, right, dim) = {
                let n = &self.nodes[target.get()];
                (n.left, n.right, n.cutting_dim())
            };
            if let Some(right) = right {
                let succ = self.find_min(right, dim);
                let (coords, succ_id) = {
                    let s = &self.nodes[succ.get()];
                    (s.coords, s.id)
                };
                let succ_id =
                    succ_id.ok_or(IndexError::InvariantViolation("successor slot is empty"))?;
                let t = &mut self.nodes[target.get()];
                t.coords = coords;
                t.id = Some(succ_id);
                self.lookup.insert(succ_id, target);
                target = succ;
            } else if let Some(left) = left {
                // Everything on the left is >= the minimum we will pull up next round.
                let t = &mut self.nodes[target.get()];
                t.right = Some(left);
                t.left = None;
            } else {
                self.detach_leaf(target)?;
                break;
            }
        }
        self.len -= 1;
        Ok(())
    }

    /// Move `id` to `point`.
    pub fn update_point(&mut self, id: EntityId, point: [f64; K]) -> Result<(), IndexError> {
        if !self.lookup.contains_key(&id) {
            return Err(IndexError::NotFound(id));
        }
        self.delete(id)?;
        self.insert_point(point, id)
    }

    /// Ids of all points inside the closed axis-aligned box `[low, high]`.
    pub fn range_search(&self, low: &[f64; K], high: &[f64; K]) -> Vec<EntityId> {
        let mut out = Vec::new();
        self.visit_box(low, high, |node| {
            if let Some(id) = node.id {
                out.push(id);
            }
        });
        out
    }

    /// Ids of all points within the closed ball of `radius` around `center`.
    pub fn query_radius(&self, center: &[f64; K], radius: f64) -> Vec<EntityId> {
        let (low, high) = search_box(center, radius);
        let mut out = Vec::new();
        self.visit_box(&low, &high, |node| {
            if let Some(id) = node.id
                && within_radius(&node.coords, center, radius)
            {
                out.push(id);
            }
        });
        out
    }

    /// Rebuild the tree at minimum height.
    ///
    /// The set of `(id, point)` pairs is unchanged. Runs in `O(n log n)`.
    pub fn rebalance(&mut self) {
        let before = self.max_depth;
        let mut nodes: Vec<KdNode<K>> = self
            .nodes
            .drain(..)
            .filter_map(|n| n.id.map(|id| KdNode::new(n.coords, id)))
            .collect();
        self.free.clear();
        self.lookup.clear();
        self.root = None;
        self.max_depth = 0;

        let n = nodes.len();
        let mut level = if n == 0 {
            Vec::new()
        } else {
            vec![Span {
                start: 0,
                end: n,
                attach: None,
            }]
        };
        let mut depth = 0;
        while !level.is_empty() {
            let dim = depth % K;
            let mut next = Vec::new();
            for span in level {
                let root = match span.len() {
                    1 => span.start,
                    2 => place_pair(&mut nodes, span, dim, &mut next),
                    3 => place_triple(&mut nodes, span, dim, &mut next),
                    _ => place_median(&mut nodes, span, dim, &mut next),
                };
                let node = &mut nodes[root];
                node.depth = depth;
                match span.attach {
                    None => self.root = Some(NodeIdx(root)),
                    Some((parent, side)) => {
                        node.parent = Some(parent);
                        let p = &mut nodes[parent.get()];
                        match side {
                            Side::Left => p.left = Some(NodeIdx(root)),
                            Side::Right => p.right = Some(NodeIdx(root)),
                        }
                    }
                }
            }
            level = next;
            depth += 1;
        }

        for (i, node) in nodes.iter().enumerate() {
            if let Some(id) = node.id {
                self.lookup.insert(id, NodeIdx(i));
            }
        }
        self.nodes = nodes;
        self.max_depth = depth;
        debug!(
            "k-d tree rebalanced: {n} entities, height {before} -> {depth} (balanced {})",
            balanced_height(n)
        );
        if depth > self.allowed_depth {
            warn!(
                "k-d tree height {depth} still exceeds allowed depth {} for {n} entities",
                self.allowed_depth
            );
        }
    }

    /// Verify every structural invariant. Intended for tests and debugging.
    pub fn check_invariants(&self) -> Result<(), IndexError> {
        use IndexError::InvariantViolation as Broken;

        if self.lookup.len() != self.len {
            return Err(Broken("lookup size differs from live count"));
        }
        for (id, idx) in &self.lookup {
            if self.nodes.get(idx.get()).and_then(|n| n.id) != Some(*id) {
                return Err(Broken("lookup points at the wrong slot"));
            }
        }
        let Some(root) = self.root else {
            return if self.len == 0 {
                Ok(())
            } else {
                Err(Broken("live entries but no root"))
            };
        };
        let r = &self.nodes[root.get()];
        if r.parent.is_some() || r.depth != 0 {
            return Err(Broken("root has a parent or nonzero depth"));
        }

        // Each frame carries the half-open window [lo, hi) its subtree must fall in.
        let mut stack = vec![(root, [None::<f64>; K], [None::<f64>; K])];
        let mut visited = 0_usize;
        while let Some((idx, lo, hi)) = stack.pop() {
            let node = &self.nodes[idx.get()];
            visited += 1;
            if node.id.is_none() {
                return Err(Broken("reachable slot holds no entity"));
            }
            if node.depth + 1 > self.max_depth {
                return Err(Broken("node deeper than recorded height"));
            }
            for d in 0..K {
                let c = node.coords[d];
                if lo[d].is_some_and(|l| c < l) || hi[d].is_some_and(|h| c >= h) {
                    return Err(Broken("k-d ordering violated"));
                }
            }
            let dim = node.cutting_dim();
            let split = node.coords[dim];
            for (child, side) in [(node.left, Side::Left), (node.right, Side::Right)] {
                let Some(child) = child else { continue };
                let c = &self.nodes[child.get()];
                if c.parent != Some(idx) || c.depth != node.depth + 1 {
                    return Err(Broken("child link is not mirrored"));
                }
                let (mut lo, mut hi) = (lo, hi);
                match side {
                    Side::Left => hi[dim] = Some(hi[dim].map_or(split, |h| h.min(split))),
                    Side::Right => lo[dim] = Some(lo[dim].map_or(split, |l| l.max(split))),
                }
                stack.push((child, lo, hi));
            }
        }
        if visited != self.len {
            return Err(Broken("reachable node count differs from live count"));
        }
        Ok(())
    }

    fn alloc(&mut self, point: [f64; K], id: EntityId) -> NodeIdx {
        let node = KdNode::new(point, id);
        if let Some(idx) = self.free.pop() {
            self.nodes[idx.get()] = node;
            idx
        } else {
            self.nodes.push(node);
            NodeIdx(self.nodes.len() - 1)
        }
    }

    /// Walk down from `root` and hang the detached node `new` in the first empty child slot.
    fn connect(&mut self, root: NodeIdx, new: NodeIdx) {
        let point = self.nodes[new.get()].coords;
        let mut cur = root;
        loop {
            let (go_left, next, depth) = {
                let n = &self.nodes[cur.get()];
                let dim = n.cutting_dim();
                let go_left = point[dim] < n.coords[dim];
                (go_left, if go_left { n.left } else { n.right }, n.depth)
            };
            if let Some(next) = next {
                cur = next;
                continue;
            }
            let parent = &mut self.nodes[cur.get()];
            if go_left {
                parent.left = Some(new);
            } else {
                parent.right = Some(new);
            }
            let child = &mut self.nodes[new.get()];
            child.parent = Some(cur);
            child.depth = depth + 1;
            self.max_depth = self.max_depth.max(depth + 2);
            return;
        }
    }

    fn detach_leaf(&mut self, idx: NodeIdx) -> Result<(), IndexError> {
        match self.nodes[idx.get()].parent {
            Some(parent) => {
                let p = &mut self.nodes[parent.get()];
                if p.left == Some(idx) {
                    p.left = None;
                } else if p.right == Some(idx) {
                    p.right = None;
                } else {
                    return Err(IndexError::InvariantViolation(
                        "parent does not link to its child",
                    ));
                }
            }
            None => {
                self.root = None;
                self.max_depth = 0;
            }
        }
        let n = &mut self.nodes[idx.get()];
        n.id = None;
        n.parent = None;
        self.free.push(idx);
        Ok(())
    }

    /// Node holding the smallest coordinate on `dim` within the subtree at `start`.
    ///
    /// Where a node cuts on `dim` itself, its right subtree cannot hold anything smaller,
    /// so only the left child is explored. Elsewhere both children are.
    fn find_min(&self, start: NodeIdx, dim: usize) -> NodeIdx {
        let mut best = start;
        let mut best_value = self.nodes[start.get()].coords[dim];
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            let n = &self.nodes[idx.get()];
            if n.coords[dim] < best_value {
                best = idx;
                best_value = n.coords[dim];
            }
            if n.cutting_dim() == dim {
                stack.extend(n.left);
            } else {
                stack.extend(n.left);
                stack.extend(n.right);
            }
        }
        best
    }

    fn visit_box(&self, low: &[f64; K], high: &[f64; K], mut f: impl FnMut(&KdNode<K>)) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            let n = &self.nodes[idx.get()];
            if (0..K).all(|d| low[d] <= n.coords[d] && n.coords[d] <= high[d]) {
                f(n);
            }
            let dim = n.cutting_dim();
            let split = n.coords[dim];
            // Left holds values < split, right holds values >= split; the box is closed.
            if low[dim] < split {
                stack.extend(n.left);
            }
            if split <= high[dim] {
                stack.extend(n.right);
            }
        }
    }
}

/// Two nodes: the smaller on `dim` is the root and the other hangs to its right.
fn place_pair<const K: usize>(
    nodes: &mut [KdNode<K>],
    span: Span,
    dim: usize,
    next: &mut Vec<Span>,
) -> usize {
    let (a, b) = (span.start, span.start + 1);
    if nodes[b].coords[dim] < nodes[a].coords[dim] {
        nodes.swap(a, b);
    }
    next.push(Span {
        start: b,
        end: b + 1,
        attach: Some((NodeIdx(a), Side::Right)),
    });
    a
}

/// Three nodes: the middle one on `dim` is the root, unless it ties with the smallest.
fn place_triple<const K: usize>(
    nodes: &mut [KdNode<K>],
    span: Span,
    dim: usize,
    next: &mut Vec<Span>,
) -> usize {
    let s = span.start;
    let run = &mut nodes[s..span.end];
    run.sort_unstable_by(|x, y| x.cmp_on(y, dim));
    if nodes[s].coords[dim] < nodes[s + 1].coords[dim] {
        next.push(Span {
            start: s,
            end: s + 1,
            attach: Some((NodeIdx(s + 1), Side::Left)),
        });
        next.push(Span {
            start: s + 2,
            end: s + 3,
            attach: Some((NodeIdx(s + 1), Side::Right)),
        });
        s + 1
    } else {
        // Equal values must sit to the right.
        next.push(Span {
            start: s + 1,
            end: s + 3,
            attach: Some((NodeIdx(s), Side::Right)),
        });
        s
    }
}

/// Generic step: select the median on `dim` in linear time and split around it.
fn place_median<const K: usize>(
    nodes: &mut [KdNode<K>],
    span: Span,
    dim: usize,
    next: &mut Vec<Span>,
) -> usize {
    let mid = span.len() / 2;
    let slice = &mut nodes[span.start..span.end];
    slice.select_nth_unstable_by(mid, |x, y| x.cmp_on(y, dim));
    let pivot = slice[mid].coords[dim];

    // Values equal to the pivot may have landed left of it; pack the strictly smaller ones
    // first and make the earliest pivot-equal position the root.
    let mut less = 0;
    for i in 0..mid {
        if slice[i].coords[dim] < pivot {
            slice.swap(i, less);
            less += 1;
        }
    }
    slice.swap(less, mid);

    let root = span.start + less;
    if less > 0 {
        next.push(Span {
            start: span.start,
            end: root,
            attach: Some((NodeIdx(root), Side::Left)),
        });
    }
    if root + 1 < span.end {
        next.push(Span {
            start: root + 1,
            end: span.end,
            attach: Some((NodeIdx(root), Side::Right)),
        });
    }
    root
}

impl Backend for KdTree<3> {
    fn insert(&mut self, id: EntityId, position: Position) -> Result<(), IndexError> {
        self.insert_point(position.to_array(), id)
    }

    fn update(&mut self, id: EntityId, position: Position) -> Result<(), IndexError> {
        self.update_point(id, position.to_array())
    }

    fn remove(&mut self, id: EntityId) -> Result<(), IndexError> {
        self.delete(id)
    }

    fn position(&self, id: EntityId) -> Option<Position> {
        self.point(id).map(Position::from_array)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        Self::clear(self);
    }

    fn query_range<'a>(
        &'a self,
        center: Position,
        radius: f64,
    ) -> Box<dyn Iterator<Item = EntityId> + 'a> {
        Box::new(self.query_radius(&center.to_array(), radius).into_iter())
    }
}
