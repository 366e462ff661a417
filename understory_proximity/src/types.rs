// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive identifier and geometry types.

use std::fmt;

/// Opaque handle for a tracked entity.
///
/// Ids are assigned by the caller (usually the simulation's node id) and must be
/// unique among currently tracked entities. The index never allocates or recycles them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for EntityId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Point in 3D space.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Position {
    /// The origin.
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    /// Create a new position.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Coordinates as an array, in `x, y, z` order.
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Build a position from an `[x, y, z]` array.
    pub const fn from_array(a: [f64; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }

    /// Squared Euclidean distance to `other`.
    pub fn distance_squared(self, other: Self) -> f64 {
        distance_squared(&self.to_array(), &other.to_array())
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    pub(crate) fn has_nan(self) -> bool {
        self.x.is_nan() || self.y.is_nan() || self.z.is_nan()
    }
}

impl From<[f64; 3]> for Position {
    fn from(a: [f64; 3]) -> Self {
        Self::from_array(a)
    }
}

impl From<Position> for [f64; 3] {
    fn from(p: Position) -> Self {
        p.to_array()
    }
}

/// Squared Euclidean distance between two `K`-dimensional points.
#[inline]
pub fn distance_squared<const K: usize>(a: &[f64; K], b: &[f64; K]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// Euclidean distance between two `K`-dimensional points, scaled so that squaring
/// neither overflows nor underflows.
pub fn distance<const K: usize>(a: &[f64; K], b: &[f64; K]) -> f64 {
    let scale = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max);
    if scale == 0.0 || !scale.is_finite() {
        return scale;
    }
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let t = (x - y) / scale;
            t * t
        })
        .sum();
    scale * sum.sqrt()
}

/// Whether `p` lies inside the closed ball of `radius` around `center`.
///
/// Both backends filter through this exact test so they agree on boundary points.
/// A negative or NaN radius describes an empty ball.
#[inline]
pub fn within_radius<const K: usize>(p: &[f64; K], center: &[f64; K], radius: f64) -> bool {
    if radius.is_nan() || radius < 0.0 {
        return false;
    }
    let r2 = radius * radius;
    let d2 = distance_squared(p, center);
    // Squares of very large or very small magnitudes lose the comparison.
    if r2.is_normal() && d2.is_finite() {
        return d2 <= r2;
    }
    distance(p, center) <= radius
}

/// Axis-aligned box enclosing the ball of `radius` around `center`, as `(low, high)` corners.
///
/// Widened by a few ulps of the largest magnitude involved so that rounding in
/// `center ± radius` never excludes a point that [`within_radius`] accepts.
pub fn search_box<const K: usize>(center: &[f64; K], radius: f64) -> ([f64; K], [f64; K]) {
    let mut low = *center;
    let mut high = *center;
    for d in 0..K {
        let slack = (center[d].abs() + radius.abs()) * (8.0 * f64::EPSILON);
        low[d] = center[d] - radius - slack;
        high[d] = center[d] + radius + slack;
    }
    (low, high)
}
