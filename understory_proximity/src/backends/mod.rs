// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend implementations for different spatial strategies.
//!
//! - `brute_force`: hash map plus linear scan. O(1) mutations, O(n) queries. The reference.
//! - `kdtree`: array-backed k-d tree with a depth ceiling and full rebalance. Generic over the
//!   dimension `K`; the [`Backend`](crate::Backend) impl is for `K = 3`.
//! - `any`: enum over both, for picking a backend from configuration at runtime.
//!
//! Radius queries on the tree first collect the axis-aligned box of half-width `radius`
//! around the center, then keep only the candidates whose exact squared distance is within
//! `radius²`. The brute-force backend applies the same distance test to every entry, so
//! the two agree point for point, including on the boundary.

pub mod any;
pub mod brute_force;
pub mod kdtree;

pub use any::{AnyBackend, BackendKind, ParseBackendKindError};

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::brute_force::BruteForce;
    use super::kdtree::{KdTree, KdTreeConfig};
    use crate::backend::Backend;
    use crate::types::{EntityId, Position};

    fn query(b: &dyn Backend, center: Position, radius: f64) -> HashSet<EntityId> {
        b.query_range(center, radius).collect()
    }

    // Integer-valued coordinates keep both backends on exact arithmetic.
    fn random_position(rng: &mut SmallRng, extent: i32) -> Position {
        Position::new(
            f64::from(rng.random_range(-extent..=extent)),
            f64::from(rng.random_range(-extent..=extent)),
            f64::from(rng.random_range(-extent..=extent)),
        )
    }

    // Mostly ordinary radii, with the degenerate and overflow-prone ones mixed in.
    fn random_radius(rng: &mut SmallRng, extent: i32) -> f64 {
        match rng.random_range(0..12) {
            0 => -f64::from(rng.random_range(1..=extent)),
            1 => 0.0,
            2 => f64::INFINITY,
            3 => f64::MAX.sqrt(),
            4 => f64::MAX.sqrt() * 2.0,
            _ => f64::from(rng.random_range(0..=extent)),
        }
    }

    fn both_backends(points: &[Position]) -> (BruteForce, KdTree<3>) {
        let mut reference = BruteForce::new();
        let mut tree = KdTree::<3>::new();
        for (i, p) in points.iter().copied().enumerate() {
            let id = EntityId(u32::try_from(i).unwrap());
            reference.insert(id, p).unwrap();
            tree.insert(id, p).unwrap();
        }
        (reference, tree)
    }

    fn run_equivalence(seed: u64, config: KdTreeConfig, extent: i32, steps: usize) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut reference = BruteForce::new();
        let mut tree = KdTree::<3>::with_config(config);
        let mut live: Vec<EntityId> = Vec::new();
        let mut next_id = 0_u32;

        for step in 0..steps {
            match rng.random_range(0..10) {
                0..=3 => {
                    let id = EntityId(next_id);
                    next_id += 1;
                    let p = random_position(&mut rng, extent);
                    reference.insert(id, p).unwrap();
                    tree.insert(id, p).unwrap();
                    live.push(id);
                }
                4..=6 if !live.is_empty() => {
                    let id = live[rng.random_range(0..live.len())];
                    let p = random_position(&mut rng, extent);
                    reference.update(id, p).unwrap();
                    tree.update(id, p).unwrap();
                }
                7 if !live.is_empty() => {
                    let id = live.swap_remove(rng.random_range(0..live.len()));
                    reference.remove(id).unwrap();
                    tree.remove(id).unwrap();
                }
                _ => {
                    let center = random_position(&mut rng, extent);
                    let radius = random_radius(&mut rng, extent);
                    assert_eq!(
                        query(&tree, center, radius),
                        query(&reference, center, radius),
                        "seed {seed}, step {step}, center {center:?}, radius {radius}"
                    );
                }
            }
        }

        tree.check_invariants().unwrap();
        let everyone: HashSet<EntityId> = live.iter().copied().collect();
        assert_eq!(query(&tree, Position::ORIGIN, f64::INFINITY), everyone);
        assert_eq!(query(&reference, Position::ORIGIN, f64::INFINITY), everyone);
    }

    #[test]
    fn negative_radius_matches_nothing() {
        let (reference, tree) = both_backends(&[Position::new(0.5, 0.0, 0.0), Position::ORIGIN]);
        for radius in [-1.0, -0.25, -f64::INFINITY, f64::NAN] {
            assert!(
                query(&reference, Position::ORIGIN, radius).is_empty(),
                "r = {radius}"
            );
            assert!(
                query(&tree, Position::ORIGIN, radius).is_empty(),
                "r = {radius}"
            );
        }
    }

    #[test]
    fn huge_radius_and_coordinates_agree() {
        let (reference, tree) = both_backends(&[
            Position::new(1.0e300, 0.0, 0.0),
            Position::ORIGIN,
            Position::new(0.0, -1.0e199, 0.0),
            Position::new(1.0e200, 1.0e200, 0.0),
        ]);
        let cases = [
            (1.0e200, vec![1, 2]),
            (1.5e200, vec![1, 2, 3]),
            (1.0e300, vec![0, 1, 2, 3]),
            (f64::MAX, vec![0, 1, 2, 3]),
            (f64::INFINITY, vec![0, 1, 2, 3]),
        ];
        for (radius, ids) in cases {
            let expected: HashSet<EntityId> = ids.into_iter().map(EntityId).collect();
            assert_eq!(
                query(&reference, Position::ORIGIN, radius),
                expected,
                "r = {radius}"
            );
            assert_eq!(
                query(&tree, Position::ORIGIN, radius),
                expected,
                "r = {radius}"
            );
        }
    }

    #[test]
    fn kd_tree_matches_brute_force() {
        for seed in 0..8 {
            run_equivalence(seed, KdTreeConfig::default(), 1000, 2000);
        }
    }

    #[test]
    fn kd_tree_matches_brute_force_with_tight_ceiling() {
        // Frequent rebalances interleaved with deletes.
        for seed in 100..104 {
            run_equivalence(
                seed,
                KdTreeConfig::default().with_allowed_depth(12),
                1000,
                2000,
            );
        }
    }

    #[test]
    fn kd_tree_matches_brute_force_on_crowded_grid() {
        // A tiny extent forces many coordinate ties and boundary hits.
        for seed in 200..204 {
            run_equivalence(seed, KdTreeConfig::default(), 4, 1500);
        }
    }
}
