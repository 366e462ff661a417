// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![cfg(feature = "compare_rstar")]

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_proximity::{Backend, EntityId, KdTree, Position};

use rstar::RTree;
use rstar::primitives::GeomWithData;

type Entry = GeomWithData<[f64; 3], u32>;

fn gen_grid_positions(n: usize, cell: f64) -> Vec<Position> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            out.push(Position::new(x as f64 * cell, y as f64 * cell, 0.0));
        }
    }
    out
}

fn to_rstar_entries(v: &[Position]) -> Vec<Entry> {
    v.iter()
        .enumerate()
        .map(|(i, p)| GeomWithData::new(p.to_array(), i as u32))
        .collect()
}

fn bench_rstar_external_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("rstar_external_compare");
    for &n in &[64usize, 128] {
        let positions = gen_grid_positions(n, 10.0);
        let center = Position::new(320.0, 320.0, 0.0);
        let radius = 200.0;
        group.throughput(Throughput::Elements((n * n) as u64));

        group.bench_function(format!("understory_kd_tree_build_query_n{}", n), |b| {
            b.iter_batched(
                KdTree::<3>::new,
                |mut tree| {
                    for (i, p) in positions.iter().copied().enumerate() {
                        let _ = tree.insert(EntityId(i as u32), p);
                    }
                    let hits: usize = tree.query_range(center, radius).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("rstar_build_query_n{}", n), |b| {
            b.iter_batched(
                RTree::<Entry>::new,
                |mut tree| {
                    for e in to_rstar_entries(&positions) {
                        tree.insert(e);
                    }
                    let hits: usize = tree
                        .locate_within_distance(center.to_array(), radius * radius)
                        .count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("rstar_build_query_bulk_n{}", n), |b| {
            b.iter_batched(
                || to_rstar_entries(&positions),
                |entries| {
                    let tree = RTree::bulk_load(entries);
                    let hits: usize = tree
                        .locate_within_distance(center.to_array(), radius * radius)
                        .count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rstar_external_compare);
criterion_main!(benches);
