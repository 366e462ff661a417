// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_proximity::backends::kdtree::{KdTree, KdTreeConfig};
use understory_proximity::{Backend, BruteForce, EntityId, Index, Position, PositionTable};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

fn gen_uniform_positions(count: usize, extent: f64) -> Vec<Position> {
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    (0..count)
        .map(|_| {
            Position::new(
                rng.next_f64() * extent,
                rng.next_f64() * extent,
                rng.next_f64() * extent * 0.1,
            )
        })
        .collect()
}

fn gen_clustered_positions(n_clusters: usize, per_cluster: usize, spread: f64) -> Vec<Position> {
    let mut out = Vec::with_capacity(n_clusters * per_cluster);
    let mut rng = Rng::new(0xC1A5_7E55_9999_ABCD);
    let mut centers = Vec::with_capacity(n_clusters);
    for _ in 0..n_clusters {
        centers.push((rng.next_f64() * 5000.0, rng.next_f64() * 5000.0));
    }
    for (cx, cy) in centers {
        for _ in 0..per_cluster {
            let dx = (rng.next_f64() - 0.5) * spread;
            let dy = (rng.next_f64() - 0.5) * spread;
            out.push(Position::new(cx + dx, cy + dy, 1.5));
        }
    }
    out
}

// Sorted input degenerates an unbalanced tree into a list.
fn gen_line_positions(count: usize, step: f64) -> Vec<Position> {
    (0..count)
        .map(|i| Position::new(i as f64 * step, 0.0, 0.0))
        .collect()
}

fn fill<B: Backend>(mut backend: B, positions: &[Position]) -> B {
    for (i, p) in positions.iter().copied().enumerate() {
        let _ = backend.insert(EntityId(i as u32), p);
    }
    backend
}

fn bench_build_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_query");
    for &n in &[1000usize, 4000, 16000] {
        let positions = gen_uniform_positions(n, 10_000.0);
        let center = Position::new(5000.0, 5000.0, 500.0);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_function(format!("brute_force_n{}", n), |b| {
            b.iter_batched(
                || BruteForce::with_capacity(n),
                |backend| {
                    let backend = fill(backend, &positions);
                    let hits = backend.query_range(center, 750.0).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("kd_tree_n{}", n), |b| {
            b.iter_batched(
                || KdTree::<3>::with_config(KdTreeConfig::default().with_initial_capacity(n)),
                |backend| {
                    let backend = fill(backend, &positions);
                    let hits = backend.query_range(center, 750.0).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_query_heavy(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_heavy");
    let positions = gen_clustered_positions(64, 128, 300.0);
    let brute = fill(BruteForce::new(), &positions);
    let mut tree = fill(KdTree::<3>::new(), &positions);
    tree.rebalance();
    let centers: Vec<Position> = positions.iter().step_by(32).copied().collect();
    group.throughput(Throughput::Elements(centers.len() as u64));

    group.bench_function("brute_force_many_queries", |b| {
        b.iter(|| {
            let mut total = 0usize;
            for &center in &centers {
                total += brute.query_range(center, 250.0).count();
            }
            black_box(total);
        })
    });

    group.bench_function("kd_tree_many_queries", |b| {
        b.iter(|| {
            let mut total = 0usize;
            for &center in &centers {
                total += tree.query_range(center, 250.0).count();
            }
            black_box(total);
        })
    });
    group.finish();
}

fn bench_update_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_churn");
    let positions = gen_uniform_positions(4096, 10_000.0);
    group.throughput(Throughput::Elements(positions.len() as u64));

    group.bench_function("kd_tree_move_all", |b| {
        b.iter_batched(
            || fill(KdTree::<3>::new(), &positions),
            |mut tree| {
                for (j, p) in positions.iter().enumerate() {
                    let dx = (j % 5) as f64 - 2.0;
                    let dy = ((j * 7) % 5) as f64 - 2.0;
                    let _ = tree.update(EntityId(j as u32), Position::new(p.x + dx, p.y + dy, p.z));
                }
                black_box(tree.height());
            },
            BatchSize::SmallInput,
        )
    });

    group.bench_function("brute_force_move_all", |b| {
        b.iter_batched(
            || fill(BruteForce::new(), &positions),
            |mut brute| {
                for (j, p) in positions.iter().enumerate() {
                    let dx = (j % 5) as f64 - 2.0;
                    let dy = ((j * 7) % 5) as f64 - 2.0;
                    let _ =
                        brute.update(EntityId(j as u32), Position::new(p.x + dx, p.y + dy, p.z));
                }
                black_box(brute.len());
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_notified_moves(c: &mut Criterion) {
    let mut group = c.benchmark_group("notified_moves");
    let positions = gen_uniform_positions(4096, 10_000.0);
    let table = PositionTable::new();
    for (i, p) in positions.iter().copied().enumerate() {
        table.set_position(EntityId(i as u32), p);
    }
    let center = Position::new(5000.0, 5000.0, 500.0);

    group.bench_function("kd_tree_move_tenth_then_query", |b| {
        b.iter_batched(
            || {
                let mut idx = Index::with_kd_tree(&table);
                for (i, p) in positions.iter().copied().enumerate() {
                    let _ = idx.add(EntityId(i as u32), p);
                }
                idx
            },
            |mut idx| {
                for (j, p) in positions.iter().enumerate().step_by(10) {
                    table.set_position(EntityId(j as u32), Position::new(p.y, p.x, p.z));
                }
                let hits = idx.query_range(center, 750.0, None).len();
                for (j, p) in positions.iter().copied().enumerate().step_by(10) {
                    table.set_position(EntityId(j as u32), p);
                }
                idx.clear();
                black_box(hits);
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_degenerate_input(c: &mut Criterion) {
    let mut group = c.benchmark_group("degenerate_line");
    for &allowed in &[16usize, 32, 64] {
        let positions = gen_line_positions(8192, 1.0);
        group.bench_function(format!("kd_tree_sorted_insert_allowed{}", allowed), |b| {
            b.iter_batched(
                || KdTree::<3>::with_config(KdTreeConfig::default().with_allowed_depth(allowed)),
                |backend| {
                    let backend = fill(backend, &positions);
                    black_box(backend.height());
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_build_query,
    bench_query_heavy,
    bench_update_churn,
    bench_notified_moves,
    bench_degenerate_input
);
criterion_main!(benches);
