// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Basic usage of Understory Proximity: a channel finds receivers near each transmitter.
//!
//! Pass a backend name (`brute-force` or `kd-tree`) as the first argument to pick one.

use std::rc::Rc;

use understory_proximity::{BackendKind, EntityId, Index, Position, PositionSource, PositionTable};

fn main() {
    let kind: BackendKind = match std::env::args().nth(1) {
        Some(name) => match name.parse() {
            Ok(kind) => kind,
            Err(err) => {
                eprintln!("{err}");
                std::process::exit(2);
            }
        },
        None => BackendKind::default(),
    };

    let mobility = Rc::new(PositionTable::new());
    let mut idx = Index::with_backend_kind(Rc::clone(&mobility), kind);

    // Nodes on a line, 100 m apart.
    for i in 0..10_u32 {
        let p = Position::new(f64::from(i) * 100.0, 0.0, 0.0);
        mobility.set_position(EntityId(i), p);
        idx.add(EntityId(i), p).unwrap();
    }

    let range = 250.0;
    let tx = EntityId(4);
    let at = mobility.position(tx).unwrap_or(Position::ORIGIN);
    let mut rx: Vec<_> = idx.query_range(at, range, Some(tx)).into_iter().collect();
    rx.sort_unstable();
    println!("[{kind}] {tx} reaches {rx:?}");

    // Node 6 walks away; the index notices on the next query.
    mobility.set_position(EntityId(6), Position::new(600.0, 500.0, 0.0));
    println!("pending notifications: {}", idx.pending_len());
    let mut rx: Vec<_> = idx.query_range(at, range, Some(tx)).into_iter().collect();
    rx.sort_unstable();
    println!("[{kind}] {tx} reaches {rx:?}");

    // A quiet move only shows up after a periodic tick.
    mobility.set_position_quiet(EntityId(3), Position::new(300.0, 0.0, 900.0));
    mobility.periodic_sync();
    let report = idx.commit();
    println!(
        "sync: moved={:?}, unchanged={:?}, stale={:?}",
        report.moved, report.unchanged, report.stale
    );
}
