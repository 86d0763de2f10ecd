use criterion::{Criterion, black_box, criterion_group, criterion_main};
use streetpy_core::prelude::*;

#[path = "../tests/common/mod.rs"]
mod common;

use common::{grid, node};

const SIZE: usize = 30;

fn drive_graph() -> ModeGraph {
    let modal = to_single_mode(&grid(SIZE), None, Mode::Drive, &SpeedConfig::default())
        .expect("grid is drivable");
    ModeGraph::new(&modal)
}

fn bench_single_mode(c: &mut Criterion) {
    let table = grid(SIZE);
    let speeds = SpeedConfig::default();
    c.bench_function("to_single_mode", |b| {
        b.iter(|| to_single_mode(black_box(&table), None, Mode::Drive, &speeds))
    });
}

fn bench_routing(c: &mut Criterion) {
    let graph = drive_graph();
    let (source, target) = (node(SIZE, 1, 1), node(SIZE, SIZE - 2, SIZE - 2));
    c.bench_function("shortest_path", |b| {
        b.iter(|| shortest_path(&graph, black_box(source), black_box(target), Weight::Time))
    });

    let pairs: Vec<(NodeId, NodeId)> = (1..SIZE - 1)
        .map(|i| (node(SIZE, i, 1), node(SIZE, SIZE - 1 - i, SIZE - 2)))
        .collect();
    c.bench_function("shortest_paths", |b| {
        b.iter(|| shortest_paths(&graph, black_box(&pairs), Weight::Time, true))
    });
}

fn bench_isochrone(c: &mut Criterion) {
    let graph = drive_graph();
    let center = node(SIZE, SIZE / 2, SIZE / 2);
    let options = IsochroneOptions::default();
    c.bench_function("isochrone", |b| {
        b.iter(|| calculate_isochrone(&graph, black_box(&[center]), 120.0, &options))
    });
}

criterion_group!(benches, bench_single_mode, bench_routing, bench_isochrone);
criterion_main!(benches);
