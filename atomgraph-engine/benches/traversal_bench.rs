//! Traversal benchmarks
//!
//! Measures the BFS hot path on a layered graph with cross-links, the
//! shape impact analysis sees in practice.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use atomgraph_engine::{
    Atom, AtomId, AtomType, Direction, Edge, EdgeType, GraphSnapshot, TraversalEngine,
};

fn layered_snapshot(layers: usize, width: usize) -> Arc<GraphSnapshot> {
    let mut atoms = Vec::new();
    let mut edges = Vec::new();

    for layer in 0..layers {
        for i in 0..width {
            let id = format!("L{layer}-N{i:03}");
            atoms.push(
                Atom::builder()
                    .id(id.clone())
                    .atom_type(AtomType::Design)
                    .title(format!("node {id}"))
                    .build()
                    .unwrap(),
            );
            if layer > 0 {
                // each node depends on two nodes of the previous layer
                for offset in 0..2 {
                    let parent = format!("L{}-N{:03}", layer - 1, (i + offset) % width);
                    edges.push(Edge::new(parent, id.clone(), EdgeType::Requires));
                }
            }
        }
    }

    Arc::new(GraphSnapshot::build(atoms, edges))
}

fn bench_traverse(c: &mut Criterion) {
    let snapshot = layered_snapshot(6, 100);
    let engine = TraversalEngine::new(snapshot);
    let start = AtomId::new("L0-N000");

    c.bench_function("traverse_downstream_depth3", |b| {
        b.iter(|| {
            let result = engine
                .traverse(black_box(&start), Direction::Downstream, 3)
                .unwrap();
            black_box(result.len())
        })
    });

    c.bench_function("traverse_both_depth5", |b| {
        let mid = AtomId::new("L3-N050");
        b.iter(|| {
            let result = engine
                .traverse(black_box(&mid), Direction::Both, 5)
                .unwrap();
            black_box(result.len())
        })
    });
}

criterion_group!(benches, bench_traverse);
criterion_main!(benches);
