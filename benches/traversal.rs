//! Benchmarks for the traversal engine.
//!
//! Measures:
//! - Full recursive walks over uniform trees (engine overhead per node)
//! - Interest-driven field lookup vs full iteration over wide maps
//! - Transform-identity walks (rebuild and sharing costs)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use wayfarer::prelude::*;

/// A map with `width` integer fields named f0..f{width-1}.
fn wide_map(width: usize) -> Arc<Node> {
    Arc::new(Node::map(
        (0..width).map(|i| (format!("f{}", i), Node::Int(i as i64))),
    ))
}

/// A uniform binary tree of the given depth with integer leaves.
fn binary_tree(depth: u32) -> Node {
    if depth == 0 {
        return Node::Int(1);
    }
    Node::map([("l", binary_tree(depth - 1)), ("r", binary_tree(depth - 1))])
}

/// A selector walking everything and matching everything.
fn walk_all() -> Selector {
    Selector::explore_recursive(
        RecursionLimit::None,
        Selector::explore_union([
            Selector::matcher(),
            Selector::explore_all(Selector::explore_recursive_edge()),
        ]),
    )
}

fn bench_full_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_walk");
    for depth in [6u32, 10] {
        let root = Arc::new(binary_tree(depth));
        let selector = walk_all();
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                let mut count = 0u64;
                traverse(black_box(&root), &selector, |_progress, _node| {
                    count += 1;
                    Ok(())
                })
                .unwrap();
                black_box(count)
            })
        });
    }
    group.finish();
}

fn bench_interest_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("interest_lookup");
    for width in [64usize, 1024] {
        let root = wide_map(width);
        // Interested in one field: the engine should look it up directly
        // instead of iterating the whole map.
        let narrow = Selector::explore_fields([("f1", Selector::matcher())]);
        let broad = Selector::explore_all(Selector::matcher());

        group.bench_with_input(BenchmarkId::new("one_field", width), &width, |b, _| {
            b.iter(|| {
                traverse(black_box(&root), &narrow, |_p, node| {
                    black_box(node);
                    Ok(())
                })
                .unwrap()
            })
        });
        group.bench_with_input(BenchmarkId::new("all_fields", width), &width, |b, _| {
            b.iter(|| {
                traverse(black_box(&root), &broad, |_p, node| {
                    black_box(node);
                    Ok(())
                })
                .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_transform_identity(c: &mut Criterion) {
    let root = Arc::new(binary_tree(8));
    let selector = walk_all();
    c.bench_function("transform_identity", |b| {
        b.iter(|| {
            let out =
                traverse_transform(black_box(&root), &selector, |_p, node| Ok(node.clone()))
                    .unwrap();
            black_box(out)
        })
    });
}

criterion_group!(
    benches,
    bench_full_walk,
    bench_interest_lookup,
    bench_transform_identity
);
criterion_main!(benches);
