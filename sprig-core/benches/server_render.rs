//! Benchmarks for server rendering, parsing and signal propagation
//!
//! Run with: cargo bench -p sprig-core --bench server_render

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use sprig_core::dom::parse_fragment;
use sprig_core::reactive::{create_signal_in, Scheduler};
use sprig_core::render::{each, render_to_string};
use sprig_core::tags::{li, span, ul};

fn rows(n: usize) -> Vec<(usize, String)> {
    (0..n).map(|i| (i, format!("row {i}"))).collect()
}

fn bench_render_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("server_render_list");
    let scheduler = Scheduler::new();

    for n in [10, 100, 1000] {
        let (items, _) = create_signal_in(&scheduler, rows(n));
        group.bench_with_input(BenchmarkId::from_parameter(n), &items, |b, items| {
            b.iter(|| {
                render_to_string(|| {
                    ul().child(each(
                        black_box(items),
                        |row| row.0,
                        |row, _| li().child(span().child(row.derive(|row, _| row.1.clone()))),
                    ))
                })
            });
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let scheduler = Scheduler::new();
    let (items, _) = create_signal_in(&scheduler, rows(500));
    let html = render_to_string(|| {
        ul().child(each(&items, |row| row.0, |row, _| li().child(row.derive(|row, _| row.1.clone()))))
    });

    c.bench_function("parse_fragment_500_rows", |b| {
        b.iter(|| parse_fragment(black_box(&html)))
    });
}

fn bench_derive_chain(c: &mut Criterion) {
    let scheduler = Scheduler::new();
    let (base, set_base) = create_signal_in(&scheduler, 0u64);
    // Each link only holds a weak handle downstream, so keep them all alive.
    let mut chain = vec![base.derive(|n, _| n + 1)];
    for _ in 0..31 {
        let next = chain[chain.len() - 1].derive(|n, _| n + 1);
        chain.push(next);
    }
    let tail = chain[chain.len() - 1].clone();
    tail.get();

    c.bench_function("derive_chain_32", |b| {
        b.iter(|| {
            set_base.update(|n| n + 1);
            black_box(tail.get())
        })
    });
}

criterion_group!(benches, bench_render_list, bench_parse, bench_derive_chain);
criterion_main!(benches);
