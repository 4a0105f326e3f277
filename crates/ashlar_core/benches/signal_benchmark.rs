//! # Signal Dispatch Benchmark
//!
//! Run with: `cargo bench --package ashlar_core --bench signal_benchmark`

#![allow(missing_docs)]

use std::cell::Cell;
use std::rc::Rc;

use ashlar_core::{Signal0, Signal1};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Benchmark: dispatch to N plain listeners.
fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    for listeners in [1, 8, 64] {
        let signal: Signal1<u64> = Signal1::new();
        let total = Rc::new(Cell::new(0_u64));
        for _ in 0..listeners {
            let total = Rc::clone(&total);
            signal.add(move |value: &u64| total.set(total.get().wrapping_add(*value)));
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(listeners),
            &listeners,
            |b, _| {
                b.iter(|| signal.dispatch(black_box(&1)));
            },
        );
    }

    group.finish();
}

/// Benchmark: register and fire one-shot listeners, reusing freed slots.
fn bench_add_once(c: &mut Criterion) {
    let signal = Signal0::new();
    let fired = Rc::new(Cell::new(0_u64));

    c.bench_function("add_once_dispatch_16", |b| {
        b.iter(|| {
            for _ in 0..16 {
                let fired = Rc::clone(&fired);
                signal.add_once(move |_: &()| fired.set(fired.get() + 1));
            }
            signal.dispatch(&());
            black_box(signal.len())
        });
    });
}

/// Benchmark: nested dispatch from inside a listener.
fn bench_nested_dispatch(c: &mut Criterion) {
    let signal = Rc::new(Signal1::<u32>::new());
    let weak = Rc::downgrade(&signal);
    signal.add(move |depth: &u32| {
        if let (true, Some(signal)) = (*depth > 0, weak.upgrade()) {
            signal.dispatch(&(depth - 1));
        }
    });

    c.bench_function("nested_dispatch_depth_8", |b| {
        b.iter(|| signal.dispatch(black_box(&8)));
    });
}

criterion_group!(benches, bench_dispatch, bench_add_once, bench_nested_dispatch);
criterion_main!(benches);
