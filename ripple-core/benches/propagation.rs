//! Benchmarks for ripple-core
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ripple_core::reactive::{Effect, Memo, Signal};

// =============================================================================
// SIGNAL BENCHMARKS
// =============================================================================

fn bench_signal_get(c: &mut Criterion) {
    let s = Signal::new(42i32);
    c.bench_function("signal_get", |b| b.iter(|| black_box(s.get())));
}

fn bench_signal_set_unobserved(c: &mut Criterion) {
    let s = Signal::new(0i32);
    let mut i = 0i32;
    c.bench_function("signal_set_unobserved", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            s.set(black_box(i)).unwrap()
        })
    });
}

fn bench_signal_set_same_value(c: &mut Criterion) {
    let s = Signal::new(42i32);
    let s_clone = s.clone();
    let _effect = Effect::new(move || {
        black_box(s_clone.get());
    })
    .unwrap();

    c.bench_function("signal_set_same_value", |b| {
        b.iter(|| s.set(black_box(42)).unwrap())
    });
}

// =============================================================================
// PROPAGATION BENCHMARKS
// =============================================================================

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for width in [1, 10, 100] {
        group.bench_with_input(BenchmarkId::new("effects", width), &width, |b, &width| {
            let s = Signal::new(0i32);
            let _effects: Vec<_> = (0..width)
                .map(|_| {
                    let s = s.clone();
                    Effect::new(move || {
                        black_box(s.get());
                    })
                    .unwrap()
                })
                .collect();

            let mut i = 0i32;
            b.iter(|| {
                i = i.wrapping_add(1);
                s.set(black_box(i)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_effect_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("effect_chain");

    for length in [1, 10, 50] {
        group.bench_with_input(BenchmarkId::new("length", length), &length, |b, &length| {
            let signals: Vec<_> = (0..=length).map(|_| Signal::new(0i32)).collect();
            let _effects: Vec<_> = signals
                .windows(2)
                .map(|pair| {
                    let (from, to) = (pair[0].clone(), pair[1].clone());
                    Effect::try_new(move || to.set(from.get())).unwrap()
                })
                .collect();

            let mut i = 0i32;
            b.iter(|| {
                i = i.wrapping_add(1);
                signals[0].set(black_box(i)).unwrap()
            })
        });
    }

    group.finish();
}

// =============================================================================
// MEMO BENCHMARKS
// =============================================================================

fn bench_memo_get_cached(c: &mut Criterion) {
    let s = Signal::new(42i32);
    let s_clone = s.clone();
    let m = Memo::new(move || s_clone.get() * 2);

    // First get to cache the value
    let _ = m.get();

    c.bench_function("memo_get_cached", |b| b.iter(|| black_box(m.get())));
}

fn bench_memo_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("memo_chain");

    for depth in [1, 5, 20] {
        group.bench_with_input(BenchmarkId::new("depth", depth), &depth, |b, &depth| {
            let s = Signal::new(1i32);

            let mut current = {
                let s = s.clone();
                Memo::new(move || s.get() + 1)
            };
            for _ in 1..depth {
                let prev = current.clone();
                current = Memo::new(move || prev.get() + 1);
            }

            let mut i = 0i32;
            b.iter(|| {
                i = i.wrapping_add(1);
                s.set(black_box(i)).unwrap();
                black_box(current.get())
            })
        });
    }

    group.finish();
}

fn bench_diamond(c: &mut Criterion) {
    let a = Signal::new(0i32);
    let (a1, a2) = (a.clone(), a.clone());
    let left = Memo::new(move || a1.get() * 2);
    let right = Memo::new(move || a2.get() + 1);

    let (l, r) = (left.clone(), right.clone());
    let _sink = Effect::new(move || {
        black_box(l.get() + r.get());
    })
    .unwrap();

    let mut i = 0i32;
    c.bench_function("diamond", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            a.set(black_box(i)).unwrap()
        })
    });
}

criterion_group!(
    signals,
    bench_signal_get,
    bench_signal_set_unobserved,
    bench_signal_set_same_value,
);

criterion_group!(propagation, bench_fan_out, bench_effect_chain, bench_diamond);

criterion_group!(memos, bench_memo_get_cached, bench_memo_chain);

criterion_main!(signals, propagation, memos);
