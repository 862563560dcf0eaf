use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use market_engine::prelude::*;
use std::hint::black_box;

fn fresh_manager() -> MarketManager {
    let mut m = MarketManager::new();
    m.add_symbol(Symbol::new(0, "BENCH")).unwrap();
    m.add_order_book(0).unwrap();
    m.add_user(User::new(0, "maker")).unwrap();
    m.add_user(User::new(1, "taker")).unwrap();
    m
}

/// Resting a book with `count` non-crossing limit orders, alternating sides
/// and price levels, then measuring one additional non-crossing insert.
fn bench_resting_inserts(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_book - resting inserts");
    for &count in &[100u64, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("add_limit", count), &count, |b, &count| {
            b.iter_with_setup(
                || {
                    let mut m = fresh_manager();
                    for i in 0..count {
                        let price = 1_000 + (i % 500);
                        m.add_order(Order::limit(i + 1, 0, 0, Side::Buy, price, 10)).unwrap();
                    }
                    m
                },
                |mut m| {
                    let next_id = count + 1;
                    black_box(m.add_order(Order::limit(next_id, 0, 0, Side::Buy, 500, 10)).unwrap());
                },
            );
        });
    }
    group.finish();
}

/// A single aggressive order walking through `depth` resting price levels on
/// the opposite side, fully consuming each one.
fn bench_matching_cascade(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_book - matching cascade");
    for &depth in &[10u64, 100, 1_000] {
        group.bench_with_input(BenchmarkId::new("sweep_levels", depth), &depth, |b, &depth| {
            b.iter_with_setup(
                || {
                    let mut m = fresh_manager();
                    for i in 0..depth {
                        m.add_order(Order::limit(i + 1, 0, 0, Side::Sell, 100 + i, 10)).unwrap();
                    }
                    m
                },
                |mut m| {
                    let sweep_id = depth + 1;
                    black_box(
                        m.add_order(Order::limit(sweep_id, 0, 1, Side::Buy, 100 + depth, 10 * depth))
                            .unwrap(),
                    );
                },
            );
        });
    }
    group.finish();
}

/// Repricing a single trailing-stop order once per trade as the market walks
/// away from it, the steady-state cost of holding trailing stops live.
fn bench_trailing_stop_repricing(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_book - trailing stop repricing");
    group.bench_function("ratchet_on_each_trade", |b| {
        b.iter_with_setup(
            || {
                let mut m = fresh_manager();
                for i in 0..200u64 {
                    m.add_order(Order::limit(i + 1, 0, 0, Side::Sell, 10_000 - i, 10)).unwrap();
                }
                m.add_order(Order::trailing_stop(1_000, 0, 1, Side::Buy, 20_000, 20_000, 5, 5, 1))
                    .unwrap();
                m
            },
            |mut m| {
                black_box(m.add_order(Order::limit(2_000, 0, 0, Side::Buy, 9_900, 10)).unwrap());
            },
        );
    });
    group.finish();
}

criterion_group!(benches, bench_resting_inserts, bench_matching_cascade, bench_trailing_stop_repricing);
criterion_main!(benches);
