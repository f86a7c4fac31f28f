use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hcal_core::OptionType;
use hcal_models::HestonParams;
use hcal_pricingengines::{black_scholes_merton, AnalyticHestonEngine, HestonPricer, MarketParams};
use std::hint::black_box;

fn bench_black_scholes(c: &mut Criterion) {
    let market = MarketParams::new(100.0, 0.05, 0.0);
    c.bench_function("black_scholes_merton_call", |b| {
        b.iter(|| {
            black_box(black_scholes_merton(
                OptionType::Call,
                0.2,
                1.0,
                black_box(100.0),
                &market,
            ))
        })
    });
}

fn bench_heston_batch(c: &mut Criterion) {
    let market = MarketParams::new(100.0, 0.01, 0.0);
    let params = HestonParams::new(0.04, 2.0, 0.04, 0.4, -0.6, 0.0);
    let mut group = c.benchmark_group("heston_price_batch");
    for &order in &[64usize, 128, 185] {
        let engine = AnalyticHestonEngine::new(order);
        let strikes: Vec<f64> = (0..41).map(|i| 80.0 + i as f64).collect();
        let sides = vec![OptionType::Call; strikes.len()];
        group.bench_with_input(BenchmarkId::from_parameter(order), &order, |b, _| {
            b.iter(|| {
                engine
                    .price_batch(0.5, black_box(&strikes), &market, &params, &sides)
                    .expect("pricing should succeed")
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_black_scholes, bench_heston_batch);
criterion_main!(benches);
