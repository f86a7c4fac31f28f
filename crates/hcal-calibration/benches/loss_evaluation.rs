use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hcal_calibration::{synthetic_quote_table, LossEvaluator};
use hcal_models::{HestonParams, ParameterBounds};
use hcal_pricingengines::{AnalyticHestonEngine, MarketParams};
use std::hint::black_box;

fn bench_loss(c: &mut Criterion) {
    let market = MarketParams::new(100.0, 0.01, 0.0);
    let truth = HestonParams::new(0.04, 2.0, 0.04, 0.4, -0.6, 0.0);
    let trial = HestonParams::new(0.05, 3.0, 0.05, 0.5, -0.5, 0.0);
    let moneyness: Vec<f64> = (0..9).map(|i| 0.8 + 0.05 * i as f64).collect();
    let engine = AnalyticHestonEngine::default();

    let mut group = c.benchmark_group("loss_evaluate");
    for &maturities in &[1usize, 4, 12] {
        let times: Vec<f64> = (1..=maturities).map(|i| i as f64 / 4.0).collect();
        let table = synthetic_quote_table(&market, &times, &moneyness, &truth, &engine)
            .expect("synthetic quotes should price");
        let loss = LossEvaluator::new(&table, &engine, ParameterBounds::default());
        group.bench_with_input(BenchmarkId::from_parameter(maturities), &maturities, |b, _| {
            b.iter(|| loss.evaluate(black_box(&trial)).expect("loss should evaluate"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_loss);
criterion_main!(benches);
