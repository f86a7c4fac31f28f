//! Loss evaluator integration tests: batching, oracle call counts and
//! bounds enforcement.

use std::sync::atomic::{AtomicUsize, Ordering};

use hcal_calibration::{market_data::quote_from_implied_vol, LossEvaluator, QuoteTable};
use hcal_core::{errors::Error, errors::Result, OptionType, Price, Real, Time};
use hcal_models::{HestonParams, ParameterBounds};
use hcal_pricingengines::{AnalyticHestonEngine, HestonPricer, MarketParams};

/// Counts batch calls and forwards them to an analytic engine.
struct CountingPricer {
    inner: AnalyticHestonEngine,
    calls: AtomicUsize,
}

impl CountingPricer {
    fn new() -> Self {
        Self {
            inner: AnalyticHestonEngine::default(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HestonPricer for CountingPricer {
    fn price_batch(
        &self,
        time_to_expiry: Time,
        strikes: &[Real],
        market: &MarketParams,
        params: &HestonParams,
        sides: &[OptionType],
    ) -> Result<Vec<Price>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.price_batch(time_to_expiry, strikes, market, params, sides)
    }
}

// Three maturities, interleaved so that table order differs from group order.
fn interleaved_table() -> QuoteTable {
    let rows = [
        (1.0, 0.9, 0.24),
        (0.25, 1.0, 0.21),
        (0.5, 1.1, 0.19),
        (1.0, 1.05, 0.20),
        (0.25, 0.85, 0.27),
        (0.5, 0.95, 0.22),
        (1.0, 1.2, 0.18),
    ];
    let quotes = rows
        .iter()
        .map(|&(t, m, iv)| quote_from_implied_vol(100.0, t, m, iv, 0.02, 0.01))
        .collect();
    QuoteTable::new(100.0, None, quotes).unwrap()
}

fn params() -> HestonParams {
    HestonParams::new(0.05, 1.5, 0.06, 0.5, -0.7, 0.0)
}

#[test]
fn batched_loss_matches_row_by_row_pricing() {
    let table = interleaved_table();
    let engine = AnalyticHestonEngine::default();
    let loss = LossEvaluator::new(&table, &engine, ParameterBounds::default());
    let batched = loss.evaluate(&params()).unwrap();

    let row_by_row: Real = table
        .quotes()
        .iter()
        .map(|q| {
            let model = engine
                .price(q.time_to_expiry, q.strike, &q.market(table.spot()), &params(), q.side)
                .unwrap();
            ((q.market_price() - model) / q.vega.max(1e-12)).powi(2)
        })
        .sum::<Real>()
        / table.len() as Real;

    assert!(
        ((batched - row_by_row) / row_by_row).abs() < 1e-8,
        "batched {batched} vs row by row {row_by_row}"
    );
}

#[test]
fn oracle_called_once_per_maturity() {
    let table = interleaved_table();
    assert_eq!(table.groups().len(), 3);
    let pricer = CountingPricer::new();
    let loss = LossEvaluator::new(&table, &pricer, ParameterBounds::default());

    loss.evaluate(&params()).unwrap();
    assert_eq!(pricer.calls(), 3);
    loss.evaluate(&params()).unwrap();
    assert_eq!(pricer.calls(), 6);
}

#[test]
fn groups_are_ascending_in_time() {
    let table = interleaved_table();
    let times: Vec<Time> = table.groups().iter().map(|g| g.time).collect();
    assert_eq!(times, vec![0.25, 0.5, 1.0]);
    assert_eq!(table.groups()[2].indices, vec![0, 3, 6]);
}

#[test]
fn out_of_bounds_vector_is_rejected_before_pricing() {
    let table = interleaved_table();
    let pricer = CountingPricer::new();
    let loss = LossEvaluator::new(&table, &pricer, ParameterBounds::default());

    let too_fast = HestonParams::new(0.05, 20.0, 0.06, 0.5, -0.7, 0.0);
    match loss.evaluate(&too_fast) {
        Err(Error::BoundsViolation {
            parameter,
            value,
            upper,
            ..
        }) => {
            assert_eq!(parameter, "kappa");
            assert_eq!(value, 20.0);
            assert_eq!(upper, 15.0);
        }
        other => panic!("expected a bounds violation, got {other:?}"),
    }

    let with_premium = HestonParams::new(0.05, 1.5, 0.06, 0.5, -0.7, 0.1);
    assert!(matches!(
        loss.evaluate(&with_premium),
        Err(Error::BoundsViolation { parameter: "lambda", .. })
    ));
    assert_eq!(pricer.calls(), 0);
}

#[test]
fn vega_floor_bounds_the_weights() {
    let table = interleaved_table();
    let engine = AnalyticHestonEngine::default();
    let plain = LossEvaluator::new(&table, &engine, ParameterBounds::default());
    let floored = plain.with_vega_floor(1e3);
    let a = plain.evaluate(&params()).unwrap();
    let b = floored.evaluate(&params()).unwrap();
    assert!(b < a);
}
