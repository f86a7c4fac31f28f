//! Vega-weighted pricing loss.
//!
//! The loss of a parameter vector is
//! `mean(((market − model) / max(vega, vega_floor))²)` over the table. Model
//! prices come from one pricer call per maturity group; the results are
//! scattered back to table order before the residuals are taken.

use hcal_core::{errors::Result, Price, Real};
use hcal_math::{Array, CostFunction};
use hcal_models::{HestonParams, ParameterBounds};
use hcal_pricingengines::HestonPricer;

use crate::quotes::QuoteTable;

/// Default floor on vegas used as weights.
pub const DEFAULT_VEGA_FLOOR: Real = 1e-12;

/// Loss of a Heston vector against one quote table.
///
/// Evaluation is a pure function of the parameters; the evaluator can be
/// shared between optimizer worker threads.
#[derive(Clone, Copy)]
pub struct LossEvaluator<'a> {
    table: &'a QuoteTable,
    pricer: &'a dyn HestonPricer,
    bounds: ParameterBounds,
    vega_floor: Real,
}

impl<'a> LossEvaluator<'a> {
    /// Create an evaluator with the default vega floor.
    pub fn new(
        table: &'a QuoteTable,
        pricer: &'a dyn HestonPricer,
        bounds: ParameterBounds,
    ) -> Self {
        Self {
            table,
            pricer,
            bounds,
            vega_floor: DEFAULT_VEGA_FLOOR,
        }
    }

    /// Replace the vega floor.
    pub fn with_vega_floor(mut self, vega_floor: Real) -> Self {
        self.vega_floor = vega_floor;
        self
    }

    /// The quote table.
    pub fn table(&self) -> &'a QuoteTable {
        self.table
    }

    /// The parameter box enforced before pricing.
    pub fn bounds(&self) -> &ParameterBounds {
        &self.bounds
    }

    /// Model prices of every quote's fitted side, in table order.
    ///
    /// # Errors
    /// Input inconsistency on an empty table, a bounds violation for a vector
    /// outside the box, or any pricer failure.
    pub fn model_prices(&self, params: &HestonParams) -> Result<Vec<Price>> {
        self.table.ensure_non_empty()?;
        self.bounds.check(params)?;
        let spot = self.table.spot();
        let mut prices = vec![0.0; self.table.len()];
        for group in self.table.groups() {
            let batch = self.pricer.price_batch(
                group.time,
                &group.strikes,
                &group.market(spot),
                params,
                &group.sides,
            )?;
            for (&i, price) in group.indices.iter().zip(batch) {
                prices[i] = price;
            }
        }
        Ok(prices)
    }

    /// Mean squared vega-weighted pricing error.
    ///
    /// # Errors
    /// See [`model_prices`](Self::model_prices).
    pub fn evaluate(&self, params: &HestonParams) -> Result<Real> {
        let model = self.model_prices(params)?;
        let sum: Real = self
            .table
            .quotes()
            .iter()
            .zip(&model)
            .map(|(q, &m)| ((q.market_price() - m) / q.vega.max(self.vega_floor)).powi(2))
            .sum();
        Ok(sum / model.len() as Real)
    }
}

impl std::fmt::Debug for LossEvaluator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LossEvaluator")
            .field("quotes", &self.table.len())
            .field("maturities", &self.table.groups().len())
            .field("bounds", &self.bounds)
            .field("vega_floor", &self.vega_floor)
            .finish()
    }
}

impl CostFunction for LossEvaluator<'_> {
    fn value(&self, x: &Array) -> Result<Real> {
        self.evaluate(&HestonParams::from_array(x)?)
    }
}
