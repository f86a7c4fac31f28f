//! Put-call parity and Feller checks.

use serde::Serialize;

use hcal_core::{errors::Result, OptionType, Real};
use hcal_models::HestonParams;
use hcal_pricingengines::HestonPricer;

use crate::quotes::QuoteTable;

/// Default absolute tolerance of the parity checks.
pub const DEFAULT_PARITY_TOLERANCE: Real = 1e-10;

/// Outcome of a put-call parity check over a quote table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParityReport {
    /// Every deviation is within tolerance.
    pub passed: bool,
    /// Largest absolute deviation; infinite when a deviation is NaN.
    pub max_abs_diff: Real,
    /// Table position of the largest deviation.
    pub worst_index: usize,
    /// Tolerance applied.
    pub tolerance: Real,
}

impl ParityReport {
    fn from_deviations(
        deviations: impl IntoIterator<Item = (usize, Real)>,
        tolerance: Real,
    ) -> Self {
        let mut max_abs_diff: Real = 0.0;
        let mut worst_index = 0;
        for (i, d) in deviations {
            let d = if d.is_nan() { Real::INFINITY } else { d.abs() };
            if d > max_abs_diff {
                max_abs_diff = d;
                worst_index = i;
            }
        }
        Self {
            passed: max_abs_diff <= tolerance,
            max_abs_diff,
            worst_index,
            tolerance,
        }
    }
}

/// Check that every stored put equals `call + K·e^{−rT} − S·e^{−qT}`.
///
/// # Errors
/// Input inconsistency on an empty table.
pub fn check_market_parity(table: &QuoteTable, tolerance: Real) -> Result<ParityReport> {
    table.ensure_non_empty()?;
    let spot = table.spot();
    let deviations = table.quotes().iter().enumerate().map(|(i, q)| {
        let from_call = q.market(spot).put_from_call(q.call_price, q.strike, q.time_to_expiry);
        (i, from_call - q.put_price)
    });
    Ok(ParityReport::from_deviations(deviations, tolerance))
}

/// Check put-call parity of model prices at `params`.
///
/// Calls and puts are priced in one batch each per maturity group.
///
/// # Errors
/// Input inconsistency on an empty table; pricer failures.
pub fn check_model_parity(
    table: &QuoteTable,
    pricer: &dyn HestonPricer,
    params: &HestonParams,
    tolerance: Real,
) -> Result<ParityReport> {
    table.ensure_non_empty()?;
    let mut deviations = Vec::with_capacity(table.len());
    for group in table.groups() {
        let market = group.market(table.spot());
        let n = group.len();
        let calls = pricer.price_batch(
            group.time,
            &group.strikes,
            &market,
            params,
            &vec![OptionType::Call; n],
        )?;
        let puts = pricer.price_batch(
            group.time,
            &group.strikes,
            &market,
            params,
            &vec![OptionType::Put; n],
        )?;
        for (j, &i) in group.indices.iter().enumerate() {
            let from_call = market.put_from_call(calls[j], group.strikes[j], group.time);
            deviations.push((i, from_call - puts[j]));
        }
    }
    Ok(ParityReport::from_deviations(deviations, tolerance))
}

/// Feller condition `2κθ > σ²`; a diagnostic, never a failure.
pub fn feller_condition(params: &HestonParams) -> bool {
    params.feller_satisfied()
}
