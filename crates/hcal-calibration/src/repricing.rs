//! Post-fit repricing and model smiles.
//!
//! Implied-volatility inversions that fail leave `None` in place of the
//! volatility; they never abort the report.

use serde::Serialize;

use hcal_core::{
    errors::{Error, Result},
    OptionType, Price, Real, Time, Volatility,
};
use hcal_models::HestonParams;
use hcal_pricingengines::{implied_volatility, HestonPricer, MarketParams};

use crate::quotes::QuoteTable;

/// Number of points of a default smile grid.
pub const SMILE_GRID_POINTS: usize = 300;

/// One quote repriced under the fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RepricedQuote {
    /// Time to expiry.
    pub time_to_expiry: Time,
    /// Strike.
    pub strike: Real,
    /// Strike over forward.
    pub moneyness: Real,
    /// Fitted side.
    pub side: OptionType,
    /// Market price of the fitted side.
    pub market_price: Price,
    /// Model price of the fitted side.
    pub model_price: Price,
    /// Quoted implied volatility.
    pub market_iv: Volatility,
    /// Implied volatility of `model_price`, if it could be inverted.
    pub model_iv: Option<Volatility>,
}

impl RepricedQuote {
    /// Model minus market implied volatility.
    pub fn iv_error(&self) -> Option<Volatility> {
        self.model_iv.map(|iv| iv - self.market_iv)
    }
}

/// Reprice every quote of `table` at `params`, in table order.
///
/// # Errors
/// Input inconsistency on an empty table; pricer failures.
pub fn reprice(
    table: &QuoteTable,
    pricer: &dyn HestonPricer,
    params: &HestonParams,
) -> Result<Vec<RepricedQuote>> {
    table.ensure_non_empty()?;
    let mut model = vec![0.0; table.len()];
    for group in table.groups() {
        let prices = pricer.price_batch(
            group.time,
            &group.strikes,
            &group.market(table.spot()),
            params,
            &group.sides,
        )?;
        for (&i, p) in group.indices.iter().zip(prices) {
            model[i] = p;
        }
    }
    let repriced: Vec<RepricedQuote> = table
        .quotes()
        .iter()
        .zip(model)
        .map(|(q, model_price)| RepricedQuote {
            time_to_expiry: q.time_to_expiry,
            strike: q.strike,
            moneyness: q.moneyness,
            side: q.side,
            market_price: q.market_price(),
            model_price,
            market_iv: q.implied_vol,
            model_iv: implied_volatility(
                model_price,
                q.time_to_expiry,
                q.strike,
                &q.market(table.spot()),
                q.side,
            )
            .ok(),
        })
        .collect();

    #[cfg(feature = "logging")]
    {
        let failed = repriced.iter().filter(|r| r.model_iv.is_none()).count();
        if failed > 0 {
            tracing::debug!(failed, total = repriced.len(), "model implied vols not inverted");
        }
    }
    Ok(repriced)
}

/// A point of a model smile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SmilePoint {
    /// Strike over forward.
    pub moneyness: Real,
    /// Strike.
    pub strike: Real,
    /// Model price; a call at moneyness ≥ 1, a put below.
    pub model_price: Price,
    /// Implied volatility of `model_price`, if it could be inverted.
    pub model_iv: Option<Volatility>,
}

/// Model implied volatilities across moneyness for one maturity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmileCurve {
    /// Time to expiry.
    pub time_to_expiry: Time,
    /// Forward of the maturity.
    pub forward: Real,
    /// Points in grid order.
    pub points: Vec<SmilePoint>,
}

/// `points` evenly spaced values from `low` to `high` inclusive.
pub fn moneyness_grid(low: Real, high: Real, points: usize) -> Vec<Real> {
    match points {
        0 => Vec::new(),
        1 => vec![low],
        _ => {
            let step = (high - low) / (points - 1) as Real;
            (0..points).map(|i| low + step * i as Real).collect()
        }
    }
}

/// Model smile at `params` over a moneyness grid.
///
/// # Errors
/// Pricer failures.
pub fn smile_curve(
    pricer: &dyn HestonPricer,
    market: &MarketParams,
    time_to_expiry: Time,
    params: &HestonParams,
    moneyness: &[Real],
) -> Result<SmileCurve> {
    let forward = market.forward(time_to_expiry);
    let strikes: Vec<Real> = moneyness.iter().map(|m| m * forward).collect();
    let sides: Vec<OptionType> = moneyness
        .iter()
        .map(|&m| OptionType::from_moneyness(m))
        .collect();
    let prices = pricer.price_batch(time_to_expiry, &strikes, market, params, &sides)?;
    let points = moneyness
        .iter()
        .zip(&strikes)
        .zip(&sides)
        .zip(prices)
        .map(|(((&m, &k), &side), price)| SmilePoint {
            moneyness: m,
            strike: k,
            model_price: price,
            model_iv: implied_volatility(price, time_to_expiry, k, market, side).ok(),
        })
        .collect();
    Ok(SmileCurve {
        time_to_expiry,
        forward,
        points,
    })
}

/// One model smile per maturity of `table`, on an evenly spaced grid over
/// `band`, or over the quoted moneyness range when `band` is `None`.
///
/// # Errors
/// Input inconsistency on an empty table; pricer failures.
pub fn smile_curves(
    table: &QuoteTable,
    pricer: &dyn HestonPricer,
    params: &HestonParams,
    band: Option<(Real, Real)>,
    points: usize,
) -> Result<Vec<SmileCurve>> {
    table.ensure_non_empty()?;
    let (low, high) = match band {
        Some(band) => band,
        None => table
            .moneyness_range()
            .ok_or_else(|| Error::InputInconsistency("quote table is empty".into()))?,
    };
    let grid = moneyness_grid(low, high, points);
    table
        .groups()
        .iter()
        .map(|g| smile_curve(pricer, &g.market(table.spot()), g.time, params, &grid))
        .collect()
}
