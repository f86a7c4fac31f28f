//! Quote preparation from raw implied-volatility rows.
//!
//! Turns a dated snapshot of `(expiry, moneyness, implied vol, rate, yield)`
//! rows into a validated [`QuoteTable`]: time to expiry on an Actual/365
//! basis, forwards recomputed from spot and rates, strikes from moneyness,
//! Black-Scholes prices and vegas at the quoted volatility.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use hcal_core::{
    errors::{Error, Result},
    OptionType, Price, Rate, Real, Time, Volatility,
};
use hcal_models::HestonParams;
use hcal_pricingengines::{black_scholes_merton, implied_volatility, HestonPricer, MarketParams};

use crate::quotes::{Quote, QuoteTable};

/// Days per year of the time-to-expiry convention.
pub const DAYS_PER_YEAR: Real = 365.0;

/// One raw market row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawQuote {
    /// Expiry date.
    pub expiry: NaiveDate,
    /// Strike over forward.
    pub moneyness: Real,
    /// Quoted implied volatility.
    pub implied_vol: Volatility,
    /// Continuously-compounded risk-free rate.
    pub rate: Rate,
    /// Continuously-compounded dividend / repo yield.
    pub dividend_yield: Rate,
}

/// Spot, valuation date and the raw rows observed on that date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Spot price.
    pub spot: Price,
    /// Valuation date.
    pub valuation_date: NaiveDate,
    /// Raw rows.
    pub rows: Vec<RawQuote>,
}

/// Filters applied while preparing quotes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreparationConfig {
    /// Inclusive moneyness band kept for fitting.
    pub moneyness_band: (Real, Real),
}

impl Default for PreparationConfig {
    fn default() -> Self {
        Self {
            moneyness_band: (0.8, 1.2),
        }
    }
}

impl PreparationConfig {
    /// Set the moneyness band.
    pub fn with_moneyness_band(mut self, low: Real, high: Real) -> Self {
        self.moneyness_band = (low, high);
        self
    }
}

/// Year fraction between two dates, `days / 365`.
pub fn time_to_expiry(valuation_date: NaiveDate, expiry: NaiveDate) -> Time {
    (expiry - valuation_date).num_days() as Real / DAYS_PER_YEAR
}

/// Build a quote from its implied volatility.
///
/// The forward is recomputed from spot and rates; the strike is
/// `forward × moneyness`; the fitted side is a call when moneyness ≥ 1.
pub fn quote_from_implied_vol(
    spot: Price,
    time_to_expiry: Time,
    moneyness: Real,
    implied_vol: Volatility,
    rate: Rate,
    dividend_yield: Rate,
) -> Quote {
    let market = MarketParams::new(spot, rate, dividend_yield);
    let forward = market.forward(time_to_expiry);
    let strike = forward * moneyness;
    let (call_price, vega) =
        black_scholes_merton(OptionType::Call, implied_vol, time_to_expiry, strike, &market);
    let (put_price, _) =
        black_scholes_merton(OptionType::Put, implied_vol, time_to_expiry, strike, &market);
    Quote {
        strike,
        moneyness,
        time_to_expiry,
        rate,
        dividend_yield,
        implied_vol,
        call_price,
        put_price,
        side: OptionType::from_moneyness(moneyness),
        vega,
        forward,
    }
}

/// Prepare a quote table from a market snapshot.
///
/// Rows are dropped, in order, when they expire before the valuation date,
/// have a non-positive implied volatility, produce a non-positive call or put
/// price, or fall outside the moneyness band.
///
/// # Errors
/// [`Error::InputInconsistency`] on an invalid spot or band, or when a kept
/// row fails quote validation.
pub fn prepare_quotes(
    snapshot: &MarketSnapshot,
    config: &PreparationConfig,
) -> Result<QuoteTable> {
    let (low, high) = config.moneyness_band;
    if !(low <= high) {
        return Err(Error::InputInconsistency(format!(
            "empty moneyness band [{low}, {high}]"
        )));
    }
    if !(snapshot.spot > 0.0 && snapshot.spot.is_finite()) {
        return Err(Error::InputInconsistency(format!(
            "spot must be positive, got {}",
            snapshot.spot
        )));
    }

    let quotes: Vec<Quote> = snapshot
        .rows
        .iter()
        .filter_map(|row| {
            let t = time_to_expiry(snapshot.valuation_date, row.expiry);
            if t < 0.0 || !(row.implied_vol > 0.0) {
                return None;
            }
            let quote = quote_from_implied_vol(
                snapshot.spot,
                t,
                row.moneyness,
                row.implied_vol,
                row.rate,
                row.dividend_yield,
            );
            let priced = quote.call_price > 0.0 && quote.put_price > 0.0;
            let in_band = row.moneyness >= low && row.moneyness <= high;
            (priced && in_band).then_some(quote)
        })
        .collect();

    #[cfg(feature = "logging")]
    tracing::debug!(
        rows = snapshot.rows.len(),
        kept = quotes.len(),
        band_low = low,
        band_high = high,
        "quotes prepared"
    );

    QuoteTable::new(snapshot.spot, Some(snapshot.valuation_date), quotes)
}

/// Build a quote table whose market prices come from a Heston vector.
///
/// Every `(maturity, moneyness)` pair is priced with `pricer` on the side
/// implied by its moneyness, the price is inverted to an implied volatility
/// and the quote is rebuilt from that volatility. Used to check that a
/// calibration recovers known parameters.
///
/// # Errors
/// Propagates pricing failures and [`Error::Numerical`] when a model price
/// cannot be inverted.
pub fn synthetic_quote_table(
    market: &MarketParams,
    maturities: &[Time],
    moneyness: &[Real],
    params: &HestonParams,
    pricer: &dyn HestonPricer,
) -> Result<QuoteTable> {
    let mut quotes = Vec::with_capacity(maturities.len() * moneyness.len());
    for &t in maturities {
        let forward = market.forward(t);
        let strikes: Vec<Real> = moneyness.iter().map(|m| forward * m).collect();
        let sides: Vec<OptionType> = moneyness
            .iter()
            .map(|&m| OptionType::from_moneyness(m))
            .collect();
        let prices = pricer.price_batch(t, &strikes, market, params, &sides)?;
        let rows = moneyness.iter().zip(&strikes).zip(&sides).zip(prices);
        for (((&m, &k), &side), price) in rows {
            let iv = implied_volatility(price, t, k, market, side)?;
            quotes.push(quote_from_implied_vol(
                market.spot,
                t,
                m,
                iv,
                market.rate,
                market.dividend,
            ));
        }
    }
    QuoteTable::new(market.spot, None, quotes)
}
