//! Market quotes and the maturity-grouped quote table.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use hcal_core::{
    errors::{Error, Result},
    OptionType, Price, Rate, Real, Time, Volatility,
};
use hcal_pricingengines::MarketParams;

// Relative tolerance of the forward / strike consistency checks.
const CONSISTENCY_TOLERANCE: Real = 1e-9;

/// One observed option.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Strike, `forward × moneyness`.
    pub strike: Real,
    /// Strike over forward.
    pub moneyness: Real,
    /// Time to expiry in years.
    pub time_to_expiry: Time,
    /// Continuously-compounded risk-free rate.
    pub rate: Rate,
    /// Continuously-compounded dividend / repo yield.
    pub dividend_yield: Rate,
    /// Quoted implied volatility.
    pub implied_vol: Volatility,
    /// Black-Scholes call price at the quoted volatility.
    pub call_price: Price,
    /// Black-Scholes put price at the quoted volatility.
    pub put_price: Price,
    /// Side used for fitting.
    pub side: OptionType,
    /// Black-Scholes vega at the quoted volatility.
    pub vega: Real,
    /// Forward `spot · e^{(r − q)T}`.
    pub forward: Real,
}

impl Quote {
    /// Market price of the fitted side.
    pub fn market_price(&self) -> Price {
        match self.side {
            OptionType::Call => self.call_price,
            OptionType::Put => self.put_price,
        }
    }

    /// Spot and rates of this quote.
    pub fn market(&self, spot: Price) -> MarketParams {
        MarketParams::new(spot, self.rate, self.dividend_yield)
    }

    fn validate(&self, index: usize, spot: Price) -> Result<()> {
        let finite = [
            self.strike,
            self.moneyness,
            self.time_to_expiry,
            self.rate,
            self.dividend_yield,
            self.implied_vol,
            self.call_price,
            self.put_price,
            self.vega,
            self.forward,
        ]
        .iter()
        .all(|v| v.is_finite());
        let reason = if !finite {
            Some("non-finite field".to_string())
        } else if self.strike <= 0.0 {
            Some(format!("strike {} is not positive", self.strike))
        } else if self.time_to_expiry < 0.0 {
            Some(format!("negative time to expiry {}", self.time_to_expiry))
        } else if self.implied_vol <= 0.0 {
            Some(format!("implied vol {} is not positive", self.implied_vol))
        } else if self.vega < 0.0 {
            Some(format!("negative vega {}", self.vega))
        } else if !close(
            self.forward,
            spot * ((self.rate - self.dividend_yield) * self.time_to_expiry).exp(),
        ) {
            Some(format!(
                "forward {} inconsistent with spot, rate and yield",
                self.forward
            ))
        } else if !close(self.strike, self.forward * self.moneyness) {
            Some(format!(
                "strike {} differs from forward × moneyness {}",
                self.strike,
                self.forward * self.moneyness
            ))
        } else {
            None
        };
        match reason {
            Some(reason) => Err(Error::InputInconsistency(format!("quote #{index}: {reason}"))),
            None => Ok(()),
        }
    }
}

fn close(a: Real, b: Real) -> bool {
    (a - b).abs() <= CONSISTENCY_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// Quotes sharing one time to expiry, in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct MaturityGroup {
    /// Common time to expiry.
    pub time: Time,
    /// Rate of the group's first quote.
    pub rate: Rate,
    /// Dividend yield of the group's first quote.
    pub dividend: Rate,
    /// Positions of the group's quotes in the table.
    pub indices: Vec<usize>,
    /// Strikes, aligned with `indices`.
    pub strikes: Vec<Real>,
    /// Fitted sides, aligned with `indices`.
    pub sides: Vec<OptionType>,
}

impl MaturityGroup {
    /// Spot and the group's representative rates.
    pub fn market(&self, spot: Price) -> MarketParams {
        MarketParams::new(spot, self.rate, self.dividend)
    }

    /// Number of quotes in the group.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Always false for groups built by [`QuoteTable::new`].
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Immutable set of quotes for one calibration run.
///
/// Quotes are grouped by exact time to expiry (ascending) when the table is
/// built. An empty table is representable; every consumer rejects it.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteTable {
    spot: Price,
    valuation_date: Option<NaiveDate>,
    quotes: Vec<Quote>,
    groups: Vec<MaturityGroup>,
}

impl QuoteTable {
    /// Validate `quotes` and build the maturity groups.
    ///
    /// # Errors
    /// [`Error::InputInconsistency`] on a non-positive spot or an invalid
    /// quote.
    pub fn new(
        spot: Price,
        valuation_date: Option<NaiveDate>,
        quotes: Vec<Quote>,
    ) -> Result<Self> {
        if !(spot > 0.0 && spot.is_finite()) {
            return Err(Error::InputInconsistency(format!(
                "spot must be positive, got {spot}"
            )));
        }
        for (i, q) in quotes.iter().enumerate() {
            q.validate(i, spot)?;
        }
        let groups = group_by_maturity(&quotes);
        Ok(Self {
            spot,
            valuation_date,
            quotes,
            groups,
        })
    }

    /// Spot price.
    pub fn spot(&self) -> Price {
        self.spot
    }

    /// Valuation date, when the table came from dated market data.
    pub fn valuation_date(&self) -> Option<NaiveDate> {
        self.valuation_date
    }

    /// Quotes in table order.
    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    /// Maturity groups in ascending time to expiry.
    pub fn groups(&self) -> &[MaturityGroup] {
        &self.groups
    }

    /// Number of quotes.
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// Whether the table has no quotes.
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Fail with [`Error::InputInconsistency`] when the table is empty.
    pub fn ensure_non_empty(&self) -> Result<()> {
        if self.is_empty() {
            Err(Error::InputInconsistency("quote table is empty".into()))
        } else {
            Ok(())
        }
    }

    /// Smallest and largest quoted moneyness; `None` for an empty table.
    pub fn moneyness_range(&self) -> Option<(Real, Real)> {
        self.quotes.iter().map(|q| q.moneyness).fold(None, |range, m| match range {
            None => Some((m, m)),
            Some((low, high)) => Some((low.min(m), high.max(m))),
        })
    }

    /// Market prices of the fitted sides, in table order.
    pub fn market_prices(&self) -> Vec<Price> {
        self.quotes.iter().map(Quote::market_price).collect()
    }
}

fn group_by_maturity(quotes: &[Quote]) -> Vec<MaturityGroup> {
    // Times are non-negative, so bit order is numeric order; −0.0 folds into 0.0.
    let mut by_time: BTreeMap<u64, MaturityGroup> = BTreeMap::new();
    for (i, q) in quotes.iter().enumerate() {
        let time = q.time_to_expiry + 0.0;
        let group = by_time.entry(time.to_bits()).or_insert_with(|| MaturityGroup {
            time,
            rate: q.rate,
            dividend: q.dividend_yield,
            indices: Vec::new(),
            strikes: Vec::new(),
            sides: Vec::new(),
        });
        if q.rate != group.rate || q.dividend_yield != group.dividend {
            #[cfg(feature = "logging")]
            tracing::warn!(
                time,
                quote = i,
                rate = q.rate,
                dividend = q.dividend_yield,
                group_rate = group.rate,
                group_dividend = group.dividend,
                "rates differ within a maturity group; the first quote's rates are used"
            );
        }
        group.indices.push(i);
        group.strikes.push(q.strike);
        group.sides.push(q.side);
    }
    by_time.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::quote_from_implied_vol;

    fn quote(t: Time, moneyness: Real, rate: Rate) -> Quote {
        quote_from_implied_vol(100.0, t, moneyness, 0.2, rate, 0.0)
    }

    #[test]
    fn groups_are_sorted_and_keep_table_positions() {
        let quotes = vec![
            quote(1.0, 0.9, 0.01),
            quote(0.25, 1.0, 0.01),
            quote(1.0, 1.1, 0.01),
            quote(0.25, 0.95, 0.01),
        ];
        let table = QuoteTable::new(100.0, None, quotes).unwrap();
        let groups = table.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].time, 0.25);
        assert_eq!(groups[0].indices, vec![1, 3]);
        assert_eq!(groups[1].indices, vec![0, 2]);
        assert_eq!(groups[1].sides, vec![OptionType::Put, OptionType::Call]);
    }

    #[test]
    fn first_quote_rates_represent_the_group() {
        let quotes = vec![quote(0.5, 1.0, 0.02), quote(0.5, 1.05, 0.03)];
        let table = QuoteTable::new(100.0, None, quotes).unwrap();
        assert_eq!(table.groups()[0].rate, 0.02);
    }

    #[test]
    fn negative_zero_time_joins_zero() {
        let mut a = quote(0.0, 1.0, 0.01);
        a.time_to_expiry = -0.0;
        let b = quote(0.0, 1.1, 0.01);
        let table = QuoteTable::new(100.0, None, vec![a, b]).unwrap();
        assert_eq!(table.groups().len(), 1);
    }

    #[test]
    fn empty_table_is_built_but_flagged() {
        let table = QuoteTable::new(100.0, None, Vec::new()).unwrap();
        assert!(table.is_empty());
        assert!(matches!(
            table.ensure_non_empty(),
            Err(Error::InputInconsistency(_))
        ));
    }

    #[test]
    fn inconsistent_forward_rejected() {
        let mut q = quote(0.5, 1.0, 0.01);
        q.forward *= 1.01;
        let err = QuoteTable::new(100.0, None, vec![q]).unwrap_err();
        assert!(matches!(err, Error::InputInconsistency(_)));
    }

    #[test]
    fn non_positive_vol_rejected() {
        let mut q = quote(0.5, 1.0, 0.01);
        q.implied_vol = 0.0;
        assert!(QuoteTable::new(100.0, None, vec![q]).is_err());
    }

    #[test]
    fn moneyness_range_spans_the_quotes() {
        let quotes = vec![quote(0.5, 1.05, 0.01), quote(1.0, 0.92, 0.01), quote(1.0, 1.0, 0.01)];
        let table = QuoteTable::new(100.0, None, quotes).unwrap();
        assert_eq!(table.moneyness_range(), Some((0.92, 1.05)));
        let empty = QuoteTable::new(100.0, None, Vec::new()).unwrap();
        assert_eq!(empty.moneyness_range(), None);
    }

    #[test]
    fn market_price_follows_side() {
        let put = quote(0.5, 0.9, 0.01);
        let call = quote(0.5, 1.1, 0.01);
        assert_eq!(put.market_price(), put.put_price);
        assert_eq!(call.market_price(), call.call_price);
    }
}
