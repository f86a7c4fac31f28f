//! Spot and flat continuously-compounded rates shared by a batch of quotes.

use hcal_core::{DiscountFactor, Price, Rate, Real, Time};
use serde::{Deserialize, Serialize};

/// Spot, risk-free rate and dividend (repo) yield.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketParams {
    /// Spot price of the underlying.
    pub spot: Price,
    /// Continuously-compounded risk-free rate.
    pub rate: Rate,
    /// Continuously-compounded dividend / repo yield.
    pub dividend: Rate,
}

impl MarketParams {
    /// Create market parameters.
    pub fn new(spot: Price, rate: Rate, dividend: Rate) -> Self {
        Self {
            spot,
            rate,
            dividend,
        }
    }

    /// Risk-free discount factor `e^{−rT}`.
    pub fn discount(&self, t: Time) -> DiscountFactor {
        (-self.rate * t).exp()
    }

    /// Dividend discount factor `e^{−qT}`.
    pub fn dividend_discount(&self, t: Time) -> DiscountFactor {
        (-self.dividend * t).exp()
    }

    /// Forward `S·e^{(r−q)T}`.
    pub fn forward(&self, t: Time) -> Real {
        self.spot * ((self.rate - self.dividend) * t).exp()
    }

    /// Put from call via parity: `P = C − S e^{−qT} + K e^{−rT}`.
    pub fn put_from_call(&self, call: Price, strike: Real, t: Time) -> Price {
        call - self.spot * self.dividend_discount(t) + strike * self.discount(t)
    }
}
