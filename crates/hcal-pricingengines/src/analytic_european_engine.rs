//! Closed-form Black-Scholes-Merton pricing, vega and implied volatility.
//!
//! Used to turn quoted implied volatilities into market prices and loss
//! weights, and to invert model prices back into implied volatilities.

use hcal_core::{
    errors::{Error, Result},
    OptionType, Price, Real, Time, Volatility,
};
use hcal_math::distributions::{normal_cdf, normal_pdf};
use hcal_math::solvers1d::brent;

use crate::market_params::MarketParams;

/// Volatility search interval of [`implied_volatility`].
pub const IMPLIED_VOL_BRACKET: (Volatility, Volatility) = (1e-6, 5.0);

const IMPLIED_VOL_ACCURACY: Real = 1e-12;

/// Black-Scholes-Merton price and vega of a European option.
///
/// $$C = S e^{-qT} N(d_1) - K e^{-rT} N(d_2)$$
/// $$P = K e^{-rT} N(-d_2) - S e^{-qT} N(-d_1)$$
///
/// where $d_{1,2} = \frac{\ln(S/K) + (r - q \pm \sigma^2/2)T}{\sigma\sqrt{T}}$.
///
/// Vega is per 1.0 absolute volatility. Returns `(price, vega)`.
pub fn black_scholes_merton(
    option_type: OptionType,
    volatility: Volatility,
    time_to_expiry: Time,
    strike: Real,
    market: &MarketParams,
) -> (Price, Real) {
    let phi = option_type.sign();
    let t = time_to_expiry;
    let spot = market.spot;

    if t <= 0.0 {
        return ((phi * (spot - strike)).max(0.0), 0.0);
    }

    let sqrt_t = t.sqrt();
    let std_dev = volatility * sqrt_t;
    let df_r = market.discount(t);
    let df_q = market.dividend_discount(t);

    if std_dev <= 1e-15 {
        let intrinsic = (phi * (spot * df_q - strike * df_r)).max(0.0);
        return (intrinsic, 0.0);
    }

    let d1 = ((spot / strike).ln()
        + (market.rate - market.dividend + 0.5 * volatility * volatility) * t)
        / std_dev;
    let d2 = d1 - std_dev;

    let price = phi * (spot * df_q * normal_cdf(phi * d1) - strike * df_r * normal_cdf(phi * d2));
    let vega = spot * df_q * normal_pdf(d1) * sqrt_t;
    (price, vega)
}

/// Black-Scholes-Merton price.
pub fn black_scholes_price(
    option_type: OptionType,
    volatility: Volatility,
    time_to_expiry: Time,
    strike: Real,
    market: &MarketParams,
) -> Price {
    black_scholes_merton(option_type, volatility, time_to_expiry, strike, market).0
}

/// Black-Scholes-Merton vega (identical for calls and puts).
pub fn black_scholes_vega(
    volatility: Volatility,
    time_to_expiry: Time,
    strike: Real,
    market: &MarketParams,
) -> Real {
    black_scholes_merton(OptionType::Call, volatility, time_to_expiry, strike, market).1
}

/// Implied volatility of `price` by Brent's method on
/// [`IMPLIED_VOL_BRACKET`].
///
/// # Errors
/// [`Error::Numerical`] when the price is not finite, the expiry is not
/// positive, or no volatility in the bracket reproduces the price.
pub fn implied_volatility(
    price: Price,
    time_to_expiry: Time,
    strike: Real,
    market: &MarketParams,
    option_type: OptionType,
) -> Result<Volatility> {
    if !price.is_finite() || time_to_expiry <= 0.0 {
        return Err(Error::Numerical(format!(
            "cannot invert price {price} at T = {time_to_expiry}"
        )));
    }
    let (lo, hi) = IMPLIED_VOL_BRACKET;
    brent(
        |vol| black_scholes_price(option_type, vol, time_to_expiry, strike, market) - price,
        lo,
        hi,
        IMPLIED_VOL_ACCURACY,
    )
    .map_err(|e| Error::Numerical(format!("implied volatility at K = {strike}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn market() -> MarketParams {
        MarketParams::new(100.0, 0.05, 0.0)
    }

    #[test]
    fn bs_call_price() {
        // S=100, K=100, r=5%, q=0%, σ=20%, T=1
        let (price, vega) = black_scholes_merton(OptionType::Call, 0.20, 1.0, 100.0, &market());
        assert!((price - 10.4506).abs() < 1e-3, "price = {price}");
        assert!((vega - 37.524).abs() < 1e-2, "vega = {vega}");
    }

    #[test]
    fn bs_put_call_parity_with_dividends() {
        let m = MarketParams::new(100.0, 0.08, 0.03);
        let (k, sigma, t) = (105.0, 0.25, 0.5);
        let call = black_scholes_price(OptionType::Call, sigma, t, k, &m);
        let put = black_scholes_price(OptionType::Put, sigma, t, k, &m);
        assert_abs_diff_eq!(put, m.put_from_call(call, k, t), epsilon = 1e-12);
    }

    #[test]
    fn bs_zero_vol_is_discounted_intrinsic() {
        let price = black_scholes_price(OptionType::Call, 0.0, 1.0, 95.0, &market());
        assert_abs_diff_eq!(price, 100.0 - 95.0 * (-0.05_f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn bs_expired_is_intrinsic() {
        assert_eq!(black_scholes_price(OptionType::Put, 0.2, 0.0, 110.0, &market()), 10.0);
        assert_eq!(black_scholes_vega(0.2, 0.0, 110.0, &market()), 0.0);
    }

    #[test]
    fn implied_vol_round_trip() {
        let m = MarketParams::new(100.0, 0.01, 0.02);
        let cases = [
            (90.0, OptionType::Put),
            (100.0, OptionType::Call),
            (115.0, OptionType::Call),
        ];
        for (k, side) in cases {
            let price = black_scholes_price(side, 0.27, 0.75, k, &m);
            let iv = implied_volatility(price, 0.75, k, &m, side).unwrap();
            assert_abs_diff_eq!(iv, 0.27, epsilon = 1e-8);
        }
    }

    #[test]
    fn implied_vol_below_intrinsic_fails() {
        let err = implied_volatility(0.01, 1.0, 50.0, &market(), OptionType::Call).unwrap_err();
        assert!(matches!(err, Error::Numerical(_)));
    }

    #[test]
    fn implied_vol_nan_price_fails() {
        let err = implied_volatility(Real::NAN, 1.0, 100.0, &market(), OptionType::Call);
        assert!(matches!(err, Err(Error::Numerical(_))));
    }
}
