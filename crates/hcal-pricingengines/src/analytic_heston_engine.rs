//! Semi-analytic Heston pricing engine.
//!
//! Calls are priced with Lewis' single-integral representation
//!
//! $$C = S e^{-qT} - \frac{\sqrt{SK}\,e^{-(r+q)T/2}}{\pi}
//!       \int_0^\infty \mathrm{Re}\!\left[e^{iuk}\,\psi(u - i/2)\right]
//!       \frac{du}{u^2 + 1/4}, \qquad k = \ln(F/K),$$
//!
//! where `ψ` is the characteristic function of `ln(S_T / F)`. The integral
//! is truncated to `[0, u_max]` and evaluated by Gauss-Legendre quadrature in
//! the variable `s = √(u / u_max)`, which packs nodes near the poles at
//! `u = ±i/2` and the singularities of `ψ` close to the origin.
//! The characteristic function does not depend on the strike, so one
//! evaluation per node serves every strike of a batch. Puts follow from
//! put-call parity.

use std::f64::consts::PI;

use num_complex::Complex64;

use hcal_core::{ensure, ensure_post, errors::Result, fail, OptionType, Price, Real, Time};
use hcal_math::integrals::{GaussLegendreIntegration, GaussianQuadrature};
use hcal_models::HestonParams;

use crate::market_params::MarketParams;

/// Integration order used when none is given.
pub const DEFAULT_INTEGRATION_ORDER: usize = 185;

// −ln of the relative size at which the integrand tail is dropped.
const TRUNCATION_LEVEL: Real = 36.0;
const MIN_UPPER_LIMIT: Real = 10.0;
const MAX_UPPER_LIMIT: Real = 2000.0;

/// Prices a batch of European options sharing one maturity under Heston.
pub trait HestonPricer: Send + Sync {
    /// Model prices for `strikes`, each priced as a call or put per `sides`.
    ///
    /// # Errors
    /// Fails on mismatched inputs or a non-finite model price.
    fn price_batch(
        &self,
        time_to_expiry: Time,
        strikes: &[Real],
        market: &MarketParams,
        params: &HestonParams,
        sides: &[OptionType],
    ) -> Result<Vec<Price>>;

    /// Price a single option.
    fn price(
        &self,
        time_to_expiry: Time,
        strike: Real,
        market: &MarketParams,
        params: &HestonParams,
        side: OptionType,
    ) -> Result<Price> {
        let prices = self.price_batch(time_to_expiry, &[strike], market, params, &[side])?;
        match prices.first() {
            Some(&price) => Ok(price),
            None => fail!("pricer returned an empty batch"),
        }
    }
}

/// Semi-analytic Heston engine with a fixed Gauss-Legendre order.
///
/// The quadrature rule is built once and reused by every pricing call.
#[derive(Debug, Clone)]
pub struct AnalyticHestonEngine {
    quadrature: GaussianQuadrature,
}

impl AnalyticHestonEngine {
    /// Create an engine with `integration_order` quadrature nodes.
    pub fn new(integration_order: usize) -> Self {
        Self {
            quadrature: GaussLegendreIntegration::new(integration_order.max(1)),
        }
    }

    /// Replace the integration order.
    pub fn with_integration_order(self, integration_order: usize) -> Self {
        Self::new(integration_order)
    }

    /// Number of quadrature nodes.
    pub fn integration_order(&self) -> usize {
        self.quadrature.order()
    }

    /// Undiscounted Lewis integral `∫ Re[e^{iuk} ψ(u − i/2)] / (u² + 1/4) du`
    /// for each log-moneyness in `log_moneyness`.
    fn lewis_integrals(
        &self,
        t: Time,
        params: &HestonParams,
        log_moneyness: &[Real],
    ) -> Vec<Real> {
        let u_max = upper_limit(t, params);

        // (u, weight / (u² + 1/4), ψ(u − i/2)) per node; u = u_max·s², s ∈ [0, 1]
        let nodes: Vec<(Real, Real, Complex64)> = self
            .quadrature
            .x()
            .iter()
            .zip(self.quadrature.w())
            .map(|(&x, &w)| {
                let s = 0.5 * (x + 1.0);
                let u = u_max * s * s;
                let psi = characteristic_function(Complex64::new(u, -0.5), t, params);
                (u, w * u_max * s / (u * u + 0.25), psi)
            })
            .collect();

        log_moneyness
            .iter()
            .map(|&k| {
                nodes
                    .iter()
                    .map(|&(u, w, psi)| w * (Complex64::new(0.0, u * k).exp() * psi).re)
                    .sum()
            })
            .collect()
    }
}

impl Default for AnalyticHestonEngine {
    fn default() -> Self {
        Self::new(DEFAULT_INTEGRATION_ORDER)
    }
}

impl HestonPricer for AnalyticHestonEngine {
    fn price_batch(
        &self,
        time_to_expiry: Time,
        strikes: &[Real],
        market: &MarketParams,
        params: &HestonParams,
        sides: &[OptionType],
    ) -> Result<Vec<Price>> {
        ensure!(
            strikes.len() == sides.len(),
            "{} strikes but {} option sides",
            strikes.len(),
            sides.len()
        );
        ensure!(
            market.spot > 0.0 && market.spot.is_finite(),
            "spot must be positive, got {}",
            market.spot
        );
        ensure!(
            strikes.iter().all(|&k| k > 0.0 && k.is_finite()),
            "strikes must be positive and finite"
        );

        let t = time_to_expiry;
        if t <= 0.0 {
            return Ok(strikes
                .iter()
                .zip(sides)
                .map(|(&k, side)| (side.sign() * (market.spot - k)).max(0.0))
                .collect());
        }
        ensure!(
            params.sigma > 0.0 && params.risk_neutral_kappa() > 0.0,
            "Heston pricing needs sigma > 0 and kappa + lambda > 0, got {params}"
        );

        let forward = market.forward(t);
        let log_moneyness: Vec<Real> = strikes.iter().map(|&k| (forward / k).ln()).collect();
        let integrals = self.lewis_integrals(t, params, &log_moneyness);

        let spot_leg = market.spot * market.dividend_discount(t);
        let scale = (-(market.rate + market.dividend) * t * 0.5).exp() / PI;

        strikes
            .iter()
            .zip(sides)
            .zip(integrals)
            .map(|((&k, &side), integral)| {
                let call = spot_leg - (market.spot * k).sqrt() * scale * integral;
                let price = match side {
                    OptionType::Call => call,
                    OptionType::Put => market.put_from_call(call, k, t),
                };
                ensure_post!(
                    price.is_finite(),
                    "non-finite Heston price at K = {k}, T = {t} for {params}"
                );
                Ok(price)
            })
            .collect()
    }
}

/// Characteristic function of `ln(S_T / F)` at complex argument `w`, in the
/// "little trap" form that keeps the complex logarithm on its principal
/// branch.
pub fn characteristic_function(w: Complex64, t: Time, params: &HestonParams) -> Complex64 {
    let i = Complex64::i();
    let kappa = params.risk_neutral_kappa();
    let theta = params.risk_neutral_theta();
    let sigma2 = params.sigma * params.sigma;

    let beta = kappa - params.rho * params.sigma * i * w;
    let d = (beta * beta + sigma2 * (i * w + w * w)).sqrt();
    let g = (beta - d) / (beta + d);
    let e = (-d * t).exp();

    let c = kappa * theta / sigma2 * ((beta - d) * t - 2.0 * ((1.0 - g * e) / (1.0 - g)).ln());
    let dd = (beta - d) / sigma2 * (1.0 - e) / (1.0 - g * e);
    (c + dd * params.v0).exp()
}

/// Truncation point of the Lewis integral.
///
/// The integrand decays like `exp(−c∞·u)` with
/// `c∞ = √(1 − ρ²)(v0 + κθT)/σ` in the tail and like `exp(−v̄Tu²/2)` near the
/// origin, `v̄` being the mean expected variance over `[0, T]`. The larger of
/// the two cut-offs is used.
pub fn upper_limit(t: Time, params: &HestonParams) -> Real {
    let kappa = params.risk_neutral_kappa();
    let theta = params.risk_neutral_theta();
    let c_inf = (1.0 - params.rho * params.rho).max(0.0).sqrt()
        * (params.v0 + kappa * theta * t)
        / params.sigma;
    let mean_variance = if kappa * t > 1e-8 {
        theta + (params.v0 - theta) * (1.0 - (-kappa * t).exp()) / (kappa * t)
    } else {
        params.v0
    };

    let exponential = if c_inf > 0.0 {
        TRUNCATION_LEVEL / c_inf
    } else {
        MAX_UPPER_LIMIT
    };
    let gaussian = if mean_variance * t > 0.0 {
        (2.0 * TRUNCATION_LEVEL / (mean_variance * t)).sqrt()
    } else {
        MAX_UPPER_LIMIT
    };
    let u_max = exponential.max(gaussian);
    if u_max.is_finite() {
        u_max.clamp(MIN_UPPER_LIMIT, MAX_UPPER_LIMIT)
    } else {
        MAX_UPPER_LIMIT
    }
}
