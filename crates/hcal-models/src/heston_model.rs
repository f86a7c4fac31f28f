//! Heston stochastic volatility parameters.
//!
//! ```text
//! dS = (r − q)·S dt + √v·S dW₁
//! dv = κ(θ − v) dt + σ √v dW₂
//! dW₁·dW₂ = ρ dt
//! ```
//!
//! `lambda` is the variance risk premium. Pricing uses the risk-neutral
//! dynamics `κ* = κ + λ`, `θ* = κθ / (κ + λ)`.

use std::fmt;

use hcal_core::{
    errors::{Error, Result},
    Real,
};
use hcal_math::Array;
use serde::{Deserialize, Serialize};

/// Number of Heston parameters.
pub const PARAMETER_COUNT: usize = 6;

/// Parameter names in vector order.
pub const PARAMETER_NAMES: [&str; PARAMETER_COUNT] =
    ["v0", "kappa", "theta", "sigma", "rho", "lambda"];

/// The Heston parameter vector `(v0, κ, θ, σ, ρ, λ)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HestonParams {
    /// Initial variance.
    pub v0: Real,
    /// Mean-reversion speed.
    pub kappa: Real,
    /// Long-run variance.
    pub theta: Real,
    /// Volatility of variance.
    pub sigma: Real,
    /// Spot-variance correlation.
    pub rho: Real,
    /// Variance risk premium.
    pub lambda: Real,
}

impl HestonParams {
    /// Create a parameter vector.
    pub fn new(v0: Real, kappa: Real, theta: Real, sigma: Real, rho: Real, lambda: Real) -> Self {
        Self {
            v0,
            kappa,
            theta,
            sigma,
            rho,
            lambda,
        }
    }

    /// Components in vector order.
    pub fn to_vec(&self) -> [Real; PARAMETER_COUNT] {
        [
            self.v0,
            self.kappa,
            self.theta,
            self.sigma,
            self.rho,
            self.lambda,
        ]
    }

    /// Build from a slice in vector order.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] unless `values` has exactly six entries.
    pub fn from_slice(values: &[Real]) -> Result<Self> {
        match *values {
            [v0, kappa, theta, sigma, rho, lambda] => {
                Ok(Self::new(v0, kappa, theta, sigma, rho, lambda))
            }
            _ => Err(Error::InvalidArgument(format!(
                "expected {PARAMETER_COUNT} Heston parameters, got {}",
                values.len()
            ))),
        }
    }

    /// Convert to an optimizer coordinate vector.
    pub fn to_array(&self) -> Array {
        Array::from_slice(&self.to_vec())
    }

    /// Build from an optimizer coordinate vector.
    pub fn from_array(x: &Array) -> Result<Self> {
        Self::from_slice(x.as_slice())
    }

    /// Whether every component is finite.
    pub fn is_finite(&self) -> bool {
        self.to_vec().iter().all(|v| v.is_finite())
    }

    /// Feller condition `2κθ > σ²`: the variance process stays strictly
    /// positive.
    pub fn feller_satisfied(&self) -> bool {
        2.0 * self.kappa * self.theta > self.sigma * self.sigma
    }

    /// Risk-neutral mean-reversion speed `κ + λ`.
    pub fn risk_neutral_kappa(&self) -> Real {
        self.kappa + self.lambda
    }

    /// Risk-neutral long-run variance `κθ / (κ + λ)`.
    pub fn risk_neutral_theta(&self) -> Real {
        self.kappa * self.theta / (self.kappa + self.lambda)
    }
}

impl fmt::Display for HestonParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[v0={:.6}, kappa={:.6}, theta={:.6}, sigma={:.6}, rho={:.6}, lambda={:.6}]",
            self.v0, self.kappa, self.theta, self.sigma, self.rho, self.lambda
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn heston_params_vector_order() {
        let p = HestonParams::new(0.04, 2.0, 0.05, 0.4, -0.6, 0.0);
        assert_eq!(p.to_vec(), [0.04, 2.0, 0.05, 0.4, -0.6, 0.0]);
        assert_eq!(HestonParams::from_array(&p.to_array()).unwrap(), p);
    }

    #[test]
    fn heston_params_wrong_length() {
        let err = HestonParams::from_slice(&[0.1, 0.2]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn heston_feller() {
        // 2*1.5*0.04 = 0.12 > 0.09 = 0.3²
        assert!(HestonParams::new(0.04, 1.5, 0.04, 0.3, -0.7, 0.0).feller_satisfied());
        // 2*2*0.04 = 0.16 = 0.4²: boundary is not strict
        assert!(!HestonParams::new(0.04, 2.0, 0.04, 0.4, -0.6, 0.0).feller_satisfied());
    }

    #[test]
    fn heston_risk_neutral_with_lambda() {
        let p = HestonParams::new(0.04, 2.0, 0.05, 0.4, -0.6, 0.5);
        assert_abs_diff_eq!(p.risk_neutral_kappa(), 2.5, epsilon = 1e-15);
        assert_abs_diff_eq!(p.risk_neutral_theta(), 0.04, epsilon = 1e-15);
    }

    #[test]
    fn heston_params_non_finite() {
        assert!(!HestonParams::new(Real::NAN, 2.0, 0.05, 0.4, -0.6, 0.0).is_finite());
    }
}
