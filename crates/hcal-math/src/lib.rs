//! # hcal-math
//!
//! Numerical building blocks for the calibration engine: an `Array` newtype
//! over nalgebra, the normal distribution (via statrs), Gauss-Legendre
//! quadrature, a Brent root finder, the Mersenne Twister generator and the
//! optimization framework.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Dense real vector.
pub mod array;

/// Probability distributions.
pub mod distributions;

/// Numerical integration.
pub mod integrals;

/// Cost functions, constraints and optimizers.
pub mod optimization;

/// Random number generators.
pub mod random_numbers;

/// 1D root-finding solvers.
pub mod solvers1d;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use array::Array;
pub use distributions::{normal_cdf, normal_pdf};
pub use integrals::{GaussLegendreIntegration, GaussianQuadrature};
pub use optimization::{
    BoundedBfgs, BoxConstraint, CostFunction, DifferentialEvolution, EndCriteria,
    EndCriteriaType, GlobalOptimizer, IterationInfo, IterationObserver, LocalOptimizer,
    NoObserver, OptimizationResult,
};
pub use random_numbers::MersenneTwisterUniformRng;
pub use solvers1d::brent;
