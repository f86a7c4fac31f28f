//! Numerical integration.

pub mod gaussian_quadratures;

pub use gaussian_quadratures::{GaussLegendreIntegration, GaussianQuadrature};
