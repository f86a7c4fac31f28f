//! Standard normal distribution.

use hcal_core::Real;
use statrs::function::erf::erfc;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// The standard normal probability density function.
///
/// `φ(x) = exp(-x²/2) / √(2π)`
#[inline]
pub fn normal_pdf(x: Real) -> Real {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// The standard normal cumulative distribution function Φ(x).
///
/// Evaluated as `erfc(-x/√2) / 2`, which keeps full relative precision in
/// the far left tail (deep out-of-the-money legs).
pub fn normal_cdf(x: Real) -> Real {
    0.5 * erfc(-x * FRAC_1_SQRT_2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn cdf_known_values() {
        assert_abs_diff_eq!(normal_cdf(0.0), 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(normal_cdf(1.0), 0.841_344_746_068_542_9, epsilon = 1e-14);
        assert_abs_diff_eq!(normal_cdf(-1.96), 0.024_997_895_148_220_4, epsilon = 1e-14);
    }

    #[test]
    fn cdf_symmetry() {
        for &x in &[0.1, 0.7, 1.5, 3.0, 6.0] {
            assert_abs_diff_eq!(normal_cdf(x) + normal_cdf(-x), 1.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn pdf_peak() {
        assert_abs_diff_eq!(normal_pdf(0.0), 0.398_942_280_401_432_7, epsilon = 1e-15);
    }
}
