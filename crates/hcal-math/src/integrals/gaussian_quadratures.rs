//! Gaussian quadrature rules.
//!
//! Nodes and weights come from the Golub-Welsch algorithm: the nodes are the
//! eigenvalues of the symmetric tridiagonal Jacobi matrix of the orthogonal
//! polynomial family, and each weight is `μ₀ · v₀²` where `v₀` is the first
//! component of the normalized eigenvector.

use hcal_core::Real;
use nalgebra::{DMatrix, SymmetricEigen};

/// A Gauss quadrature rule defined by nodes and weights.
#[derive(Debug, Clone)]
pub struct GaussianQuadrature {
    x: Vec<Real>,
    w: Vec<Real>,
}

impl GaussianQuadrature {
    /// Quadrature nodes, ascending.
    pub fn x(&self) -> &[Real] {
        &self.x
    }

    /// Quadrature weights.
    pub fn w(&self) -> &[Real] {
        &self.w
    }

    /// Number of quadrature points.
    pub fn order(&self) -> usize {
        self.x.len()
    }

    /// Evaluate ∫ f(x) w(x) dx ≈ Σ wᵢ f(xᵢ).
    pub fn integrate<F: Fn(Real) -> Real>(&self, f: F) -> Real {
        self.x.iter().zip(self.w.iter()).map(|(&xi, &wi)| wi * f(xi)).sum()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Gauss-Legendre quadrature on [-1, 1]
// ═══════════════════════════════════════════════════════════════════════════════

/// Gauss-Legendre quadrature on [−1, 1].
pub struct GaussLegendreIntegration;

impl GaussLegendreIntegration {
    /// Build a Gauss-Legendre quadrature of given `order`.
    ///
    /// Jacobi matrix: zero diagonal, off-diagonal `i / √(4i² − 1)`; `μ₀ = 2`.
    pub fn new(order: usize) -> GaussianQuadrature {
        let offdiag: Vec<Real> = (1..order)
            .map(|i| {
                let i = i as Real;
                i / (4.0 * i * i - 1.0).sqrt()
            })
            .collect();
        golub_welsch(&vec![0.0; order], &offdiag, 2.0)
    }

    /// Integrate `f` on [a, b] by mapping to [−1, 1].
    pub fn integrate<F: Fn(Real) -> Real>(order: usize, f: F, a: Real, b: Real) -> Real {
        let q = Self::new(order);
        let half = 0.5 * (b - a);
        let mid = 0.5 * (a + b);
        q.integrate(|x| f(mid + half * x)) * half
    }
}

fn golub_welsch(diag: &[Real], offdiag: &[Real], mu0: Real) -> GaussianQuadrature {
    let n = diag.len();
    if n == 0 {
        return GaussianQuadrature {
            x: vec![],
            w: vec![],
        };
    }

    let mut jacobi = DMatrix::<Real>::zeros(n, n);
    for i in 0..n {
        jacobi[(i, i)] = diag[i];
    }
    for (i, &b) in offdiag.iter().enumerate() {
        jacobi[(i, i + 1)] = b;
        jacobi[(i + 1, i)] = b;
    }

    let eigen = SymmetricEigen::new(jacobi);
    let mut nodes: Vec<(Real, Real)> = (0..n)
        .map(|i| {
            let v0 = eigen.eigenvectors[(0, i)];
            (eigen.eigenvalues[i], mu0 * v0 * v0)
        })
        .collect();
    nodes.sort_by(|a, b| a.0.total_cmp(&b.0));

    GaussianQuadrature {
        x: nodes.iter().map(|&(x, _)| x).collect(),
        w: nodes.iter().map(|&(_, w)| w).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn legendre_weights_sum_to_two() {
        for order in [1, 2, 8, 64, 185] {
            let q = GaussLegendreIntegration::new(order);
            let total: Real = q.w().iter().sum();
            assert_abs_diff_eq!(total, 2.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn legendre_three_point_nodes() {
        let q = GaussLegendreIntegration::new(3);
        assert_abs_diff_eq!(q.x()[0], -(0.6_f64).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(q.x()[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(q.w()[1], 8.0 / 9.0, epsilon = 1e-12);
    }

    #[test]
    fn legendre_is_exact_for_polynomials() {
        // An n-point rule integrates degree 2n - 1 exactly.
        let value = GaussLegendreIntegration::integrate(4, |x| x.powi(7) + 3.0 * x * x, 0.0, 2.0);
        assert_abs_diff_eq!(value, 256.0 / 8.0 + 8.0, epsilon = 1e-10);
    }

    #[test]
    fn legendre_smooth_integrand() {
        let value = GaussLegendreIntegration::integrate(64, |x| (-x * x).exp(), 0.0, 10.0);
        assert_abs_diff_eq!(value, std::f64::consts::PI.sqrt() / 2.0, epsilon = 1e-12);
    }
}
