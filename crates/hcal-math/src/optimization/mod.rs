//! Optimization framework.
//!
//! Provides the cost-function and box-constraint abstractions, end criteria,
//! the per-iteration observer hook, and two concrete optimizers:
//! [`DifferentialEvolution`] (global, derivative-free) and [`BoundedBfgs`]
//! (local, projected quasi-Newton).

use std::ops::ControlFlow;

use crate::array::Array;
use hcal_core::{
    ensure,
    errors::{Error, Result},
    Real,
};

pub mod bfgs;
pub mod differential_evolution;

pub use bfgs::BoundedBfgs;
pub use differential_evolution::DifferentialEvolution;

/// Step used by the default finite-difference gradient.
pub const FINITE_DIFFERENCE_STEP: Real = 1e-8;

// ── Cost function trait ───────────────────────────────────────────────────────

/// A scalar objective to be minimized.
///
/// Implementations must be `Sync`: population-based optimizers may score
/// candidates from several worker threads.
pub trait CostFunction: Sync {
    /// Evaluate the cost at `x`.
    fn value(&self, x: &Array) -> Result<Real>;

    /// Gradient of the cost at `x`.
    ///
    /// The default implementation uses one-sided finite differences that stay
    /// inside `bounds`: a forward step when `x + h` is admissible, a backward
    /// step otherwise, and zero for components pinned by a degenerate bound.
    fn gradient(&self, x: &Array, bounds: &BoxConstraint) -> Result<Array> {
        let f0 = self.value(x)?;
        let h = FINITE_DIFFERENCE_STEP;
        let mut grad = Array::zeros(x.size());
        for j in 0..x.size() {
            let mut xh = x.clone();
            if x[j] + h <= bounds.upper()[j] {
                xh[j] += h;
                grad[j] = (self.value(&xh)? - f0) / h;
            } else if x[j] - h >= bounds.lower()[j] {
                xh[j] -= h;
                grad[j] = (f0 - self.value(&xh)?) / h;
            }
        }
        Ok(grad)
    }
}

impl<F> CostFunction for F
where
    F: Fn(&Array) -> Result<Real> + Sync,
{
    fn value(&self, x: &Array) -> Result<Real> {
        self(x)
    }
}

// ── Box constraint ────────────────────────────────────────────────────────────

/// Component-wise bounds `lower[i] ≤ x[i] ≤ upper[i]`.
///
/// A component with `lower[i] == upper[i]` is fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxConstraint {
    lower: Array,
    upper: Array,
}

impl BoxConstraint {
    /// Create a box constraint.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] on mismatched sizes, non-finite or
    /// inverted bounds.
    pub fn new(lower: Array, upper: Array) -> Result<Self> {
        if lower.size() != upper.size() {
            return Err(Error::InvalidArgument(format!(
                "bound sizes differ: {} lower vs {} upper",
                lower.size(),
                upper.size()
            )));
        }
        for i in 0..lower.size() {
            if !(lower[i].is_finite() && upper[i].is_finite()) || lower[i] > upper[i] {
                return Err(Error::InvalidArgument(format!(
                    "invalid bound #{i}: [{}, {}]",
                    lower[i], upper[i]
                )));
            }
        }
        Ok(Self { lower, upper })
    }

    /// Lower bounds.
    pub fn lower(&self) -> &Array {
        &self.lower
    }

    /// Upper bounds.
    pub fn upper(&self) -> &Array {
        &self.upper
    }

    /// Dimension of the box.
    pub fn size(&self) -> usize {
        self.lower.size()
    }

    /// Whether component `i` is pinned by a degenerate bound.
    pub fn is_fixed(&self, i: usize) -> bool {
        self.lower[i] == self.upper[i]
    }

    /// Return `true` if `x` lies inside the box (NaN never does).
    pub fn test(&self, x: &Array) -> bool {
        x.size() == self.size()
            && (0..x.size()).all(|i| x[i] >= self.lower[i] && x[i] <= self.upper[i])
    }

    /// Clamp `x` into the box.
    pub fn project(&self, x: &Array) -> Array {
        let mut p = x.clone();
        for i in 0..p.size() {
            p[i] = p[i].clamp(self.lower[i], self.upper[i]);
        }
        p
    }
}

// ── End criteria ──────────────────────────────────────────────────────────────

/// Criteria to stop an optimization.
#[derive(Debug, Clone)]
pub struct EndCriteria {
    /// Maximum number of iterations (generations for population methods).
    pub max_iterations: usize,
    /// Relative function-change tolerance.
    pub function_epsilon: Real,
    /// Projected-gradient infinity-norm tolerance.
    pub gradient_norm_epsilon: Real,
}

impl EndCriteria {
    /// Create new end criteria.
    pub fn new(max_iterations: usize, function_epsilon: Real, gradient_norm_epsilon: Real) -> Self {
        Self {
            max_iterations,
            function_epsilon,
            gradient_norm_epsilon,
        }
    }
}

impl Default for EndCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            function_epsilon: 1e-12,
            gradient_norm_epsilon: 1e-5,
        }
    }
}

/// The reason an optimization terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EndCriteriaType {
    /// Maximum iterations reached.
    MaxIterations,
    /// Relative function change below the function epsilon.
    FunctionEpsilon,
    /// Projected gradient below the gradient-norm epsilon.
    GradientNormEpsilon,
    /// No admissible step decreases the cost.
    StationaryPoint,
    /// The population's energies converged.
    PopulationConvergence,
    /// The iteration observer requested a stop.
    ObserverStop,
}

/// Result of an optimization.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Final parameter values.
    pub x: Array,
    /// Final function value.
    pub value: Real,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Number of cost-function evaluations.
    pub evaluations: usize,
    /// Reason for termination.
    pub end_type: EndCriteriaType,
}

// ── Observer ──────────────────────────────────────────────────────────────────

/// Snapshot handed to an [`IterationObserver`] after each iteration.
#[derive(Debug, Clone, Copy)]
pub struct IterationInfo<'a> {
    /// One-based iteration (generation) index.
    pub iteration: usize,
    /// Current best point.
    pub x: &'a Array,
    /// Cost at `x` as tracked by the optimizer.
    pub value: Real,
    /// Optional convergence measure (population spread for DE).
    pub convergence: Option<Real>,
}

/// Callback invoked once per completed iteration.
///
/// Returning `ControlFlow::Break(())` stops the optimizer after the current
/// iteration; returning an error aborts it.
pub trait IterationObserver {
    /// Observe an iteration.
    fn on_iteration(&mut self, info: &IterationInfo<'_>) -> Result<ControlFlow<()>>;
}

impl<F> IterationObserver for F
where
    F: FnMut(&IterationInfo<'_>) -> Result<ControlFlow<()>>,
{
    fn on_iteration(&mut self, info: &IterationInfo<'_>) -> Result<ControlFlow<()>> {
        self(info)
    }
}

/// Observer that never stops the optimizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObserver;

impl IterationObserver for NoObserver {
    fn on_iteration(&mut self, _info: &IterationInfo<'_>) -> Result<ControlFlow<()>> {
        Ok(ControlFlow::Continue(()))
    }
}

// ── Optimizer traits ──────────────────────────────────────────────────────────

/// A bounds-respecting global optimizer that needs no starting point.
pub trait GlobalOptimizer {
    /// Minimize `cost` over `bounds`.
    fn minimize(
        &self,
        cost: &dyn CostFunction,
        bounds: &BoxConstraint,
        observer: &mut dyn IterationObserver,
    ) -> Result<OptimizationResult>;
}

/// A bounds-respecting local optimizer started from `x0`.
pub trait LocalOptimizer {
    /// Minimize `cost` over `bounds` starting from `x0`.
    fn minimize(
        &self,
        cost: &dyn CostFunction,
        bounds: &BoxConstraint,
        x0: &Array,
        observer: &mut dyn IterationObserver,
    ) -> Result<OptimizationResult>;
}

/// Map NaN to `+∞` so that it loses every comparison.
pub(crate) fn sanitize(value: Real) -> Real {
    if value.is_nan() {
        Real::INFINITY
    } else {
        value
    }
}

pub(crate) fn check_start(bounds: &BoxConstraint, x0: &Array) -> Result<()> {
    ensure!(
        x0.size() == bounds.size(),
        "starting point has {} components, bounds have {}",
        x0.size(),
        bounds.size()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn unit_box(n: usize) -> BoxConstraint {
        BoxConstraint::new(Array::zeros(n), Array::from_vec(vec![1.0; n])).unwrap()
    }

    #[test]
    fn box_constraint_rejects_inverted_bounds() {
        let err = BoxConstraint::new(Array::from_slice(&[1.0]), Array::from_slice(&[0.0]));
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn box_constraint_test_and_project() {
        let b = unit_box(2);
        assert!(b.test(&Array::from_slice(&[0.0, 1.0])));
        assert!(!b.test(&Array::from_slice(&[0.5, 1.5])));
        assert!(!b.test(&Array::from_slice(&[Real::NAN, 0.5])));
        let p = b.project(&Array::from_slice(&[-1.0, 2.0]));
        assert_eq!(p.as_slice(), &[0.0, 1.0]);
    }

    #[test]
    fn gradient_switches_to_backward_difference_at_upper_bound() {
        let f = |x: &Array| -> Result<Real> { Ok(x[0] * x[0] + 3.0 * x[1]) };
        let b = unit_box(2);
        let g = f.gradient(&Array::from_slice(&[1.0, 0.5]), &b).unwrap();
        assert_abs_diff_eq!(g[0], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(g[1], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn gradient_is_zero_for_fixed_components() {
        let f = |x: &Array| -> Result<Real> {
            // Leaving the degenerate box would be an error.
            ensure!(x[1] == 0.0, "fixed component moved");
            Ok(x[0] * x[0])
        };
        let b = BoxConstraint::new(Array::from_slice(&[-1.0, 0.0]), Array::from_slice(&[1.0, 0.0]))
            .unwrap();
        let g = f.gradient(&Array::from_slice(&[0.5, 0.0]), &b).unwrap();
        assert_abs_diff_eq!(g[0], 1.0, epsilon = 1e-6);
        assert_eq!(g[1], 0.0);
    }

    #[test]
    fn closure_observer_can_stop() {
        let mut calls = 0;
        let mut obs = |_: &IterationInfo<'_>| -> Result<ControlFlow<()>> {
            calls += 1;
            Ok(ControlFlow::Break(()))
        };
        let x = Array::zeros(1);
        let info = IterationInfo {
            iteration: 1,
            x: &x,
            value: 0.0,
            convergence: None,
        };
        assert!(obs.on_iteration(&info).unwrap().is_break());
        assert_eq!(calls, 1);
    }

    proptest::proptest! {
        #[test]
        fn projection_lands_inside_the_box(
            a in -10.0f64..10.0,
            b in -10.0f64..10.0,
            lo in -2.0f64..0.0,
            width in 0.0f64..3.0,
        ) {
            let bounds = BoxConstraint::new(
                Array::from_slice(&[lo, lo]),
                Array::from_slice(&[lo + width, lo + width]),
            )
            .unwrap();
            let p = bounds.project(&Array::from_slice(&[a, b]));
            proptest::prop_assert!(bounds.test(&p));
        }
    }
}
