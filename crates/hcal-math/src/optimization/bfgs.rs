//! Box-constrained BFGS.
//!
//! A projected quasi-Newton method: components sitting on a bound with the
//! gradient pointing outward are frozen for the iteration, the search
//! direction is built from the inverse-Hessian approximation on the remaining
//! free components, and trial points are projected back into the box during a
//! backtracking Armijo line search.

use std::ops::ControlFlow;

use crate::array::Array;
use crate::optimization::{
    check_start, sanitize, BoxConstraint, CostFunction, EndCriteria, EndCriteriaType,
    IterationInfo, IterationObserver, LocalOptimizer, OptimizationResult,
};
use hcal_core::{errors::Result, Real};

const ARMIJO: Real = 1e-4;
const MAX_BACKTRACKS: usize = 40;

/// Projected BFGS optimizer for box-constrained problems.
///
/// Stops when the relative decrease `(f_k − f_{k+1}) / max(|f_k|, |f_{k+1}|, 1)`
/// falls to `function_epsilon`, when the projected gradient's infinity norm
/// falls to `gradient_norm_epsilon`, or after `max_iterations`.
#[derive(Debug, Clone, Default)]
pub struct BoundedBfgs {
    end_criteria: EndCriteria,
}

impl BoundedBfgs {
    /// Create a new optimizer with the given end criteria.
    pub fn new(end_criteria: EndCriteria) -> Self {
        Self { end_criteria }
    }

    /// The end criteria in use.
    pub fn end_criteria(&self) -> &EndCriteria {
        &self.end_criteria
    }
}

impl LocalOptimizer for BoundedBfgs {
    fn minimize(
        &self,
        cost: &dyn CostFunction,
        bounds: &BoxConstraint,
        x0: &Array,
        observer: &mut dyn IterationObserver,
    ) -> Result<OptimizationResult> {
        check_start(bounds, x0)?;
        let n = x0.size();
        let ec = &self.end_criteria;

        let mut x = bounds.project(x0);
        let mut value = sanitize(cost.value(&x)?);
        let mut grad = cost.gradient(&x, bounds)?;
        let mut evaluations = 1 + n;
        let mut h_inv = identity_matrix(n);
        let mut fresh_hessian = true;

        for iteration in 1..=ec.max_iterations {
            let free = free_components(&x, &grad, bounds);
            let pg = masked(&grad, &free);
            if pg.norm_inf() <= ec.gradient_norm_epsilon {
                return Ok(done(
                    x,
                    value,
                    iteration - 1,
                    evaluations,
                    EndCriteriaType::GradientNormEpsilon,
                ));
            }

            let mut direction = masked(&-&mat_vec_mul(&h_inv, &pg, n), &free);
            if direction.dot(&pg) >= 0.0 {
                h_inv = identity_matrix(n);
                fresh_hessian = true;
                direction = -&pg;
            }

            // Without curvature information the unit step has no scale.
            let mut alpha = if fresh_hessian {
                (1.0 / direction.norm_inf()).min(1.0)
            } else {
                1.0
            };
            let mut accepted = None;
            for _ in 0..MAX_BACKTRACKS {
                let candidate = bounds.project(&(&x + &(&direction * alpha)));
                let step = &candidate - &x;
                if step.norm_inf() == 0.0 {
                    break;
                }
                let candidate_value = sanitize(cost.value(&candidate)?);
                evaluations += 1;
                if candidate_value <= value + ARMIJO * grad.dot(&step) {
                    accepted = Some((candidate, candidate_value));
                    break;
                }
                alpha *= 0.5;
            }
            let Some((x_new, value_new)) = accepted else {
                return Ok(done(
                    x,
                    value,
                    iteration - 1,
                    evaluations,
                    EndCriteriaType::StationaryPoint,
                ));
            };

            let grad_new = cost.gradient(&x_new, bounds)?;
            evaluations += n;

            let s = &x_new - &x;
            let y = &grad_new - &grad;
            let sy = s.dot(&y);
            if sy > 1e-10 * s.norm() * y.norm() {
                update_inverse_hessian(&mut h_inv, &s, &y, 1.0 / sy, n);
                fresh_hessian = false;
            }

            let decrease = (value - value_new) / value.abs().max(value_new.abs()).max(1.0);
            x = x_new;
            value = value_new;
            grad = grad_new;

            let info = IterationInfo {
                iteration,
                x: &x,
                value,
                convergence: Some(decrease),
            };
            if let ControlFlow::Break(()) = observer.on_iteration(&info)? {
                return Ok(done(x, value, iteration, evaluations, EndCriteriaType::ObserverStop));
            }
            if decrease <= ec.function_epsilon {
                return Ok(done(x, value, iteration, evaluations, EndCriteriaType::FunctionEpsilon));
            }
        }

        Ok(done(x, value, ec.max_iterations, evaluations, EndCriteriaType::MaxIterations))
    }
}

fn done(
    x: Array,
    value: Real,
    iterations: usize,
    evaluations: usize,
    end_type: EndCriteriaType,
) -> OptimizationResult {
    OptimizationResult {
        x,
        value,
        iterations,
        evaluations,
        end_type,
    }
}

// A component is frozen when it is fixed or sits on a bound with the
// descent direction pointing out of the box.
fn free_components(x: &Array, grad: &Array, bounds: &BoxConstraint) -> Vec<bool> {
    (0..x.size())
        .map(|i| {
            !(bounds.is_fixed(i)
                || (x[i] <= bounds.lower()[i] && grad[i] > 0.0)
                || (x[i] >= bounds.upper()[i] && grad[i] < 0.0))
        })
        .collect()
}

fn masked(v: &Array, free: &[bool]) -> Array {
    let mut out = v.clone();
    for (i, &keep) in free.iter().enumerate() {
        if !keep {
            out[i] = 0.0;
        }
    }
    out
}

// ── Dense helpers on a row-major n×n matrix ───────────────────────────────────

fn identity_matrix(n: usize) -> Vec<Real> {
    let mut m = vec![0.0; n * n];
    for i in 0..n {
        m[i * n + i] = 1.0;
    }
    m
}

fn mat_vec_mul(m: &[Real], v: &Array, n: usize) -> Array {
    let mut result = Array::zeros(n);
    for i in 0..n {
        result[i] = (0..n).map(|j| m[i * n + j] * v[j]).sum();
    }
    result
}

/// `H ← (I − ρ s yᵀ) H (I − ρ y sᵀ) + ρ s sᵀ`, expanded for symmetric `H`.
fn update_inverse_hessian(h: &mut [Real], s: &Array, y: &Array, rho: Real, n: usize) {
    let hy = mat_vec_mul(h, y, n);
    let yhy = y.dot(&hy);
    let factor = 1.0 + rho * yhy;
    for i in 0..n {
        for j in 0..n {
            h[i * n + j] += rho * (factor * s[i] * s[j] - hy[i] * s[j] - s[i] * hy[j]);
        }
    }
}
