//! Local stage: bounded quasi-Newton polish of the global optimum.

use std::ops::ControlFlow;
use std::time::Instant;

use serde::Serialize;

use hcal_core::{errors::Result, Real};
use hcal_math::{Array, BoundedBfgs, CostFunction, EndCriteriaType, IterationInfo, LocalOptimizer};
use hcal_models::{HestonParams, ParameterBounds};

use crate::progress::{ProgressRecord, Stage};

/// Append-only record of the loss after each local iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LossHistory(Vec<Real>);

impl LossHistory {
    /// Append a loss.
    pub fn push(&mut self, loss: Real) {
        self.0.push(loss);
    }

    /// Losses in iteration order.
    pub fn values(&self) -> &[Real] {
        &self.0
    }

    /// Number of recorded iterations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Most recent loss.
    pub fn last(&self) -> Option<Real> {
        self.0.last().copied()
    }
}

/// Result of the local stage.
#[derive(Debug, Clone, Serialize)]
pub struct LocalRefinementOutcome {
    /// Refined vector.
    pub params: HestonParams,
    /// Loss at `params`.
    pub loss: Real,
    /// Iterations performed.
    pub iterations: usize,
    /// False when the iteration cap was hit.
    pub converged: bool,
    /// Optimizer stopping criterion.
    pub end_type: EndCriteriaType,
    /// Loss after each iteration.
    pub history: LossHistory,
    /// One record per iteration.
    pub progress: Vec<ProgressRecord>,
}

/// Runs a local optimizer from a starting vector.
#[derive(Debug, Clone, Default)]
pub struct LocalRefinementController<O = BoundedBfgs> {
    optimizer: O,
}

impl<O: LocalOptimizer> LocalRefinementController<O> {
    /// Create a controller.
    pub fn new(optimizer: O) -> Self {
        Self { optimizer }
    }

    /// Minimize `loss` over `bounds` starting from `start`.
    ///
    /// # Errors
    /// Propagates loss and optimizer failures. Running out of iterations is
    /// not an error; it is reported through `converged`.
    pub fn run(
        &self,
        loss: &dyn CostFunction,
        start: &HestonParams,
        bounds: &ParameterBounds,
    ) -> Result<LocalRefinementOutcome> {
        let constraint = bounds.to_constraint()?;
        let started = Instant::now();
        let mut history = LossHistory::default();
        let mut progress = Vec::new();

        let mut callback = |info: &IterationInfo<'_>| -> Result<ControlFlow<()>> {
            history.push(info.value);
            let record = ProgressRecord {
                stage: Stage::Local,
                iteration: info.iteration,
                elapsed: started.elapsed(),
                loss: info.value,
                stale: None,
                params: HestonParams::from_array(info.x)?,
            };
            record.trace();
            progress.push(record);
            Ok(ControlFlow::Continue(()))
        };
        let x0: Array = start.to_array();
        let result = self.optimizer.minimize(loss, &constraint, &x0, &mut callback)?;
        let converged = result.end_type != EndCriteriaType::MaxIterations;

        #[cfg(feature = "logging")]
        {
            if converged {
                tracing::info!(
                    iterations = result.iterations,
                    loss = result.value,
                    end_type = ?result.end_type,
                    "local refinement finished"
                );
            } else {
                tracing::warn!(
                    iterations = result.iterations,
                    loss = result.value,
                    "local refinement hit its iteration cap"
                );
            }
        }

        Ok(LocalRefinementOutcome {
            params: HestonParams::from_array(&result.x)?,
            loss: result.value,
            iterations: result.iterations,
            converged,
            end_type: result.end_type,
            history,
            progress,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use hcal_math::EndCriteria;

    fn bowl(x: &Array) -> Result<Real> {
        let target = [0.05, 2.5, 0.06, 0.3, -0.4, 0.0];
        Ok((0..6).map(|i| (x[i] - target[i]).powi(2)).sum())
    }

    fn start() -> HestonParams {
        HestonParams::new(0.04, 3.0, 0.04, 0.5, -0.5, 0.0)
    }

    #[test]
    fn refines_to_the_minimum() {
        let outcome = LocalRefinementController::<BoundedBfgs>::default()
            .run(&bowl, &start(), &ParameterBounds::default())
            .unwrap();
        assert!(outcome.converged);
        assert_abs_diff_eq!(outcome.params.kappa, 2.5, epsilon = 1e-4);
        assert_abs_diff_eq!(outcome.params.rho, -0.4, epsilon = 1e-4);
        assert_eq!(outcome.params.lambda, 0.0);
        assert_eq!(outcome.history.len(), outcome.iterations);
        assert_eq!(outcome.history.last(), Some(outcome.loss));
        assert!(outcome.progress.iter().all(|r| r.stage == Stage::Local && r.stale.is_none()));
    }

    #[test]
    fn iteration_cap_is_not_an_error() {
        let optimizer = BoundedBfgs::new(EndCriteria::new(1, 0.0, 0.0));
        let controller = LocalRefinementController::new(optimizer);
        let outcome = controller
            .run(&bowl, &start(), &ParameterBounds::default())
            .unwrap();
        assert!(!outcome.converged);
        assert_eq!(outcome.end_type, EndCriteriaType::MaxIterations);
        assert_eq!(outcome.history.len(), 1);
    }
}
