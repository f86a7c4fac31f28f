//! Global stage: differential evolution with early stopping.
//!
//! After every generation the controller recomputes the loss at the
//! optimizer's best candidate and feeds it to an [`EarlyStopping`] monitor.
//! A generation improves the run only when the loss drops by more than a
//! relative or an absolute threshold. A non-zero `patience` of stale
//! generations in a row, or an exhausted wall-clock budget, ends the search.

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use serde::Serialize;

use hcal_core::{errors::Result, Real};
use hcal_math::{
    Array, CostFunction, DifferentialEvolution, EndCriteriaType, GlobalOptimizer, IterationInfo,
};
use hcal_models::{HestonParams, ParameterBounds};

use crate::config::EarlyStoppingConfig;
use crate::progress::{ProgressRecord, Stage};

// Lower bound on the denominator of the relative improvement.
const RELATIVE_FLOOR: Real = 1e-12;

/// Why the global stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// `patience` consecutive generations without a significant improvement.
    Patience,
    /// The wall-clock budget ran out.
    TimeBudget,
    /// The optimizer stopped on its own criteria.
    Optimizer(EndCriteriaType),
}

/// Mutable bookkeeping of one global search run.
#[derive(Debug, Clone)]
pub struct CalibrationState {
    /// Best recomputed loss so far.
    pub best_loss: Real,
    /// Vector at which `best_loss` was observed.
    pub best_params: Option<HestonParams>,
    /// Callbacks seen.
    pub iterations: usize,
    /// Consecutive callbacks without a significant improvement.
    pub stale: usize,
    /// Start of the run.
    pub started: Instant,
}

impl CalibrationState {
    fn new(started: Instant) -> Self {
        Self {
            best_loss: Real::INFINITY,
            best_params: None,
            iterations: 0,
            stale: 0,
            started,
        }
    }
}

/// Early-stopping monitor driven once per generation.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    config: EarlyStoppingConfig,
    state: CalibrationState,
}

impl EarlyStopping {
    /// Start monitoring now.
    pub fn new(config: EarlyStoppingConfig) -> Self {
        Self::started_at(config, Instant::now())
    }

    /// Start monitoring from `started`.
    pub fn started_at(config: EarlyStoppingConfig, started: Instant) -> Self {
        Self {
            config,
            state: CalibrationState::new(started),
        }
    }

    /// Current state.
    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    /// Whether `current` improves on `previous` by a significant margin.
    pub fn is_improvement(&self, previous: Real, current: Real) -> bool {
        if !(current < previous) {
            return false;
        }
        let absolute = previous - current;
        let relative = absolute / previous.abs().max(RELATIVE_FLOOR);
        relative > self.config.min_rel_improvement || absolute > self.config.min_abs_improvement
    }

    /// Record one generation observed `elapsed` after the start.
    pub fn observe_at(
        &mut self,
        loss: Real,
        params: HestonParams,
        elapsed: Duration,
    ) -> ControlFlow<StopReason> {
        self.state.iterations += 1;
        if self.is_improvement(self.state.best_loss, loss) {
            self.state.best_loss = loss;
            self.state.best_params = Some(params);
            self.state.stale = 0;
        } else {
            self.state.stale += 1;
        }

        if let Some(budget) = self.config.max_seconds {
            if elapsed.as_secs_f64() >= budget {
                return ControlFlow::Break(StopReason::TimeBudget);
            }
        }
        if self.config.patience > 0 && self.state.stale >= self.config.patience {
            return ControlFlow::Break(StopReason::Patience);
        }
        ControlFlow::Continue(())
    }

    /// Record one generation observed now.
    pub fn observe(&mut self, loss: Real, params: HestonParams) -> ControlFlow<StopReason> {
        let elapsed = self.state.started.elapsed();
        self.observe_at(loss, params, elapsed)
    }
}

/// Result of the global stage.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalSearchOutcome {
    /// Best vector according to the optimizer.
    pub optimizer_best: HestonParams,
    /// Optimizer's loss at `optimizer_best`.
    pub optimizer_value: Real,
    /// Best recomputed loss seen by the controller.
    pub best_loss: Real,
    /// Vector at which `best_loss` was observed.
    pub best_params: HestonParams,
    /// Generations completed.
    pub generations: usize,
    /// Cost evaluations performed by the optimizer.
    pub evaluations: usize,
    /// Why the search ended.
    pub stop_reason: StopReason,
    /// One record per generation.
    pub progress: Vec<ProgressRecord>,
}

/// Runs a global optimizer under early stopping.
#[derive(Debug, Clone)]
pub struct GlobalSearchController<O = DifferentialEvolution> {
    optimizer: O,
    early_stopping: EarlyStoppingConfig,
}

impl<O: GlobalOptimizer> GlobalSearchController<O> {
    /// Create a controller.
    pub fn new(optimizer: O, early_stopping: EarlyStoppingConfig) -> Self {
        Self {
            optimizer,
            early_stopping,
        }
    }

    /// The wrapped optimizer.
    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    /// Minimize `loss` over `bounds`.
    ///
    /// # Errors
    /// Propagates loss and optimizer failures, including a loss that cannot
    /// be recomputed inside the callback.
    pub fn run(
        &self,
        loss: &dyn CostFunction,
        bounds: &ParameterBounds,
    ) -> Result<GlobalSearchOutcome> {
        let constraint = bounds.to_constraint()?;
        let mut monitor = EarlyStopping::new(self.early_stopping.clone());
        let mut progress = Vec::new();
        let mut stop = None;

        let mut callback = |info: &IterationInfo<'_>| -> Result<ControlFlow<()>> {
            let params = HestonParams::from_array(info.x)?;
            let value = loss.value(info.x)?;
            let flow = monitor.observe(value, params);
            let state = monitor.state();
            let record = ProgressRecord {
                stage: Stage::Global,
                iteration: info.iteration,
                elapsed: state.started.elapsed(),
                loss: value,
                stale: Some(state.stale),
                params,
            };
            record.trace();
            progress.push(record);
            Ok(match flow {
                ControlFlow::Break(reason) => {
                    stop = Some(reason);
                    ControlFlow::Break(())
                }
                ControlFlow::Continue(()) => ControlFlow::Continue(()),
            })
        };
        let result = self.optimizer.minimize(loss, &constraint, &mut callback)?;

        let optimizer_best = HestonParams::from_array(&result.x)?;
        let state = monitor.state();
        let stop_reason = match (stop, result.end_type) {
            (Some(reason), EndCriteriaType::ObserverStop) => reason,
            (_, end_type) => StopReason::Optimizer(end_type),
        };
        let (best_loss, best_params) = match state.best_params {
            Some(params) => (state.best_loss, params),
            None => (result.value, optimizer_best),
        };

        #[cfg(feature = "logging")]
        tracing::info!(
            generations = result.iterations,
            evaluations = result.evaluations,
            optimizer_value = result.value,
            best_loss,
            stop_reason = ?stop_reason,
            "global search finished"
        );

        Ok(GlobalSearchOutcome {
            optimizer_best,
            optimizer_value: result.value,
            best_loss,
            best_params,
            generations: result.iterations,
            evaluations: result.evaluations,
            stop_reason,
            progress,
        })
    }
}

impl GlobalSearchOutcome {
    /// Starting point for the local stage: the optimizer's best vector.
    pub fn starting_point(&self) -> Array {
        self.optimizer_best.to_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> HestonParams {
        HestonParams::new(0.04, 2.0, 0.04, 0.4, -0.6, 0.0)
    }

    fn monitor(patience: usize, max_seconds: Option<Real>) -> EarlyStopping {
        EarlyStopping::new(EarlyStoppingConfig {
            patience,
            max_seconds,
            ..EarlyStoppingConfig::default()
        })
    }

    #[test]
    fn constant_loss_stops_on_patience_plus_one() {
        let mut m = monitor(8, None);
        let mut stops = Vec::new();
        for k in 1..=20 {
            if m.observe_at(0.5, params(), Duration::ZERO).is_break() {
                stops.push(k);
                break;
            }
        }
        assert_eq!(stops, vec![9]);
        assert_eq!(m.state().stale, 8);
        assert_eq!(m.state().best_loss, 0.5);
    }

    #[test]
    fn zero_patience_never_stops() {
        let mut m = monitor(0, None);
        for _ in 0..50 {
            assert!(m.observe_at(1.0, params(), Duration::ZERO).is_continue());
        }
        assert_eq!(m.state().stale, 49);
        assert_eq!(m.state().iterations, 50);
    }

    #[test]
    fn tiny_improvements_count_as_stale() {
        let mut m = monitor(3, None);
        assert!(m.observe_at(1.0, params(), Duration::ZERO).is_continue());
        // Below both the relative and the absolute threshold.
        assert!(m.observe_at(1.0 - 1e-7, params(), Duration::ZERO).is_continue());
        assert_eq!(m.state().stale, 1);
        assert_eq!(m.state().best_loss, 1.0);
        assert!(m.observe_at(0.9, params(), Duration::ZERO).is_continue());
        assert_eq!(m.state().stale, 0);
    }

    #[test]
    fn absolute_threshold_accepts_small_relative_gains() {
        let m = monitor(3, None);
        // Relative gain 2e-6 is below 1e-5 but the absolute gain 2e-6 exceeds 1e-6.
        assert!(m.is_improvement(1.0, 1.0 - 2e-6));
        assert!(!m.is_improvement(1.0, 1.0));
        assert!(!m.is_improvement(1.0, Real::NAN));
        assert!(m.is_improvement(Real::INFINITY, 7.0));
    }

    #[test]
    fn time_budget_stops() {
        let mut m = monitor(100, Some(1.0));
        assert!(m.observe_at(1.0, params(), Duration::from_millis(500)).is_continue());
        assert_eq!(
            m.observe_at(0.5, params(), Duration::from_millis(1500)),
            ControlFlow::Break(StopReason::TimeBudget)
        );
    }

    #[test]
    fn time_budget_is_inclusive() {
        let mut m = monitor(100, Some(1.0));
        assert_eq!(
            m.observe_at(1.0, params(), Duration::from_secs(1)),
            ControlFlow::Break(StopReason::TimeBudget)
        );
    }

    #[test]
    fn best_loss_never_increases() {
        let mut m = monitor(100, None);
        let losses = [3.0, 2.0, 2.5, 1.0, 1.0, 4.0, 0.5, 0.6];
        let mut last = Real::INFINITY;
        for loss in losses {
            let _ = m.observe_at(loss, params(), Duration::ZERO);
            assert!(m.state().best_loss <= last);
            last = m.state().best_loss;
        }
        assert_eq!(last, 0.5);
    }

    fn bowl(x: &Array) -> Result<Real> {
        let target = [0.05, 2.5, 0.06, 0.3, -0.4, 0.0];
        Ok((0..6).map(|i| (x[i] - target[i]).powi(2)).sum())
    }

    #[test]
    fn controller_records_every_generation() {
        let controller = GlobalSearchController::new(
            DifferentialEvolution::new().with_max_generations(30),
            EarlyStoppingConfig::default(),
        );
        let outcome = controller.run(&bowl, &ParameterBounds::default()).unwrap();
        assert_eq!(outcome.progress.len(), outcome.generations);
        assert!(outcome
            .progress
            .iter()
            .all(|r| r.stage == Stage::Global && r.stale.is_some()));
        assert!(outcome.best_loss <= outcome.progress[0].loss);
        assert_eq!(outcome.optimizer_best.lambda, 0.0);
    }

    #[test]
    fn controller_stops_on_patience() {
        // Energies keep a spread, so only the stale counter can end the run.
        let flat = |x: &Array| -> Result<Real> { Ok(1.0 + 1e-9 * x[1]) };
        let controller = GlobalSearchController::new(
            DifferentialEvolution::new().with_tolerances(0.0, 0.0),
            EarlyStoppingConfig {
                patience: 2,
                ..EarlyStoppingConfig::default()
            },
        );
        let outcome = controller.run(&flat, &ParameterBounds::default()).unwrap();
        assert_eq!(outcome.stop_reason, StopReason::Patience);
        assert_eq!(outcome.generations, 3);
    }
}
