//! Calibration settings.
//!
//! Plain structs with defaults matching the reference calibration and
//! `with_*` builders. Every struct deserializes from partial JSON; missing
//! fields take their defaults.

use serde::{Deserialize, Serialize};

use hcal_core::{
    errors::{Error, Result},
    Real,
};
use hcal_math::{BoundedBfgs, DifferentialEvolution, EndCriteria};
use hcal_models::ParameterBounds;

use crate::repricing::SMILE_GRID_POINTS;

/// Gauss-Legendre order of the Heston engine inside the loss.
pub const CALIBRATION_INTEGRATION_ORDER: usize = 185;
/// Gauss-Legendre order used when repricing after the fit.
pub const REPRICING_INTEGRATION_ORDER: usize = 128;

/// Differential-evolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSearchConfig {
    /// Population size as a multiple of the parameter count.
    pub population_multiplier: usize,
    /// Dither interval of the differential weight.
    pub mutation: (Real, Real),
    /// Crossover probability.
    pub recombination: Real,
    /// Maximum number of generations.
    pub max_generations: usize,
    /// Relative tolerance of the population convergence test.
    pub tol: Real,
    /// Absolute tolerance of the population convergence test.
    pub atol: Real,
    /// Random seed.
    pub seed: u64,
    /// Threads scoring candidates; 1 scores sequentially.
    pub workers: usize,
}

impl Default for GlobalSearchConfig {
    fn default() -> Self {
        Self {
            population_multiplier: 10,
            mutation: (0.3, 0.8),
            recombination: 0.9,
            max_generations: 100,
            tol: 1e-12,
            atol: 1e-6,
            seed: 7,
            workers: 1,
        }
    }
}

impl GlobalSearchConfig {
    /// The configured optimizer.
    pub fn optimizer(&self) -> DifferentialEvolution {
        DifferentialEvolution::new()
            .with_population_multiplier(self.population_multiplier)
            .with_mutation(self.mutation.0, self.mutation.1)
            .with_crossover_probability(self.recombination)
            .with_max_generations(self.max_generations)
            .with_tolerances(self.tol, self.atol)
            .with_seed(self.seed)
            .with_workers(self.workers)
    }
}

/// Early stopping of the global search on stalled improvement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyStoppingConfig {
    /// Consecutive non-improving generations tolerated; 0 disables the
    /// patience stop.
    pub patience: usize,
    /// Minimum relative improvement that counts.
    pub min_rel_improvement: Real,
    /// Minimum absolute improvement that counts.
    pub min_abs_improvement: Real,
    /// Optional wall-clock budget in seconds.
    pub max_seconds: Option<Real>,
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        Self {
            patience: 8,
            min_rel_improvement: 1e-5,
            min_abs_improvement: 1e-6,
            max_seconds: None,
        }
    }
}

/// Bounded BFGS settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalRefinementConfig {
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Relative function-decrease tolerance.
    pub ftol: Real,
    /// Projected-gradient tolerance.
    pub pgtol: Real,
}

impl Default for LocalRefinementConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            ftol: 1e-12,
            pgtol: 1e-5,
        }
    }
}

impl LocalRefinementConfig {
    /// The configured optimizer.
    pub fn optimizer(&self) -> BoundedBfgs {
        BoundedBfgs::new(EndCriteria::new(self.max_iterations, self.ftol, self.pgtol))
    }
}

/// Everything a calibration run needs besides the quotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Parameter box.
    pub bounds: ParameterBounds,
    /// Floor applied to vegas used as loss weights.
    pub vega_floor: Real,
    /// Heston integration order inside the loss.
    pub calibration_order: usize,
    /// Heston integration order for post-fit repricing.
    pub repricing_order: usize,
    /// Absolute tolerance of the put-call parity checks.
    pub parity_tolerance: Real,
    /// Global stage.
    pub global: GlobalSearchConfig,
    /// Early stopping of the global stage.
    pub early_stopping: EarlyStoppingConfig,
    /// Local stage.
    pub local: LocalRefinementConfig,
    /// Moneyness range of the reported model smiles; `None` spans the
    /// quoted moneyness.
    pub smile_band: Option<(Real, Real)>,
    /// Points per reported smile; 0 skips the smiles.
    pub smile_points: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            bounds: ParameterBounds::default(),
            vega_floor: 1e-12,
            calibration_order: CALIBRATION_INTEGRATION_ORDER,
            repricing_order: REPRICING_INTEGRATION_ORDER,
            parity_tolerance: 1e-10,
            global: GlobalSearchConfig::default(),
            early_stopping: EarlyStoppingConfig::default(),
            local: LocalRefinementConfig::default(),
            smile_band: None,
            smile_points: SMILE_GRID_POINTS,
        }
    }
}

impl CalibrationConfig {
    /// Set the parameter box.
    pub fn with_bounds(mut self, bounds: ParameterBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Set the global-search seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.global.seed = seed;
        self
    }

    /// Set the number of scoring threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.global.workers = workers;
        self
    }

    /// Set the maximum number of generations.
    pub fn with_max_generations(mut self, generations: usize) -> Self {
        self.global.max_generations = generations;
        self
    }

    /// Set the early-stopping patience.
    pub fn with_patience(mut self, patience: usize) -> Self {
        self.early_stopping.patience = patience;
        self
    }

    /// Set the wall-clock budget of the global stage.
    pub fn with_max_seconds(mut self, seconds: Option<Real>) -> Self {
        self.early_stopping.max_seconds = seconds;
        self
    }

    /// Set the local-stage iteration cap.
    pub fn with_local_max_iterations(mut self, iterations: usize) -> Self {
        self.local.max_iterations = iterations;
        self
    }

    /// Set the vega floor.
    pub fn with_vega_floor(mut self, floor: Real) -> Self {
        self.vega_floor = floor;
        self
    }

    /// Set the calibration and repricing integration orders.
    pub fn with_integration_orders(mut self, calibration: usize, repricing: usize) -> Self {
        self.calibration_order = calibration;
        self.repricing_order = repricing;
        self
    }

    /// Check that the settings are usable.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        let invalid = |what: String| Err(Error::InvalidArgument(what));
        self.bounds.to_constraint()?;
        if !(self.vega_floor > 0.0) {
            return invalid(format!("vega floor must be positive, got {}", self.vega_floor));
        }
        if self.calibration_order == 0 || self.repricing_order == 0 {
            return invalid("integration orders must be positive".into());
        }
        if !(self.parity_tolerance >= 0.0) {
            return invalid(format!(
                "parity tolerance must be non-negative, got {}",
                self.parity_tolerance
            ));
        }
        if let Some((low, high)) = self.smile_band {
            if !(low < high) {
                return invalid(format!("empty smile band [{low}, {high}]"));
            }
        }
        if self.global.workers == 0 {
            return invalid("worker count must be positive".into());
        }
        if self.global.population_multiplier == 0 {
            return invalid("population multiplier must be positive".into());
        }
        if let Some(seconds) = self.early_stopping.max_seconds {
            if !(seconds >= 0.0) {
                return invalid(format!("time budget must be non-negative, got {seconds}"));
            }
        }
        Ok(())
    }
}
