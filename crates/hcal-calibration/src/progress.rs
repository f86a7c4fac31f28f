//! Per-iteration progress records emitted by both optimization stages.

use std::time::Duration;

use serde::Serialize;

use hcal_core::Real;
use hcal_models::HestonParams;

/// Optimization stage a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Differential-evolution search.
    Global,
    /// Bounded BFGS refinement.
    Local,
}

/// One observation of an optimizer iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressRecord {
    /// Stage that produced the record.
    pub stage: Stage,
    /// One-based iteration (generation) index.
    pub iteration: usize,
    /// Time since the stage started.
    pub elapsed: Duration,
    /// Loss at `params`.
    pub loss: Real,
    /// Consecutive non-improving generations; global stage only.
    pub stale: Option<usize>,
    /// Parameter vector observed.
    pub params: HestonParams,
}

impl ProgressRecord {
    #[cfg(feature = "logging")]
    pub(crate) fn trace(&self) {
        tracing::debug!(
            stage = ?self.stage,
            iteration = self.iteration,
            elapsed_s = self.elapsed.as_secs_f64(),
            loss = self.loss,
            stale = ?self.stale,
            v0 = self.params.v0,
            kappa = self.params.kappa,
            theta = self.params.theta,
            sigma = self.params.sigma,
            rho = self.params.rho,
            "calibration progress"
        );
    }

    #[cfg(not(feature = "logging"))]
    pub(crate) fn trace(&self) {}
}
