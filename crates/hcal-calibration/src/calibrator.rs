//! End-to-end Heston calibration.
//!
//! A run checks the quotes for put-call parity, seeds a vector from the
//! at-the-money volatility, gates on model parity at the seed, searches the
//! box with differential evolution and polishes the result with bounded
//! BFGS. The fitted vector is then checked for the Feller condition and
//! model parity, and every quote is repriced with the reporting engine.

use std::time::{Duration, Instant};

use serde::Serialize;

use hcal_core::{
    errors::{Error, Result},
    Real,
};
use hcal_models::{HestonParams, ParameterBounds};
use hcal_pricingengines::{AnalyticHestonEngine, HestonPricer};

use crate::config::CalibrationConfig;
use crate::global_search::{GlobalSearchController, GlobalSearchOutcome};
use crate::local_refinement::{LocalRefinementController, LocalRefinementOutcome};
use crate::loss::LossEvaluator;
use crate::quotes::QuoteTable;
use crate::repricing::{reprice, smile_curves, RepricedQuote, SmileCurve};
use crate::seeder::seed;
use crate::validation::{check_market_parity, check_model_parity, feller_condition, ParityReport};

/// Everything a calibration run produced.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationReport {
    /// Starting vector.
    pub seed: HestonParams,
    /// Parameter box.
    pub bounds: ParameterBounds,
    /// Fitted vector.
    pub params: HestonParams,
    /// Loss at `params`.
    pub loss: Real,
    /// Whether `params` satisfies `2κθ > σ²`.
    pub feller: bool,
    /// Parity of the quoted prices.
    pub market_parity: ParityReport,
    /// Model parity at the seed.
    pub seed_parity: ParityReport,
    /// Model parity at the fitted vector.
    pub fit_parity: ParityReport,
    /// Global stage.
    pub global: GlobalSearchOutcome,
    /// Local stage.
    pub local: LocalRefinementOutcome,
    /// Quotes repriced at the fitted vector.
    pub repriced: Vec<RepricedQuote>,
    /// Model smiles per maturity at the fitted vector.
    pub smiles: Vec<SmileCurve>,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

impl CalibrationReport {
    /// Root mean square of the model-minus-market implied volatilities that
    /// could be inverted.
    pub fn iv_rmse(&self) -> Option<Real> {
        let errors: Vec<Real> = self.repriced.iter().filter_map(|r| r.iv_error()).collect();
        if errors.is_empty() {
            return None;
        }
        Some((errors.iter().map(|e| e * e).sum::<Real>() / errors.len() as Real).sqrt())
    }
}

/// Calibrates the Heston model to a quote table.
#[derive(Debug, Clone, Default)]
pub struct HestonCalibrator {
    config: CalibrationConfig,
}

impl HestonCalibrator {
    /// Create a calibrator.
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// The settings in use.
    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Calibrate with analytic engines at the configured integration orders.
    ///
    /// # Errors
    /// See [`calibrate_with`](Self::calibrate_with).
    pub fn calibrate(&self, table: &QuoteTable) -> Result<CalibrationReport> {
        let calibration = AnalyticHestonEngine::new(self.config.calibration_order);
        let repricing = AnalyticHestonEngine::new(self.config.repricing_order);
        self.calibrate_with(table, &calibration, &repricing)
    }

    /// Calibrate with caller-supplied pricers: `pricer` inside the loss and
    /// the parity checks, `repricing` for the post-fit diagnostics.
    ///
    /// # Errors
    /// - [`Error::InvalidArgument`] for unusable settings.
    /// - [`Error::InputInconsistency`] for an empty table or quotes that
    ///   violate put-call parity.
    /// - [`Error::Numerical`] when model prices at the seed violate parity.
    /// - Any loss, pricer or optimizer failure.
    pub fn calibrate_with(
        &self,
        table: &QuoteTable,
        pricer: &dyn HestonPricer,
        repricing: &dyn HestonPricer,
    ) -> Result<CalibrationReport> {
        let started = Instant::now();
        let config = &self.config;
        config.validate()?;
        table.ensure_non_empty()?;

        let market_parity = check_market_parity(table, config.parity_tolerance)?;
        if !market_parity.passed {
            return Err(Error::InputInconsistency(format!(
                "quote #{} violates put-call parity by {:e}",
                market_parity.worst_index, market_parity.max_abs_diff
            )));
        }

        let (seed, bounds) = seed(table, &config.bounds)?;
        let seed_parity = check_model_parity(table, pricer, &seed, config.parity_tolerance)?;
        if !seed_parity.passed {
            return Err(Error::Numerical(format!(
                "model prices at the seed violate put-call parity by {:e} at quote #{}",
                seed_parity.max_abs_diff, seed_parity.worst_index
            )));
        }

        #[cfg(feature = "logging")]
        tracing::info!(
            quotes = table.len(),
            maturities = table.groups().len(),
            v0 = seed.v0,
            theta = seed.theta,
            "calibration started"
        );

        let loss = LossEvaluator::new(table, pricer, bounds).with_vega_floor(config.vega_floor);
        let global = GlobalSearchController::new(
            config.global.optimizer(),
            config.early_stopping.clone(),
        )
        .run(&loss, &bounds)?;
        let local = LocalRefinementController::new(config.local.optimizer()).run(
            &loss,
            &global.optimizer_best,
            &bounds,
        )?;

        let params = local.params;
        let feller = feller_condition(&params);
        let fit_parity = check_model_parity(table, pricer, &params, config.parity_tolerance)?;
        let repriced = reprice(table, repricing, &params)?;
        let smiles = if config.smile_points > 0 {
            smile_curves(table, repricing, &params, config.smile_band, config.smile_points)?
        } else {
            Vec::new()
        };

        #[cfg(feature = "logging")]
        {
            if !feller {
                tracing::warn!(
                    kappa = params.kappa,
                    theta = params.theta,
                    sigma = params.sigma,
                    "fitted parameters violate the Feller condition"
                );
            }
            if !fit_parity.passed {
                tracing::warn!(
                    max_abs_diff = fit_parity.max_abs_diff,
                    worst_index = fit_parity.worst_index,
                    "model prices at the fit violate put-call parity"
                );
            }
            tracing::info!(
                loss = local.loss,
                converged = local.converged,
                elapsed_s = started.elapsed().as_secs_f64(),
                "calibration finished"
            );
        }

        Ok(CalibrationReport {
            seed,
            bounds,
            params,
            loss: local.loss,
            feller,
            market_parity,
            seed_parity,
            fit_parity,
            global,
            local,
            repriced,
            smiles,
            elapsed: started.elapsed(),
        })
    }
}
