//! # hcal-calibration
//!
//! Calibration of the Heston model to a table of European option quotes.
//!
//! The pipeline prepares quotes from implied volatilities ([`market_data`]),
//! checks them for put-call parity ([`validation`]), seeds a parameter vector
//! ([`seeder`]) and minimizes the vega-weighted pricing error ([`loss`]) with
//! a global differential-evolution stage ([`global_search`]) followed by a
//! bounded BFGS polish ([`local_refinement`]). [`HestonCalibrator`] runs the
//! whole sequence and returns a [`CalibrationReport`].
//!
//! With the default `logging` feature, progress is emitted as `tracing`
//! events.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// End-to-end calibration entry point.
pub mod calibrator;

/// Calibration settings.
pub mod config;

/// Differential-evolution stage with early stopping.
pub mod global_search;

/// Bounded BFGS stage.
pub mod local_refinement;

/// Vega-weighted loss.
pub mod loss;

/// Quote preparation from raw market rows.
pub mod market_data;

/// Per-iteration progress records.
pub mod progress;

/// Quotes and the maturity-grouped quote table.
pub mod quotes;

/// Post-fit repricing and model smiles.
pub mod repricing;

/// Starting vector.
pub mod seeder;

/// Parity and Feller checks.
pub mod validation;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use calibrator::{CalibrationReport, HestonCalibrator};
pub use config::{
    CalibrationConfig, EarlyStoppingConfig, GlobalSearchConfig, LocalRefinementConfig,
};
pub use global_search::{
    CalibrationState, EarlyStopping, GlobalSearchController, GlobalSearchOutcome, StopReason,
};
pub use local_refinement::{LocalRefinementController, LocalRefinementOutcome, LossHistory};
pub use loss::LossEvaluator;
pub use market_data::{
    prepare_quotes, synthetic_quote_table, MarketSnapshot, PreparationConfig, RawQuote,
};
pub use progress::{ProgressRecord, Stage};
pub use quotes::{MaturityGroup, Quote, QuoteTable};
pub use repricing::{reprice, smile_curve, RepricedQuote, SmileCurve, SmilePoint};
pub use seeder::seed;
pub use validation::{check_market_parity, check_model_parity, feller_condition, ParityReport};
