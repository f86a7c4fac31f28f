//! # hestoncal
//!
//! Calibration of the Heston stochastic-volatility model to European option
//! quotes.
//!
//! This crate is a **façade** that re-exports the workspace crates.
//! Application code should depend on it rather than on the individual
//! `hcal-*` crates.
//!
//! ## Quick start
//!
//! ```rust
//! use hestoncal::calibration::{synthetic_quote_table, CalibrationConfig, HestonCalibrator};
//! use hestoncal::models::HestonParams;
//! use hestoncal::pricingengines::{AnalyticHestonEngine, MarketParams};
//!
//! let truth = HestonParams::new(0.04, 2.0, 0.04, 0.4, -0.6, 0.0);
//! let table = synthetic_quote_table(
//!     &MarketParams::new(100.0, 0.01, 0.0),
//!     &[0.5],
//!     &[0.9, 1.0, 1.1],
//!     &truth,
//!     &AnalyticHestonEngine::default(),
//! )?;
//!
//! let config = CalibrationConfig::default().with_max_generations(5);
//! let report = HestonCalibrator::new(config).calibrate(&table)?;
//! assert!(report.bounds.contains(&report.params));
//! # Ok::<(), hestoncal::core::errors::Error>(())
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types, aliases, and error definitions.
pub use hcal_core as core;

/// Arrays, quadrature, root finding, RNG and optimizers.
pub use hcal_math as math;

/// Heston parameter vector and bounds.
pub use hcal_models as models;

/// Black-Scholes-Merton and Heston pricing engines.
pub use hcal_pricingengines as pricingengines;

/// Quote preparation, loss, optimization stages and the calibrator.
pub use hcal_calibration as calibration;
