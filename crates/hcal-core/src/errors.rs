//! Error types for hestoncal.
//!
//! A single `thiserror`-derived enum covers every failure the calibration
//! pipeline can report. The `ensure!`, `ensure_post!` and `fail!` macros give
//! terse precondition / postcondition / runtime checks.
//!
//! Fatal vs. absorbed failures:
//!
//! - [`Error::InputInconsistency`] and [`Error::BoundsViolation`] abort a run.
//! - [`Error::Postcondition`] flags an engine output that broke its contract,
//!   such as a non-finite model price.
//! - [`Error::Numerical`] is raised by single-point computations (e.g. an
//!   implied-volatility inversion) and is absorbed by callers that can carry a
//!   missing value instead.

use thiserror::Error;

use crate::Real;

/// The top-level error type used throughout hestoncal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// General runtime error.
    #[error("{0}")]
    Runtime(String),

    /// Precondition violated.
    #[error("precondition not satisfied: {0}")]
    Precondition(String),

    /// Postcondition violated.
    #[error("postcondition not satisfied: {0}")]
    Postcondition(String),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Market data is untrustworthy (parity failure, empty table, bad quote).
    #[error("input inconsistency: {0}")]
    InputInconsistency(String),

    /// A parameter vector left its box bounds.
    #[error("parameter {parameter} = {value} outside bounds [{lower}, {upper}]")]
    BoundsViolation {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// The offending value.
        value: Real,
        /// Lower bound (inclusive).
        lower: Real,
        /// Upper bound (inclusive).
        upper: Real,
    },

    /// A numerical routine failed for a single point (no root, no convergence).
    #[error("numerical error: {0}")]
    Numerical(String),
}

impl Error {
    /// `true` for errors that must abort a calibration run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Numerical(_))
    }
}

/// Shorthand `Result` type used throughout hestoncal.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Returns `Err(Error::Precondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use hcal_core::{ensure, errors::Error};
/// fn positive(x: f64) -> hcal_core::errors::Result<f64> {
///     ensure!(x > 0.0, "x must be positive, got {x}");
///     Ok(x)
/// }
/// assert!(positive(1.0).is_ok());
/// assert!(positive(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Precondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Returns `Err(Error::Postcondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use hcal_core::{ensure_post, errors::Error};
/// fn compute(x: f64) -> hcal_core::errors::Result<f64> {
///     let result = x * 2.0;
///     ensure_post!(result > 0.0, "result must be positive, got {result}");
///     Ok(result)
/// }
/// assert!(compute(1.0).is_ok());
/// assert!(compute(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure_post {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Postcondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Returns `Err(Error::Runtime(...))` immediately.
///
/// # Example
/// ```
/// use hcal_core::{fail, errors::Error};
/// fn always_err() -> hcal_core::errors::Result<()> {
///     fail!("something went wrong");
/// }
/// assert!(always_err().is_err());
/// ```
#[macro_export]
macro_rules! fail {
    ($($msg:tt)*) => {
        return Err($crate::errors::Error::Runtime(format!($($msg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_violation_display() {
        let err = Error::BoundsViolation {
            parameter: "rho",
            value: 0.5,
            lower: -0.9,
            upper: 0.1,
        };
        let msg = format!("{err}");
        assert!(msg.contains("rho"));
        assert!(msg.contains("0.5"));
    }

    #[test]
    fn fatality() {
        assert!(Error::InputInconsistency("empty".into()).is_fatal());
        assert!(!Error::Numerical("no root".into()).is_fatal());
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
