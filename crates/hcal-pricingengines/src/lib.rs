//! # hcal-pricingengines
//!
//! Pricing engines for European options.
//!
//! ## Engines
//!
//! - [`black_scholes_merton`]: closed-form Black-Scholes-Merton price and vega,
//!   with [`implied_volatility`] inversion
//! - [`AnalyticHestonEngine`]: semi-analytic Heston engine (Lewis integral,
//!   Gauss-Legendre quadrature) behind the batched [`HestonPricer`] trait

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod analytic_european_engine;
pub mod analytic_heston_engine;
pub mod market_params;

pub use analytic_european_engine::{
    black_scholes_merton, black_scholes_price, black_scholes_vega, implied_volatility,
};
pub use analytic_heston_engine::{AnalyticHestonEngine, HestonPricer, DEFAULT_INTEGRATION_ORDER};
pub use market_params::MarketParams;
