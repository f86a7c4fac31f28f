//! Starting point for the optimizers.

use hcal_core::{errors::Result, Real};
use hcal_models::{HestonParams, ParameterBounds};

use crate::quotes::QuoteTable;

/// Floor on the seeded initial variance.
pub const MIN_SEED_VARIANCE: Real = 1e-6;

const SEED_KAPPA: Real = 3.0;
const SEED_SIGMA: Real = 0.5;
const SEED_RHO: Real = -0.5;

/// Seed a Heston vector from the quote struck closest to spot.
///
/// Initial and long-run variance are the square of that quote's implied
/// volatility; the remaining components are fixed guesses. The vector is
/// clamped into `bounds`, which are returned alongside it.
///
/// # Errors
/// Input inconsistency when the table is empty.
pub fn seed(
    table: &QuoteTable,
    bounds: &ParameterBounds,
) -> Result<(HestonParams, ParameterBounds)> {
    table.ensure_non_empty()?;
    let spot = table.spot();
    // `min_by` keeps the first of equally distant strikes.
    let atm = table
        .quotes()
        .iter()
        .min_by(|a, b| (a.strike - spot).abs().total_cmp(&(b.strike - spot).abs()))
        .map(|q| q.implied_vol)
        .unwrap_or_default();
    let v0 = (atm * atm).max(MIN_SEED_VARIANCE);
    let raw = HestonParams::new(v0, SEED_KAPPA, v0, SEED_SIGMA, SEED_RHO, 0.0);
    Ok((bounds.clamp(&raw), *bounds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::quote_from_implied_vol;
    use approx::assert_relative_eq;
    use hcal_core::errors::Error;

    fn table(rows: &[(Real, Real)]) -> QuoteTable {
        let quotes = rows
            .iter()
            .map(|&(m, iv)| quote_from_implied_vol(100.0, 0.5, m, iv, 0.0, 0.0))
            .collect();
        QuoteTable::new(100.0, None, quotes).unwrap()
    }

    #[test]
    fn seeds_from_the_quote_nearest_spot() {
        let t = table(&[(0.9, 0.30), (1.02, 0.21), (1.1, 0.18)]);
        let (p, b) = seed(&t, &ParameterBounds::default()).unwrap();
        assert_relative_eq!(p.v0, 0.21 * 0.21, epsilon = 1e-15);
        assert_eq!(p.theta, p.v0);
        assert_eq!((p.kappa, p.sigma, p.rho, p.lambda), (3.0, 0.5, -0.5, 0.0));
        assert_eq!(b, ParameterBounds::default());
    }

    #[test]
    fn first_quote_wins_a_tie() {
        let t = table(&[(0.95, 0.25), (1.05, 0.20)]);
        let (p, _) = seed(&t, &ParameterBounds::default()).unwrap();
        assert_relative_eq!(p.v0, 0.0625, epsilon = 1e-15);
    }

    #[test]
    fn seed_is_clamped_into_the_box() {
        let t = table(&[(1.0, 1.5)]);
        let (p, b) = seed(&t, &ParameterBounds::default()).unwrap();
        assert_eq!(p.v0, 1.0);
        assert_eq!(p.theta, 1.0);
        assert!(b.contains(&p));
    }

    #[test]
    fn empty_table_fails() {
        let t = QuoteTable::new(100.0, None, Vec::new()).unwrap();
        assert!(matches!(
            seed(&t, &ParameterBounds::default()),
            Err(Error::InputInconsistency(_))
        ));
    }

    proptest::proptest! {
        #[test]
        fn seed_lies_inside_bounds(
            rows in proptest::collection::vec((0.5f64..1.5, 0.001f64..3.0), 1..12),
            kappa_hi in 0.5f64..5.0,
            v_hi in 0.01f64..1.0,
        ) {
            let t = table(&rows);
            let mut bounds = ParameterBounds::default();
            bounds.upper.kappa = kappa_hi;
            bounds.upper.v0 = v_hi;
            bounds.upper.theta = v_hi;
            let (p, _) = seed(&t, &bounds).unwrap();
            proptest::prop_assert!(bounds.contains(&p));
        }
    }
}
