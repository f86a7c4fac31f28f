//! Random number generation backed by the `rand_mt` Mersenne Twister.

use hcal_core::Real;
use rand_mt::Mt19937GenRand64;

/// A uniform pseudo-random number generator based on MT19937-64.
///
/// Seeded explicitly so that every stochastic search is reproducible.
pub struct MersenneTwisterUniformRng {
    rng: Mt19937GenRand64,
}

impl MersenneTwisterUniformRng {
    /// Create a new generator with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mt19937GenRand64::new(seed),
        }
    }

    /// Generate the next uniform deviate in `[0, 1)`.
    pub fn next_real(&mut self) -> Real {
        // 53 high bits -> exactly representable doubles in [0, 1)
        (self.rng.next_u64() >> 11) as Real / (1u64 << 53) as Real
    }

    /// Generate a uniform deviate in `[low, high)`.
    pub fn next_in(&mut self, low: Real, high: Real) -> Real {
        low + (high - low) * self.next_real()
    }

    /// Generate a uniform index in `0..n`. `n` must be positive.
    pub fn next_index(&mut self, n: usize) -> usize {
        ((self.next_real() * n as Real) as usize).min(n - 1)
    }

    /// Shuffle `values` in place (Fisher-Yates).
    pub fn shuffle<T>(&mut self, values: &mut [T]) {
        for i in (1..values.len()).rev() {
            let j = self.next_index(i + 1);
            values.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mt_uniform_in_range() {
        let mut rng = MersenneTwisterUniformRng::new(42);
        for _ in 0..1000 {
            let u = rng.next_real();
            assert!((0.0..1.0).contains(&u), "u = {u}");
        }
    }

    #[test]
    fn mt_reproducible() {
        let mut a = MersenneTwisterUniformRng::new(7);
        let mut b = MersenneTwisterUniformRng::new(7);
        for _ in 0..100 {
            assert_eq!(a.next_real(), b.next_real());
        }
    }

    #[test]
    fn mt_mean_close_to_half() {
        let mut rng = MersenneTwisterUniformRng::new(123);
        let n = 10_000;
        let mean: Real = (0..n).map(|_| rng.next_real()).sum::<Real>() / n as Real;
        assert!((mean - 0.5).abs() < 0.02, "mean = {mean}");
    }

    #[test]
    fn shuffle_is_permutation() {
        let mut rng = MersenneTwisterUniformRng::new(5);
        let mut values: Vec<usize> = (0..20).collect();
        rng.shuffle(&mut values);
        let mut sorted = values.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }
}
