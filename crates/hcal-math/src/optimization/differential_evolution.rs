//! Differential Evolution global optimizer.
//!
//! `best1bin` strategy with dithered mutation, Latin-hypercube initialization
//! and deferred updating: every trial vector of a generation is built from a
//! single seeded Mersenne Twister stream before any of them is scored, so the
//! optimizer is deterministic for a given seed whatever the worker count.

use rayon::prelude::*;

use crate::array::Array;
use crate::optimization::{
    sanitize, BoxConstraint, CostFunction, EndCriteriaType, GlobalOptimizer, IterationInfo,
    IterationObserver, OptimizationResult,
};
use crate::random_numbers::MersenneTwisterUniformRng;
use hcal_core::{
    ensure,
    errors::{Error, Result},
    Real,
};

/// Differential Evolution (`best1bin`).
///
/// Mutant: `best + F · (x_r1 − x_r2)` with `F` drawn uniformly from the
/// dither interval once per generation; binomial crossover with probability
/// `CR` and one forced component. Trial components that leave the box are
/// re-drawn uniformly inside it.
#[derive(Debug, Clone)]
pub struct DifferentialEvolution {
    population_multiplier: usize,
    mutation: (Real, Real),
    crossover_probability: Real,
    max_generations: usize,
    tolerance: Real,
    absolute_tolerance: Real,
    seed: u64,
    workers: usize,
}

impl DifferentialEvolution {
    /// Create an optimizer with the default settings: population 10 × dimension,
    /// mutation dithered in `[0.3, 0.8)`, crossover 0.9, 100 generations,
    /// `tol = 1e-12`, `atol = 1e-6`, seed 7, one worker.
    pub fn new() -> Self {
        Self {
            population_multiplier: 10,
            mutation: (0.3, 0.8),
            crossover_probability: 0.9,
            max_generations: 100,
            tolerance: 1e-12,
            absolute_tolerance: 1e-6,
            seed: 7,
            workers: 1,
        }
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Population size as a multiple of the problem dimension.
    pub fn with_population_multiplier(mut self, multiplier: usize) -> Self {
        self.population_multiplier = multiplier;
        self
    }

    /// Dither interval for the differential weight `F`. A degenerate
    /// interval gives a constant weight.
    pub fn with_mutation(mut self, low: Real, high: Real) -> Self {
        self.mutation = (low, high);
        self
    }

    /// Crossover probability `CR`.
    pub fn with_crossover_probability(mut self, cr: Real) -> Self {
        self.crossover_probability = cr;
        self
    }

    /// Maximum number of generations.
    pub fn with_max_generations(mut self, generations: usize) -> Self {
        self.max_generations = generations;
        self
    }

    /// Relative and absolute tolerances of the population convergence test
    /// `std(E) ≤ atol + tol · |mean(E)|`.
    pub fn with_tolerances(mut self, tol: Real, atol: Real) -> Self {
        self.tolerance = tol;
        self.absolute_tolerance = atol;
        self
    }

    /// Number of threads scoring candidates. `1` scores sequentially.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Configured seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Configured worker count.
    pub fn workers(&self) -> usize {
        self.workers
    }

    fn validate(&self, bounds: &BoxConstraint) -> Result<()> {
        ensure!(bounds.size() > 0, "differential evolution needs at least one parameter");
        ensure!(self.workers >= 1, "worker count must be positive");
        ensure!(
            self.mutation.0 >= 0.0 && self.mutation.0 <= self.mutation.1 && self.mutation.1 <= 2.0,
            "mutation interval [{}, {}] must lie in [0, 2]",
            self.mutation.0,
            self.mutation.1
        );
        ensure!(
            (0.0..=1.0).contains(&self.crossover_probability),
            "crossover probability {} outside [0, 1]",
            self.crossover_probability
        );
        Ok(())
    }

    fn latin_hypercube(
        &self,
        rng: &mut MersenneTwisterUniformRng,
        bounds: &BoxConstraint,
        np: usize,
    ) -> Vec<Array> {
        let n = bounds.size();
        let mut population = vec![Array::zeros(n); np];
        let mut column: Vec<Real> = Vec::with_capacity(np);
        for j in 0..n {
            column.clear();
            column.extend((0..np).map(|i| (i as Real + rng.next_real()) / np as Real));
            rng.shuffle(&mut column);
            let (lo, hi) = (bounds.lower()[j], bounds.upper()[j]);
            for (member, &u) in population.iter_mut().zip(column.iter()) {
                member[j] = lo + u * (hi - lo);
            }
        }
        population
    }

    fn score(&self, cost: &dyn CostFunction, candidates: &[Array]) -> Result<Vec<Real>> {
        if self.workers == 1 {
            return candidates
                .iter()
                .map(|x| cost.value(x).map(sanitize))
                .collect();
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| Error::Runtime(format!("cannot build worker pool: {e}")))?;
        pool.install(|| {
            candidates
                .par_iter()
                .map(|x| cost.value(x).map(sanitize))
                .collect()
        })
    }

    fn trial(
        &self,
        rng: &mut MersenneTwisterUniformRng,
        population: &[Array],
        best: usize,
        target: usize,
        f: Real,
        bounds: &BoxConstraint,
    ) -> Array {
        let np = population.len();
        let n = bounds.size();

        let mut r1 = rng.next_index(np);
        while r1 == target {
            r1 = rng.next_index(np);
        }
        let mut r2 = rng.next_index(np);
        while r2 == target || r2 == r1 {
            r2 = rng.next_index(np);
        }

        let mut trial = population[target].clone();
        let j_rand = rng.next_index(n);
        for j in 0..n {
            if j == j_rand || rng.next_real() < self.crossover_probability {
                trial[j] = population[best][j] + f * (population[r1][j] - population[r2][j]);
            }
        }
        for j in 0..n {
            let (lo, hi) = (bounds.lower()[j], bounds.upper()[j]);
            if !(trial[j] >= lo && trial[j] <= hi) {
                trial[j] = rng.next_in(lo, hi);
            }
        }
        trial
    }
}

impl Default for DifferentialEvolution {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalOptimizer for DifferentialEvolution {
    fn minimize(
        &self,
        cost: &dyn CostFunction,
        bounds: &BoxConstraint,
        observer: &mut dyn IterationObserver,
    ) -> Result<OptimizationResult> {
        self.validate(bounds)?;
        let n = bounds.size();
        let np = (self.population_multiplier * n).max(5);
        let mut rng = MersenneTwisterUniformRng::new(self.seed);

        let mut population = self.latin_hypercube(&mut rng, bounds, np);
        let mut energies = self.score(cost, &population)?;
        let mut evaluations = np;
        let mut best = argmin(&energies);

        for generation in 1..=self.max_generations {
            let f = if self.mutation.0 < self.mutation.1 {
                rng.next_in(self.mutation.0, self.mutation.1)
            } else {
                self.mutation.0
            };
            let trials: Vec<Array> = (0..np)
                .map(|i| self.trial(&mut rng, &population, best, i, f, bounds))
                .collect();
            let trial_energies = self.score(cost, &trials)?;
            evaluations += np;

            for (i, (trial, energy)) in trials.into_iter().zip(trial_energies).enumerate() {
                if energy <= energies[i] {
                    population[i] = trial;
                    energies[i] = energy;
                }
            }
            best = argmin(&energies);

            let spread = population_spread(&energies);
            let info = IterationInfo {
                iteration: generation,
                x: &population[best],
                value: energies[best],
                convergence: Some(spread.std / spread.mean.abs().max(Real::MIN_POSITIVE)),
            };
            if observer.on_iteration(&info)?.is_break() {
                return Ok(self.finish(
                    &population,
                    &energies,
                    best,
                    generation,
                    evaluations,
                    EndCriteriaType::ObserverStop,
                ));
            }
            if spread.std <= self.absolute_tolerance + self.tolerance * spread.mean.abs() {
                return Ok(self.finish(
                    &population,
                    &energies,
                    best,
                    generation,
                    evaluations,
                    EndCriteriaType::PopulationConvergence,
                ));
            }
        }

        Ok(self.finish(
            &population,
            &energies,
            best,
            self.max_generations,
            evaluations,
            EndCriteriaType::MaxIterations,
        ))
    }
}

impl DifferentialEvolution {
    fn finish(
        &self,
        population: &[Array],
        energies: &[Real],
        best: usize,
        iterations: usize,
        evaluations: usize,
        end_type: EndCriteriaType,
    ) -> OptimizationResult {
        OptimizationResult {
            x: population[best].clone(),
            value: energies[best],
            iterations,
            evaluations,
            end_type,
        }
    }
}

struct Spread {
    mean: Real,
    std: Real,
}

fn population_spread(energies: &[Real]) -> Spread {
    let n = energies.len() as Real;
    let mean = energies.iter().sum::<Real>() / n;
    let var = energies.iter().map(|e| (e - mean).powi(2)).sum::<Real>() / n;
    Spread {
        mean,
        std: var.sqrt(),
    }
}

// First index of the minimum; energies are NaN-free.
fn argmin(energies: &[Real]) -> usize {
    let mut best = 0;
    for (i, &e) in energies.iter().enumerate().skip(1) {
        if e < energies[best] {
            best = i;
        }
    }
    best
}
