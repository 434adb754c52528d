use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use tracing::debug;

use crate::cross::Crosser;
use crate::entity::{Entity, FitEntity};
use crate::errors::{LeeaError, LeeaResult};
use crate::eval::Evaluator;
use crate::interrupt;
use crate::mutate::Mutator;
use crate::samples::{Fetcher, SampleSource};
use crate::schedule::Schedule;
use crate::select::Selector;

pub const DEFAULT_SURVIVAL_RATIO: f64 = 0.5;

/// Geometric-series normalizer for accumulated, exponentially decayed
/// fitness: how many past generations effectively contribute at generation
/// `generation` under the given inheritance rate.
pub fn fitness_scale(generation: usize, inheritance: f64) -> f64 {
    if generation < 2 {
        return 1.0;
    }
    if inheritance == 1.0 {
        return (generation - 1) as f64;
    }
    if inheritance.powf((generation - 1) as f64) < f64::EPSILON {
        return 1.0 / (1.0 - inheritance);
    }
    let mut scale = 1.0;
    for _ in 1..generation {
        scale = scale * inheritance + 1.0;
    }
    scale
}

/// Evolves a population of parameterized entities with limited-evaluation
/// fitness: every generation scores each individual on one mini-batch and
/// folds the score into a decayed running total, then applies selection,
/// survivor cloning, cross-over, weight decay and mutation.
pub struct Trainer<E, S, B> {
    pub evaluator: Box<dyn Evaluator<E, B>>,
    pub samples: Box<dyn SampleSource<Sample = S>>,
    pub fetcher: Box<dyn Fetcher<S, B>>,
    pub population: Vec<FitEntity<E>>,
    pub selector: Box<dyn Selector<E>>,
    pub crosser: Box<dyn Crosser<E>>,
    pub mutator: Box<dyn Mutator<E>>,

    /// Keep-probability source for cross-over: `keep = 1 - value_at(t)`.
    pub cross_over_schedule: Arc<dyn Schedule>,

    /// Optional weight-decay rate applied to non-elites before mutation.
    pub decay_schedule: Option<Arc<dyn Schedule>>,

    /// Fraction of an individual's previous fitness carried into the next
    /// generation, in `[0, 1]`.
    pub inheritance: f64,

    /// Fraction of the population that survives selection; `0` selects
    /// [`DEFAULT_SURVIVAL_RATIO`].
    pub survival_ratio: f64,

    /// Number of top individuals exempt from overwrite, cross-over
    /// destination and mutation each generation.
    pub elitism: usize,

    /// 0-based generation counter, incremented after every completed step.
    pub generation: usize,

    pub rng: StdRng,
}

impl<E: Entity, S, B> Trainer<E, S, B> {
    pub fn new(
        evaluator: Box<dyn Evaluator<E, B>>,
        samples: Box<dyn SampleSource<Sample = S>>,
        fetcher: Box<dyn Fetcher<S, B>>,
        selector: Box<dyn Selector<E>>,
        crosser: Box<dyn Crosser<E>>,
        mutator: Box<dyn Mutator<E>>,
        cross_over_schedule: Arc<dyn Schedule>,
    ) -> Self {
        Self {
            evaluator,
            samples,
            fetcher,
            selector,
            crosser,
            mutator,
            cross_over_schedule,
            population: Vec::new(),
            decay_schedule: None,
            inheritance: 0.0,
            survival_ratio: 0.0,
            elitism: 0,
            generation: 0,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn population(mut self, population: Vec<FitEntity<E>>) -> Self {
        self.population = population;
        self
    }

    pub fn inheritance(mut self, inheritance: f64) -> Self {
        self.inheritance = inheritance;
        self
    }

    pub fn survival_ratio(mut self, survival_ratio: f64) -> Self {
        self.survival_ratio = survival_ratio;
        self
    }

    pub fn elitism(mut self, elitism: usize) -> Self {
        self.elitism = elitism;
        self
    }

    pub fn decay_schedule(mut self, schedule: Arc<dyn Schedule>) -> Self {
        self.decay_schedule = Some(schedule);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Maximum fitness in the current population, `0` if it is empty.
    pub fn max_fitness(&self) -> f64 {
        self.best_entity().map(|e| e.fitness).unwrap_or(0.0)
    }

    pub fn mean_fitness(&self) -> f64 {
        if self.population.is_empty() {
            return 0.0;
        }
        self.population.iter().map(|e| e.fitness).sum::<f64>() / self.population.len() as f64
    }

    pub fn best_entity(&self) -> Option<&FitEntity<E>> {
        self.population.iter().max_by(|a, b| a.fitness.total_cmp(&b.fitness))
    }

    /// The fitness normalizer for the current generation; divide reported
    /// fitness by this to compare against single-evaluation scores.
    pub fn fitness_scale(&self) -> f64 {
        fitness_scale(self.generation, self.inheritance)
    }

    fn validate(&self) -> LeeaResult<()> {
        if self.population.is_empty() {
            return Err(LeeaError::EmptyPopulation);
        }
        if !(0.0..=1.0).contains(&self.inheritance) {
            return Err(LeeaError::InvalidConfig(format!(
                "inheritance {} must lie in [0, 1]",
                self.inheritance
            )));
        }
        if !(0.0..=1.0).contains(&self.survival_ratio) {
            return Err(LeeaError::InvalidConfig(format!(
                "survival ratio {} must lie in (0, 1]; 0 selects the default",
                self.survival_ratio
            )));
        }
        if self.elitism >= self.population.len() {
            return Err(LeeaError::InvalidConfig(format!(
                "elitism {} must be smaller than the population ({})",
                self.elitism,
                self.population.len()
            )));
        }
        Ok(())
    }

    fn survivor_count(&self) -> usize {
        let ratio = if self.survival_ratio == 0.0 {
            DEFAULT_SURVIVAL_RATIO
        } else {
            self.survival_ratio
        };
        let count = (ratio * self.population.len() as f64 + 0.5) as usize;
        count.max(1)
    }

    /// Runs evolution until the callback returns `false`, an interrupt is
    /// caught, or a generation fails.
    ///
    /// The callback runs before every generation. Sample/fetch errors
    /// propagate out unchanged; the first Ctrl-C stops at the next
    /// generation boundary and the second aborts the process.
    pub fn evolve<F>(&mut self, mut f: F) -> LeeaResult<()>
    where
        F: FnMut(&Self) -> bool,
    {
        let stop = interrupt::install()?;
        loop {
            if stop.requested() {
                return Ok(());
            }
            if !f(self) {
                return Ok(());
            }
            if stop.requested() {
                return Ok(());
            }
            self.generation_step()?;
        }
    }

    /// One full generation: evaluate and accumulate fitness, reorder by
    /// selection, overwrite the dead with survivor clones, pair-wise
    /// cross-over, then decay and mutate all non-elites.
    #[tracing::instrument(skip(self), name = "generation", fields(t = self.generation))]
    pub fn generation_step(&mut self) -> LeeaResult<()> {
        self.validate()?;

        let samples = self.samples.mini_batch()?;
        let batch = self.fetcher.fetch(samples)?;

        for fe in &mut self.population {
            fe.fitness =
                fe.fitness * self.inheritance + self.evaluator.evaluate(&fe.entity, &batch)?;
        }

        // Elites move to the front; everyone else is re-ordered by the
        // selector into a fitness-weighted permutation.
        if self.elitism > 0 {
            self.population.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        }
        let scale = self.fitness_scale();
        let tail = self.population.split_off(self.elitism);
        let refill = tail.len();
        self.selector.set_entities(tail, scale)?;
        for _ in 0..refill {
            let selected = self.selector.select(&mut self.rng)?;
            self.population.push(selected);
        }

        // Overwrite the dead with clones of uniformly drawn survivors.
        // Elites are never a destination, even if the survivor cut is
        // smaller than the elite count.
        let pop_len = self.population.len();
        let survivors = self.survivor_count();
        for i in survivors.max(self.elitism)..pop_len {
            let j = self.rng.gen_range(0..survivors);
            let (dest, src) = pair_mut(&mut self.population, i, j);
            dest.entity.set_from(&src.entity)?;
            dest.fitness = src.fitness;
        }

        // Pair-wise cross-over along a random permutation. Each position is
        // a destination at most once; donors stay eligible, so one entity
        // may donate to several peers.
        let mut ordering: Vec<usize> = (0..pop_len).collect();
        ordering.shuffle(&mut self.rng);
        let keep = (1.0 - self.cross_over_schedule.value_at(self.generation)).clamp(0.0, 1.0);
        for i in 0..pop_len.saturating_sub(1) {
            let a = ordering[i];
            if a < self.elitism {
                continue;
            }
            let b = ordering[self.rng.gen_range(i + 1..pop_len)];
            let (dest, src) = pair_mut(&mut self.population, a, b);
            dest.fitness = keep * dest.fitness + (1.0 - keep) * src.fitness;
            self.crosser.cross(&mut dest.entity, &src.entity, keep, &mut self.rng)?;
        }

        // Decay and mutate every non-elite, data-parallel with one RNG per
        // entity.
        let decay = self
            .decay_schedule
            .as_ref()
            .map(|s| s.value_at(self.generation))
            .unwrap_or(0.0);
        let t = self.generation;
        let base_seed: u64 = self.rng.gen();
        let mutator = self.mutator.as_ref();
        let non_elites = &mut self.population[self.elitism..];

        #[cfg(feature = "rayon")]
        non_elites.par_iter_mut().enumerate().try_for_each(|(i, fe)| {
            let mut rng = StdRng::seed_from_u64(worker_seed(base_seed, i));
            if decay != 0.0 {
                fe.entity.decay(decay);
            }
            mutator.mutate(t, &mut fe.entity, &mut rng)
        })?;

        #[cfg(not(feature = "rayon"))]
        for (i, fe) in non_elites.iter_mut().enumerate() {
            let mut rng = StdRng::seed_from_u64(worker_seed(base_seed, i));
            if decay != 0.0 {
                fe.entity.decay(decay);
            }
            mutator.mutate(t, &mut fe.entity, &mut rng)?;
        }

        self.generation += 1;
        debug!(
            generation = self.generation,
            max_fitness = self.max_fitness(),
            mean_fitness = self.mean_fitness(),
            "generation complete"
        );
        Ok(())
    }
}

fn worker_seed(base: u64, index: usize) -> u64 {
    base ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Disjoint mutable/shared access to two population slots.
fn pair_mut<T>(slice: &mut [T], a: usize, b: usize) -> (&mut T, &T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = slice.split_at_mut(b);
        (&mut lo[a], &hi[0])
    } else {
        let (lo, hi) = slice.split_at_mut(a);
        (&mut hi[0], &lo[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fitness_scale_closed_form() {
        // Scale used by the fifth generation step (counter at 4).
        let scale = fitness_scale(4, 0.9);
        assert!((scale - (1.0 + 0.9 + 0.81 + 0.729)).abs() < 1e-9);
    }

    #[test]
    fn fitness_scale_matches_geometric_sum() {
        for &inheritance in &[0.5f64, 0.9] {
            for t in 1..12usize {
                let expected: f64 = (0..t).map(|k| inheritance.powi(k as i32)).sum();
                let got = fitness_scale(t, inheritance);
                assert!(
                    (got - expected).abs() < 1e-9,
                    "t={t} inheritance={inheritance}: {got} vs {expected}"
                );
            }
        }
    }

    #[test]
    fn fitness_scale_full_inheritance_counts_generations() {
        assert_eq!(fitness_scale(5, 1.0), 4.0);
        assert_eq!(fitness_scale(1, 1.0), 1.0);
    }

    #[test]
    fn fitness_scale_underflow_uses_the_limit() {
        let scale = fitness_scale(200, 0.5);
        assert!((scale - 2.0).abs() < 1e-9);
    }

    #[test]
    fn pair_mut_returns_disjoint_slots() {
        let mut v = vec![10, 20, 30, 40];
        {
            let (a, b) = pair_mut(&mut v, 3, 1);
            *a += *b;
        }
        assert_eq!(v, vec![10, 20, 30, 60]);
        {
            let (a, b) = pair_mut(&mut v, 0, 2);
            *a = *b;
        }
        assert_eq!(v, vec![30, 20, 30, 60]);
    }
}
