use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;

use crate::entity::FitEntity;
use crate::errors::{LeeaError, LeeaResult};

/// Chooses individuals by fitness, without replacement.
///
/// Used per generation as `set_entities(pool, scale)` followed by `select()`
/// until the pool is drained. The selector owns its working set; the caller
/// keeps no alias into it.
pub trait Selector<E> {
    fn set_entities(&mut self, entities: Vec<FitEntity<E>>, scale: f64) -> LeeaResult<()>;

    fn select(&mut self, rng: &mut StdRng) -> LeeaResult<FitEntity<E>>;
}

/// Fitness-proportional selection with a temperature.
///
/// The effective weight of fitness `f` is `(f/scale)^(1/temperature)`, or
/// plain `f/scale` when the temperature is 0 or 1. Fitnesses must be
/// non-negative; a negative fitness is a configuration error.
pub struct RouletteWheel<E> {
    pub temperature: f64,
    pool: Vec<FitEntity<E>>,
    weights: Vec<f64>,
    total: f64,
}

impl<E> RouletteWheel<E> {
    pub fn new(temperature: f64) -> Self {
        Self { temperature, pool: Vec::new(), weights: Vec::new(), total: 0.0 }
    }

    fn weight(&self, fitness: f64, scale: f64) -> f64 {
        let normalized = fitness / scale;
        if self.temperature == 0.0 || self.temperature == 1.0 {
            normalized
        } else {
            normalized.powf(1.0 / self.temperature)
        }
    }
}

impl<E> Selector<E> for RouletteWheel<E> {
    fn set_entities(&mut self, entities: Vec<FitEntity<E>>, scale: f64) -> LeeaResult<()> {
        for e in &entities {
            if e.fitness < 0.0 {
                return Err(LeeaError::NegativeFitness(e.fitness));
            }
        }
        self.weights = entities.iter().map(|e| self.weight(e.fitness, scale)).collect();
        self.total = self.weights.iter().sum();
        self.pool = entities;
        Ok(())
    }

    fn select(&mut self, rng: &mut StdRng) -> LeeaResult<FitEntity<E>> {
        if self.pool.is_empty() {
            return Err(LeeaError::EmptySelectionPool);
        }
        let mut num = rng.gen::<f64>() * self.total;
        let mut chosen = self.pool.len() - 1;
        for (i, w) in self.weights.iter().enumerate() {
            num -= w;
            if num < 0.0 {
                chosen = i;
                break;
            }
        }
        let removed = self.weights.swap_remove(chosen);
        let total_before = self.total;
        self.total -= removed;
        // The running total accumulates floating-point drift; recompute once
        // the remaining mass is a tiny fraction of what it was.
        if total_before != 0.0 && (self.total / total_before).abs() < 1e-3 {
            self.total = self.weights.iter().sum();
        }
        Ok(self.pool.swap_remove(chosen))
    }
}

/// Deterministic selection in descending fitness order; ties keep their
/// input order.
pub struct SortSelector<E> {
    pool: VecDeque<FitEntity<E>>,
}

impl<E> SortSelector<E> {
    pub fn new() -> Self {
        Self { pool: VecDeque::new() }
    }
}

impl<E> Default for SortSelector<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Selector<E> for SortSelector<E> {
    fn set_entities(&mut self, mut entities: Vec<FitEntity<E>>, _scale: f64) -> LeeaResult<()> {
        entities.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        self.pool = entities.into();
        Ok(())
    }

    fn select(&mut self, _rng: &mut StdRng) -> LeeaResult<FitEntity<E>> {
        self.pool.pop_front().ok_or(LeeaError::EmptySelectionPool)
    }
}

/// Tournament selection: draw `size` distinct entities, sort them by
/// fitness, then walk the ranking accepting each candidate with probability
/// `prob`; the last candidate is forced.
pub struct TournamentSelector<E> {
    pub size: usize,
    pub prob: f64,
    pool: Vec<FitEntity<E>>,
}

impl<E> TournamentSelector<E> {
    pub fn new(size: usize, prob: f64) -> Self {
        Self { size, prob, pool: Vec::new() }
    }
}

impl<E> Selector<E> for TournamentSelector<E> {
    fn set_entities(&mut self, entities: Vec<FitEntity<E>>, _scale: f64) -> LeeaResult<()> {
        self.pool = entities;
        Ok(())
    }

    fn select(&mut self, rng: &mut StdRng) -> LeeaResult<FitEntity<E>> {
        if self.pool.is_empty() {
            return Err(LeeaError::EmptySelectionPool);
        }
        let k = self.size.min(self.pool.len()).max(1);
        let mut idxs = index::sample(rng, self.pool.len(), k).into_vec();
        idxs.sort_by(|&a, &b| self.pool[b].fitness.total_cmp(&self.pool[a].fitness));
        let mut winner = idxs[k - 1];
        for &i in idxs.iter().take(k - 1) {
            if rng.gen::<f64>() < self.prob {
                winner = i;
                break;
            }
        }
        Ok(self.pool.swap_remove(winner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn fe(fitness: f64) -> FitEntity<usize> {
        FitEntity { entity: fitness as usize, fitness }
    }

    #[test]
    fn low_temperature_roulette_ranks_by_fitness() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut selector = RouletteWheel::new(0.05);
        for _ in 0..10 {
            selector
                .set_entities(
                    vec![
                        fe(1.0),
                        fe(1.5),
                        fe(0.5),
                        fe(10.0),
                        fe(10.0),
                        fe(100.0),
                        fe(1000.0),
                    ],
                    1.0,
                )
                .unwrap();
            let fits: Vec<f64> =
                (0..4).map(|_| selector.select(&mut rng).unwrap().fitness).collect();
            assert_eq!(fits, vec![1000.0, 100.0, 10.0, 10.0]);
        }
    }

    #[test]
    fn roulette_rejects_negative_fitness() {
        let mut selector = RouletteWheel::new(1.0);
        assert!(matches!(
            selector.set_entities(vec![fe(1.0), FitEntity { entity: 0, fitness: -0.5 }], 1.0),
            Err(LeeaError::NegativeFitness(_))
        ));
    }

    #[test]
    fn roulette_drains_without_repeats() {
        let mut rng = StdRng::seed_from_u64(12);
        let mut selector = RouletteWheel::new(1.0);
        selector
            .set_entities((1..=5).map(|i| fe(i as f64)).collect(), 1.0)
            .unwrap();
        let mut seen: Vec<usize> =
            (0..5).map(|_| selector.select(&mut rng).unwrap().entity).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert!(matches!(selector.select(&mut rng), Err(LeeaError::EmptySelectionPool)));
    }

    #[test]
    fn sort_selector_is_descending_with_stable_ties() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut selector = SortSelector::new();
        selector
            .set_entities(
                vec![
                    FitEntity { entity: 0usize, fitness: 1.0 },
                    FitEntity { entity: 1, fitness: 3.0 },
                    FitEntity { entity: 2, fitness: 1.0 },
                ],
                1.0,
            )
            .unwrap();
        let order: Vec<usize> =
            (0..3).map(|_| selector.select(&mut rng).unwrap().entity).collect();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn full_size_tournament_with_certain_prob_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(14);
        let mut selector = TournamentSelector::new(4, 1.0);
        selector
            .set_entities(vec![fe(5.0), fe(1.0), fe(4.0), fe(2.0)], 1.0)
            .unwrap();
        assert_eq!(selector.select(&mut rng).unwrap().fitness, 5.0);
        assert_eq!(selector.select(&mut rng).unwrap().fitness, 4.0);
        assert_eq!(selector.select(&mut rng).unwrap().fitness, 2.0);
        assert_eq!(selector.select(&mut rng).unwrap().fitness, 1.0);
        assert!(selector.select(&mut rng).is_err());
    }
}
