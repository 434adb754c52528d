//! Regression demo: evolves a network to fit `sin(x)` using roulette
//! selection over reciprocal-cost fitness, additive logistic mutation
//! noise, and an analytically derived weight-decay schedule.

use std::f32::consts::PI;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use leea::nn::{Activation, Dense, Layer, Network};
use leea::{
    AddMutator, CycleSampleSource, DecaySchedule, ExpSchedule, Fetcher, FitEntity, InvCost,
    LabeledSample, NeuronalCrosser, Noise, RouletteWheel, StackFetcher, Trainer,
};

const POP_SIZE: usize = 96;
const GENERATIONS: usize = 800;

fn sine_samples(count: usize, rng: &mut StdRng) -> Vec<LabeledSample> {
    (0..count)
        .map(|_| {
            let x: f32 = rng.gen_range(-PI..PI);
            LabeledSample { input: vec![x], target: vec![x.sin()] }
        })
        .collect()
}

fn build_net(rng: &mut StdRng) -> Network {
    Network::new(vec![
        Layer::Dense(Dense::random(1, 16, rng)),
        Layer::Activation(Activation::Tanh),
        Layer::Dense(Dense::random(16, 16, rng)),
        Layer::Activation(Activation::Tanh),
        Layer::Dense(Dense::random(16, 1, rng)),
    ])
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let mut rng = StdRng::seed_from_u64(2024);
    let samples = sine_samples(256, &mut rng);
    let population: Vec<FitEntity<Network>> =
        (0..POP_SIZE).map(|_| FitEntity::new(build_net(&mut rng))).collect();

    // The decay schedule shares the mutation-stddev schedule and solves for
    // the rate whose stationary weight stddev is `target`, so both have to
    // speak the same units.
    let mutation = Arc::new(ExpSchedule { baseline: 0.01, init: 0.09, decay_rate: 0.997 });
    let mut trainer = Trainer::new(
        Box::new(InvCost { cost: leea::loss::Mse }),
        Box::new(CycleSampleSource::new(samples.clone(), 32, StdRng::seed_from_u64(9))),
        Box::new(StackFetcher),
        Box::new(RouletteWheel::new(0.2)),
        Box::new(NeuronalCrosser),
        Box::new(AddMutator { stddev: mutation.clone(), noise: Noise::Logistic }),
        Arc::new(ExpSchedule { baseline: 0.0, init: 0.2, decay_rate: 0.998 }),
    )
    .population(population)
    .inheritance(0.9)
    .survival_ratio(0.25)
    .elitism(1)
    .decay_schedule(Arc::new(DecaySchedule { mutation, target: 0.5 }))
    .seed(4321);

    trainer.evolve(|t| {
        if t.generation % 100 == 0 {
            info!(
                generation = t.generation,
                best = t.max_fitness() / t.fitness_scale(),
                "progress"
            );
        }
        t.generation < GENERATIONS
    })?;

    let best = trainer.best_entity().ok_or_else(|| anyhow!("empty population"))?;
    let batch = StackFetcher.fetch(&samples)?;
    let predictions = best.entity.forward(&batch.inputs)?;
    let mean_abs_err: f32 = predictions
        .iter()
        .zip(batch.targets.iter())
        .map(|(p, t)| (p - t).abs())
        .sum::<f32>()
        / samples.len() as f32;
    info!(mean_abs_err, "final fit quality");
    Ok(())
}
