//! Evolves a tiny feed-forward network to solve XOR and saves the best
//! individual as JSON. Ctrl-C stops cleanly at a generation boundary.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use leea::nn::{Activation, Dense, Layer, Network};
use leea::{
    AddMutator, CycleSampleSource, ExpSchedule, Fetcher, FitEntity, LabeledSample, NegMeanCost,
    NeuronalCrosser, Noise, StackFetcher, TournamentSelector, Trainer,
};

const POP_SIZE: usize = 64;
const GENERATIONS: usize = 2_000;

fn xor_samples() -> Vec<LabeledSample> {
    vec![
        LabeledSample { input: vec![0.0, 0.0], target: vec![0.0] },
        LabeledSample { input: vec![0.0, 1.0], target: vec![1.0] },
        LabeledSample { input: vec![1.0, 0.0], target: vec![1.0] },
        LabeledSample { input: vec![1.0, 1.0], target: vec![0.0] },
    ]
}

fn build_net(rng: &mut StdRng) -> Network {
    Network::new(vec![
        Layer::Dense(Dense::random(2, 8, rng)),
        Layer::Activation(Activation::Tanh),
        Layer::Dense(Dense::random(8, 1, rng)),
        Layer::Activation(Activation::Sigmoid),
    ])
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    info!("initializing population of {POP_SIZE}");
    let mut rng = StdRng::seed_from_u64(42);
    let population: Vec<FitEntity<Network>> =
        (0..POP_SIZE).map(|_| FitEntity::new(build_net(&mut rng))).collect();

    let mut trainer = Trainer::new(
        Box::new(NegMeanCost { cost: leea::loss::Mse }),
        Box::new(CycleSampleSource::new(xor_samples(), 4, StdRng::seed_from_u64(7))),
        Box::new(StackFetcher),
        Box::new(TournamentSelector::new(4, 0.8)),
        Box::new(NeuronalCrosser),
        Box::new(AddMutator {
            stddev: Arc::new(ExpSchedule { baseline: 0.003, init: 0.08, decay_rate: 0.999 }),
            noise: Noise::Gaussian,
        }),
        Arc::new(ExpSchedule { baseline: 0.0, init: 0.3, decay_rate: 0.999 }),
    )
    .population(population)
    .inheritance(0.95)
    .survival_ratio(0.3)
    .elitism(2)
    .seed(1234);

    info!("training for up to {GENERATIONS} generations");
    trainer.evolve(|t| {
        if t.generation % 50 == 0 {
            info!(
                generation = t.generation,
                best = t.max_fitness() / t.fitness_scale(),
                mean = t.mean_fitness() / t.fitness_scale(),
                "progress"
            );
        }
        t.generation < GENERATIONS
    })?;

    let best = trainer.best_entity().ok_or_else(|| anyhow!("empty population"))?;
    info!(fitness = best.fitness / trainer.fitness_scale(), "final best");

    let batch = StackFetcher.fetch(&xor_samples())?;
    let predictions = best.entity.forward(&batch.inputs)?;
    for (sample, prediction) in xor_samples().iter().zip(predictions.iter()) {
        info!(
            "{:?} -> {prediction:.3} (want {})",
            sample.input, sample.target[0]
        );
    }

    let json = serde_json::to_string_pretty(&best.entity)?;
    std::fs::write("xor_best.json", json)?;
    info!("wrote best network to xor_best.json");
    Ok(())
}
