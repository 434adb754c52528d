//! Limited-evaluation evolutionary training for parameterized prediction
//! models.
//!
//! Instead of gradient descent, a [`Trainer`] keeps a population of
//! candidate parameter vectors, scores each on one mini-batch per
//! generation, and accumulates those scores into a decayed running fitness.
//! Each generation then applies selection, survivor cloning, cross-over,
//! weight decay and mutation.

pub mod cross;
pub mod entity;
pub mod errors;
pub mod eval;
mod interrupt;
pub mod loss;
pub mod mutate;
pub mod nn;
pub mod noise;
pub mod samples;
pub mod schedule;
pub mod select;
pub mod tensor;
pub mod trainer;

pub use cross::{BasicCrosser, Crosser, NeuronalCrosser};
pub use entity::{Entity, FitEntity, Structure};
pub use errors::{LeeaError, LeeaResult};
pub use eval::{Evaluator, FnEvaluator, InvCost, NegMeanCost};
pub use loss::{CrossEntropy, Loss, Mse};
pub use mutate::{AddMutator, Mutator, SetMutator};
pub use noise::Noise;
pub use samples::{
    CycleSampleSource, Fetcher, FnFetcher, LabeledBatch, LabeledSample, SampleSource,
    StackFetcher,
};
pub use schedule::{DecaySchedule, ExpSchedule, Schedule};
pub use select::{RouletteWheel, Selector, SortSelector, TournamentSelector};
pub use tensor::Tensor;
pub use trainer::Trainer;
