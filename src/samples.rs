use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::errors::{LeeaError, LeeaResult};
use crate::tensor::Tensor;

/// Produces mini-batches of training samples.
pub trait SampleSource {
    type Sample;

    /// Returns the next mini-batch. The returned slice is owned by the
    /// source and must not be held across calls.
    fn mini_batch(&mut self) -> LeeaResult<&[Self::Sample]>;
}

/// Cycles through an owned sample list, reshuffling whenever the cursor
/// wraps, so every epoch visits each sample exactly once.
pub struct CycleSampleSource<S> {
    samples: Vec<S>,
    batch_size: usize,
    cursor: usize,
    rng: StdRng,
}

impl<S> CycleSampleSource<S> {
    pub fn new(samples: Vec<S>, batch_size: usize, rng: StdRng) -> Self {
        Self { samples, batch_size, cursor: 0, rng }
    }
}

impl<S> SampleSource for CycleSampleSource<S> {
    type Sample = S;

    fn mini_batch(&mut self) -> LeeaResult<&[S]> {
        if self.batch_size > self.samples.len() {
            return Err(LeeaError::BatchTooLarge {
                batch: self.batch_size,
                samples: self.samples.len(),
            });
        }
        if self.cursor == 0 || self.cursor + self.batch_size > self.samples.len() {
            self.samples.shuffle(&mut self.rng);
            self.cursor = 0;
        }
        let lo = self.cursor;
        self.cursor += self.batch_size;
        Ok(&self.samples[lo..lo + self.batch_size])
    }
}

/// Turns a mini-batch of samples into whatever batch object the evaluator
/// consumes. May fail with an I/O-style error, which propagates out of
/// `Trainer::evolve` unchanged.
pub trait Fetcher<S, B> {
    fn fetch(&self, samples: &[S]) -> LeeaResult<B>;
}

/// Adapts a plain closure into a [`Fetcher`].
pub struct FnFetcher<F>(pub F);

impl<S, B, F> Fetcher<S, B> for FnFetcher<F>
where
    F: Fn(&[S]) -> LeeaResult<B>,
{
    fn fetch(&self, samples: &[S]) -> LeeaResult<B> {
        (self.0)(samples)
    }
}

/// One supervised training example.
#[derive(Clone, Debug)]
pub struct LabeledSample {
    pub input: Vec<f32>,
    pub target: Vec<f32>,
}

/// A stacked supervised batch: row `i` of both tensors belongs to sample `i`.
#[derive(Clone, Debug)]
pub struct LabeledBatch {
    pub inputs: Tensor,
    pub targets: Tensor,
}

impl LabeledBatch {
    pub fn len(&self) -> usize {
        self.inputs.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stacks `LabeledSample`s row-wise into a `LabeledBatch`.
pub struct StackFetcher;

impl Fetcher<LabeledSample, LabeledBatch> for StackFetcher {
    fn fetch(&self, samples: &[LabeledSample]) -> LeeaResult<LabeledBatch> {
        let first = samples
            .first()
            .ok_or_else(|| LeeaError::Fetch("empty sample list".into()))?;
        let in_len = first.input.len();
        let out_len = first.target.len();
        let mut inputs = Array2::<f32>::zeros((samples.len(), in_len));
        let mut targets = Array2::<f32>::zeros((samples.len(), out_len));
        for (i, s) in samples.iter().enumerate() {
            if s.input.len() != in_len || s.target.len() != out_len {
                return Err(LeeaError::Fetch(format!("ragged sample at index {i}")));
            }
            inputs.row_mut(i).assign(&ArrayView1::from(&s.input[..]));
            targets.row_mut(i).assign(&ArrayView1::from(&s.target[..]));
        }
        Ok(LabeledBatch {
            inputs: inputs.into_dyn().into(),
            targets: targets.into_dyn().into(),
        })
    }
}
