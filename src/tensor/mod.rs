use ndarray::{ArrayD, IxDyn};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};

use crate::errors::{LeeaError, LeeaResult};

/// An N-dimensional parameter tensor.
///
/// Wraps an `ndarray` array and exposes the flat, in-place operations the
/// evolution pipeline needs: scaling, copying, and row-block copies for
/// structured cross-over.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Tensor {
    pub(crate) data: ArrayD<f32>,
}

impl Tensor {
    pub fn zeros(dims: &[usize]) -> Self {
        ArrayD::zeros(IxDyn(dims)).into()
    }

    /// Gaussian-initialized tensor with the given standard deviation.
    pub fn randn(dims: &[usize], stddev: f32) -> Self {
        (ArrayD::<f32>::random(IxDyn(dims), StandardNormal) * stddev).into()
    }

    /// Like [`Tensor::randn`] but draws from an explicit RNG handle.
    pub fn randn_using<R: rand::Rng + ?Sized>(
        dims: &[usize],
        stddev: f32,
        rng: &mut R,
    ) -> Self {
        (ArrayD::<f32>::random_using(IxDyn(dims), StandardNormal, rng) * stddev).into()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Total number of scalars.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn array(&self) -> &ArrayD<f32> {
        &self.data
    }

    pub fn array_mut(&mut self) -> &mut ArrayD<f32> {
        &mut self.data
    }

    /// Flat view of the scalars in standard layout.
    pub fn as_slice(&self) -> LeeaResult<&[f32]> {
        self.data.as_slice().ok_or_else(|| LeeaError::ShapeMismatch {
            expected: self.shape().to_vec(),
            found: vec![],
        })
    }

    pub fn as_slice_mut(&mut self) -> LeeaResult<&mut [f32]> {
        let shape = self.shape().to_vec();
        self.data
            .as_slice_mut()
            .ok_or(LeeaError::ShapeMismatch { expected: shape, found: vec![] })
    }

    /// In-place multiplication of every scalar by `factor`.
    pub fn scale(&mut self, factor: f32) {
        self.data.mapv_inplace(|x| x * factor);
    }

    /// Copies all scalars from `other`. Shapes must match.
    pub fn copy_from(&mut self, other: &Self) -> LeeaResult<()> {
        if self.shape() != other.shape() {
            return Err(LeeaError::ShapeMismatch {
                expected: self.shape().to_vec(),
                found: other.shape().to_vec(),
            });
        }
        self.data.assign(&other.data);
        Ok(())
    }

    /// Treats both tensors as `mask.len()` rows of `row_len` scalars and
    /// overwrites every row whose mask entry is set with the row from `src`.
    pub fn copy_rows_from(
        &mut self,
        src: &Self,
        mask: &[bool],
        row_len: usize,
    ) -> LeeaResult<()> {
        if self.shape() != src.shape() || mask.len() * row_len != self.len() {
            return Err(LeeaError::ShapeMismatch {
                expected: self.shape().to_vec(),
                found: src.shape().to_vec(),
            });
        }
        let dest = self.as_slice_mut()?;
        let source = src.as_slice()?;
        for (row, take) in mask.iter().enumerate() {
            if *take {
                let lo = row * row_len;
                dest[lo..lo + row_len].copy_from_slice(&source[lo..lo + row_len]);
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> ndarray::iter::Iter<'_, f32, IxDyn> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> ndarray::iter::IterMut<'_, f32, IxDyn> {
        self.data.iter_mut()
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(data: ArrayD<f32>) -> Self {
        Self { data }
    }
}
