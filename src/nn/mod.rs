//! Minimal forward-only network types used as trainable entities.
//!
//! There is no gradient machinery here: parameters only ever change through
//! the evolutionary operators (mutation, cross-over, decay).

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayView4, Axis, Ix1, Ix2, Ix4};
use serde::{Deserialize, Serialize};

use crate::errors::{LeeaError, LeeaResult};
use crate::tensor::Tensor;

fn as_2d(t: &Tensor) -> LeeaResult<ArrayView2<'_, f32>> {
    t.array()
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| LeeaError::ShapeMismatch { expected: vec![0, 0], found: t.shape().to_vec() })
}

fn as_1d(t: &Tensor) -> LeeaResult<ArrayView1<'_, f32>> {
    t.array()
        .view()
        .into_dimensionality::<Ix1>()
        .map_err(|_| LeeaError::ShapeMismatch { expected: vec![0], found: t.shape().to_vec() })
}

fn as_4d(t: &Tensor) -> LeeaResult<ArrayView4<'_, f32>> {
    t.array()
        .view()
        .into_dimensionality::<Ix4>()
        .map_err(|_| LeeaError::ShapeMismatch {
            expected: vec![0, 0, 0, 0],
            found: t.shape().to_vec(),
        })
}

/// Parameterless nonlinearities.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum Activation {
    Tanh,
    Relu,
    Sigmoid,
    LogSoftmax,
}

impl Activation {
    pub fn forward(&self, input: &Tensor) -> Tensor {
        match self {
            Activation::Tanh => input.array().mapv(|x| x.tanh()).into(),
            Activation::Relu => input.array().mapv(|x| if x > 0.0 { x } else { 0.0 }).into(),
            Activation::Sigmoid => input.array().mapv(|x| 1.0 / (1.0 + (-x).exp())).into(),
            Activation::LogSoftmax => {
                let mut out = input.array().clone();
                let last = Axis(out.ndim() - 1);
                for mut lane in out.lanes_mut(last) {
                    let max = lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                    let log_sum =
                        lane.iter().map(|v| (v - max).exp()).sum::<f32>().ln() + max;
                    lane.mapv_inplace(|v| v - log_sum);
                }
                out.into()
            }
        }
    }
}

/// Fully-connected layer. Weights are `[out, in]`, one row per output
/// neuron, so a neuron and its bias share a row index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dense {
    pub weights: Tensor,
    pub biases: Tensor,
}

impl Dense {
    pub fn random<R: rand::Rng + ?Sized>(in_dim: usize, out_dim: usize, rng: &mut R) -> Self {
        let stddev = 1.0 / (in_dim as f32).sqrt();
        Self {
            weights: Tensor::randn_using(&[out_dim, in_dim], stddev, rng),
            biases: Tensor::zeros(&[out_dim]),
        }
    }

    pub fn out_dim(&self) -> usize {
        self.weights.shape()[0]
    }

    /// `input` is `[batch, in]`; returns `[batch, out]`.
    pub fn forward(&self, input: &Tensor) -> LeeaResult<Tensor> {
        let x = as_2d(input)?;
        let w = as_2d(&self.weights)?;
        if x.ncols() != w.ncols() {
            return Err(LeeaError::ShapeMismatch {
                expected: self.weights.shape().to_vec(),
                found: input.shape().to_vec(),
            });
        }
        let b = as_1d(&self.biases)?;
        let mut y = x.dot(&w.t());
        y += &b;
        Ok(y.into_dyn().into())
    }
}

/// Convolutional layer with unit stride and no padding. Filters are
/// `[count, depth, h, w]`, one bias per filter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conv2d {
    pub filters: Tensor,
    pub biases: Tensor,
}

impl Conv2d {
    pub fn random<R: rand::Rng + ?Sized>(
        count: usize,
        depth: usize,
        h: usize,
        w: usize,
        rng: &mut R,
    ) -> Self {
        let stddev = 1.0 / ((depth * h * w) as f32).sqrt();
        Self {
            filters: Tensor::randn_using(&[count, depth, h, w], stddev, rng),
            biases: Tensor::zeros(&[count]),
        }
    }

    pub fn filter_count(&self) -> usize {
        self.filters.shape()[0]
    }

    /// `input` is `[batch, depth, height, width]`.
    pub fn forward(&self, input: &Tensor) -> LeeaResult<Tensor> {
        let x = as_4d(input)?;
        let f = as_4d(&self.filters)?;
        let b = as_1d(&self.biases)?;
        let (batch, depth, in_h, in_w) = x.dim();
        let (count, f_depth, f_h, f_w) = f.dim();
        if depth != f_depth || in_h < f_h || in_w < f_w {
            return Err(LeeaError::ShapeMismatch {
                expected: self.filters.shape().to_vec(),
                found: input.shape().to_vec(),
            });
        }
        let out_h = in_h - f_h + 1;
        let out_w = in_w - f_w + 1;
        let mut out = ndarray::Array4::<f32>::zeros((batch, count, out_h, out_w));
        for n in 0..batch {
            for k in 0..count {
                for oy in 0..out_h {
                    for ox in 0..out_w {
                        let mut acc = b[k];
                        for d in 0..depth {
                            for fy in 0..f_h {
                                for fx in 0..f_w {
                                    acc += x[(n, d, oy + fy, ox + fx)] * f[(k, d, fy, fx)];
                                }
                            }
                        }
                        out[(n, k, oy, ox)] = acc;
                    }
                }
            }
        }
        Ok(out.into_dyn().into())
    }
}

/// One layer of a feed-forward stack.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Layer {
    Dense(Dense),
    Conv(Conv2d),
    Activation(Activation),
}

impl Layer {
    pub fn forward(&self, input: &Tensor) -> LeeaResult<Tensor> {
        match self {
            Layer::Dense(d) => d.forward(input),
            Layer::Conv(c) => c.forward(input),
            Layer::Activation(a) => Ok(a.forward(input)),
        }
    }

    pub(crate) fn parameters(&self) -> Vec<&Tensor> {
        match self {
            Layer::Dense(d) => vec![&d.weights, &d.biases],
            Layer::Conv(c) => vec![&c.filters, &c.biases],
            Layer::Activation(_) => vec![],
        }
    }

    pub(crate) fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        match self {
            Layer::Dense(d) => vec![&mut d.weights, &mut d.biases],
            Layer::Conv(c) => vec![&mut c.filters, &mut c.biases],
            Layer::Activation(_) => vec![],
        }
    }
}

/// A feed-forward network: layers applied in order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<Layer>,
}

impl Network {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self { layers }
    }

    pub fn forward(&self, input: &Tensor) -> LeeaResult<Tensor> {
        let mut current = input.clone();
        for layer in &self.layers {
            current = layer.forward(&current)?;
        }
        Ok(current)
    }
}

/// A vanilla recurrent cell: `state' = tanh(W·x + U·state + b)`.
///
/// `input_weights` is `[hidden, in]`, `state_weights` `[hidden, hidden]`,
/// `biases` `[hidden]`; hidden component `i` owns row `i` of all three.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VanillaRnn {
    pub input_weights: Tensor,
    pub state_weights: Tensor,
    pub biases: Tensor,
}

impl VanillaRnn {
    pub fn random<R: rand::Rng + ?Sized>(in_dim: usize, hidden: usize, rng: &mut R) -> Self {
        let stddev = 1.0 / (in_dim as f32).sqrt();
        Self {
            input_weights: Tensor::randn_using(&[hidden, in_dim], stddev, rng),
            state_weights: Tensor::randn_using(
                &[hidden, hidden],
                1.0 / (hidden as f32).sqrt(),
                rng,
            ),
            biases: Tensor::zeros(&[hidden]),
        }
    }

    pub fn hidden_size(&self) -> usize {
        self.input_weights.shape()[0]
    }

    pub fn step(
        &self,
        input: ArrayView1<'_, f32>,
        state: ArrayView1<'_, f32>,
    ) -> LeeaResult<Array1<f32>> {
        let w = as_2d(&self.input_weights)?;
        let u = as_2d(&self.state_weights)?;
        let b = as_1d(&self.biases)?;
        if w.ncols() != input.len() || u.ncols() != state.len() {
            return Err(LeeaError::ShapeMismatch {
                expected: vec![w.ncols(), u.ncols()],
                found: vec![input.len(), state.len()],
            });
        }
        let mut next = w.dot(&input) + u.dot(&state);
        next += &b;
        next.mapv_inplace(|x| x.tanh());
        Ok(next)
    }
}

/// A stack of recurrent cells followed by a dense read-out.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RnnStack {
    pub cells: Vec<VanillaRnn>,
    pub output: Dense,
}

impl RnnStack {
    pub fn zero_state(&self) -> Vec<Array1<f32>> {
        self.cells.iter().map(|c| Array1::zeros(c.hidden_size())).collect()
    }

    /// Advances every cell by one timestep and returns the read-out of the
    /// top of the stack.
    pub fn step(
        &self,
        input: ArrayView1<'_, f32>,
        states: &mut [Array1<f32>],
    ) -> LeeaResult<Array1<f32>> {
        if states.len() != self.cells.len() {
            return Err(LeeaError::ShapeMismatch {
                expected: vec![self.cells.len()],
                found: vec![states.len()],
            });
        }
        let mut current = input.to_owned();
        for (cell, state) in self.cells.iter().zip(states.iter_mut()) {
            let next = cell.step(current.view(), state.view())?;
            *state = next;
            current = state.clone();
        }
        let out_2d: Array2<f32> = current.insert_axis(Axis(0));
        let out = self.output.forward(&out_2d.into_dyn().into())?;
        Ok(as_2d(&out)?.row(0).to_owned())
    }
}
