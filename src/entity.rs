use serde::{Deserialize, Serialize};

use crate::errors::{LeeaError, LeeaResult};
use crate::nn::{Layer, Network, RnnStack};
use crate::tensor::Tensor;

/// Structural view of an entity's parameter list.
///
/// Tensor positions refer to indices into `Entity::parameters()`. The
/// structured crosser dispatches on this to move whole neurons, filters, or
/// hidden-state components at a time instead of individual scalars.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Structure {
    /// Independently structured sub-blocks, e.g. the layers of a network.
    Chain(Vec<Structure>),
    /// Fully-connected layer: `weights` is an `[out, in]` matrix and
    /// `biases` a length-`out` vector; row `i` and bias `i` form one unit.
    Dense { weights: usize, biases: usize, out: usize },
    /// Convolutional layer: `filters` holds `count` filter blocks, `biases`
    /// one bias per filter; a filter and its bias form one unit.
    Conv { filters: usize, biases: usize, count: usize },
    /// Vanilla recurrent cell: hidden component `i` owns row `i` of the
    /// input weights, the state weights, and bias `i`, all moved together.
    Recurrent { input: usize, state: usize, biases: usize, hidden: usize },
    /// Tensors with no known unit structure; mixed scalar-wise.
    Raw(Vec<usize>),
}

/// A parameterized individual.
///
/// The trainer only ever sees entities through this trait: a stable,
/// ordered list of parameter tensors plus whole-entity decay and copy.
pub trait Entity: Send {
    fn parameters(&self) -> Vec<&Tensor>;

    fn parameters_mut(&mut self) -> Vec<&mut Tensor>;

    /// Structural view used by the neuronal crosser. Defaults to "no known
    /// structure", which degrades cross-over to scalar-wise mixing.
    fn structure(&self) -> Structure {
        Structure::Raw((0..self.parameters().len()).collect())
    }

    /// Shrinks every parameter scalar by `1 - rate`.
    fn decay(&mut self, rate: f64) {
        let factor = 1.0 - rate as f32;
        for t in self.parameters_mut() {
            t.scale(factor);
        }
    }

    /// Deep-copies all parameter scalars from `other`. Shapes must match.
    fn set_from(&mut self, other: &Self) -> LeeaResult<()>
    where
        Self: Sized,
    {
        let src = other.parameters();
        let mut dst = self.parameters_mut();
        if src.len() != dst.len() {
            return Err(LeeaError::ShapeMismatch {
                expected: vec![dst.len()],
                found: vec![src.len()],
            });
        }
        for (d, s) in dst.iter_mut().zip(src) {
            d.copy_from(s)?;
        }
        Ok(())
    }
}

/// An entity paired with its accumulated fitness.
///
/// The entity identity in a population slot is stable across the run; only
/// the fitness and the parameter contents change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FitEntity<E> {
    pub entity: E,
    pub fitness: f64,
}

impl<E> FitEntity<E> {
    pub fn new(entity: E) -> Self {
        Self { entity, fitness: 0.0 }
    }
}

impl Entity for Network {
    fn parameters(&self) -> Vec<&Tensor> {
        self.layers.iter().flat_map(|l| l.parameters()).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.layers.iter_mut().flat_map(|l| l.parameters_mut()).collect()
    }

    fn structure(&self) -> Structure {
        let mut idx = 0;
        let mut parts = Vec::new();
        for layer in &self.layers {
            match layer {
                Layer::Dense(d) => {
                    parts.push(Structure::Dense {
                        weights: idx,
                        biases: idx + 1,
                        out: d.out_dim(),
                    });
                    idx += 2;
                }
                Layer::Conv(c) => {
                    parts.push(Structure::Conv {
                        filters: idx,
                        biases: idx + 1,
                        count: c.filter_count(),
                    });
                    idx += 2;
                }
                Layer::Activation(_) => {}
            }
        }
        Structure::Chain(parts)
    }
}

impl Entity for RnnStack {
    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = Vec::with_capacity(self.cells.len() * 3 + 2);
        for cell in &self.cells {
            params.push(&cell.input_weights);
            params.push(&cell.state_weights);
            params.push(&cell.biases);
        }
        params.push(&self.output.weights);
        params.push(&self.output.biases);
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = Vec::with_capacity(self.cells.len() * 3 + 2);
        for cell in &mut self.cells {
            params.push(&mut cell.input_weights);
            params.push(&mut cell.state_weights);
            params.push(&mut cell.biases);
        }
        params.push(&mut self.output.weights);
        params.push(&mut self.output.biases);
        params
    }

    fn structure(&self) -> Structure {
        let mut parts = Vec::with_capacity(self.cells.len() + 1);
        let mut idx = 0;
        for cell in &self.cells {
            parts.push(Structure::Recurrent {
                input: idx,
                state: idx + 1,
                biases: idx + 2,
                hidden: cell.hidden_size(),
            });
            idx += 3;
        }
        parts.push(Structure::Dense {
            weights: idx,
            biases: idx + 1,
            out: self.output.out_dim(),
        });
        Structure::Chain(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{Activation, Dense, VanillaRnn};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_net(seed: u64) -> Network {
        let mut rng = StdRng::seed_from_u64(seed);
        Network::new(vec![
            Layer::Dense(Dense::random(3, 4, &mut rng)),
            Layer::Activation(Activation::Tanh),
            Layer::Dense(Dense::random(4, 2, &mut rng)),
        ])
    }

    #[test]
    fn structure_indices_line_up_with_parameters() {
        let net = small_net(1);
        let params = net.parameters();
        match net.structure() {
            Structure::Chain(parts) => {
                assert_eq!(parts.len(), 2);
                match parts[0] {
                    Structure::Dense { weights, biases, out } => {
                        assert_eq!(params[weights].shape(), &[4, 3]);
                        assert_eq!(params[biases].shape(), &[4]);
                        assert_eq!(out, 4);
                    }
                    ref other => panic!("unexpected structure {other:?}"),
                }
            }
            other => panic!("unexpected structure {other:?}"),
        }
    }

    #[test]
    fn rnn_stack_structure_covers_every_tensor() {
        let mut rng = StdRng::seed_from_u64(2);
        let stack = RnnStack {
            cells: vec![VanillaRnn::random(5, 7, &mut rng), VanillaRnn::random(7, 7, &mut rng)],
            output: Dense::random(7, 3, &mut rng),
        };
        let params = stack.parameters();
        assert_eq!(params.len(), 8);
        match stack.structure() {
            Structure::Chain(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(
                    parts[1],
                    Structure::Recurrent { input: 3, state: 4, biases: 5, hidden: 7 }
                );
                assert_eq!(parts[2], Structure::Dense { weights: 6, biases: 7, out: 3 });
            }
            other => panic!("unexpected structure {other:?}"),
        }
    }

    #[test]
    fn decay_shrinks_all_parameters() {
        let mut net = small_net(3);
        let before: Vec<f32> =
            net.parameters().iter().flat_map(|t| t.iter().copied().collect::<Vec<_>>()).collect();
        net.decay(0.5);
        let after: Vec<f32> =
            net.parameters().iter().flat_map(|t| t.iter().copied().collect::<Vec<_>>()).collect();
        for (b, a) in before.iter().zip(&after) {
            assert!((a - b * 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn set_from_copies_scalars_and_checks_shape() {
        let mut dest = small_net(4);
        let source = small_net(5);
        dest.set_from(&source).unwrap();
        for (d, s) in dest.parameters().iter().zip(source.parameters()) {
            assert_eq!(d.as_slice().unwrap(), s.as_slice().unwrap());
        }

        let mut rng = StdRng::seed_from_u64(6);
        let mut other_shape =
            Network::new(vec![Layer::Dense(Dense::random(2, 2, &mut rng))]);
        assert!(other_shape.set_from(&source).is_err());
    }
}
