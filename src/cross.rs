use rand::rngs::StdRng;
use rand::Rng;

use crate::entity::{Entity, Structure};
use crate::errors::{LeeaError, LeeaResult};
use crate::tensor::Tensor;

/// Mixes `source`'s parameters into `dest`.
///
/// `keep` is the probability that each unit of mixing stays with `dest`
/// rather than coming from `source`. Both entities must have identical
/// parameter shapes.
pub trait Crosser<E: Entity> {
    fn cross(&self, dest: &mut E, source: &E, keep: f64, rng: &mut StdRng) -> LeeaResult<()>;
}

/// Scalar-wise cross-over: every parameter scalar independently stays with
/// `dest` with probability `keep`. `keep == 0` is a pure clone of `source`.
pub struct BasicCrosser;

fn mix_tensor(dest: &mut Tensor, source: &Tensor, keep: f64, rng: &mut StdRng) -> LeeaResult<()> {
    if dest.shape() != source.shape() {
        return Err(LeeaError::ShapeMismatch {
            expected: dest.shape().to_vec(),
            found: source.shape().to_vec(),
        });
    }
    let dst = dest.as_slice_mut()?;
    let src = source.as_slice()?;
    for (x, y) in dst.iter_mut().zip(src) {
        if keep == 0.0 || rng.gen::<f64>() > keep {
            *x = *y;
        }
    }
    Ok(())
}

impl<E: Entity> Crosser<E> for BasicCrosser {
    fn cross(&self, dest: &mut E, source: &E, keep: f64, rng: &mut StdRng) -> LeeaResult<()> {
        let src = source.parameters();
        let mut dst = dest.parameters_mut();
        if dst.len() != src.len() {
            return Err(LeeaError::ShapeMismatch {
                expected: vec![dst.len()],
                found: vec![src.len()],
            });
        }
        for (d, s) in dst.iter_mut().zip(src) {
            mix_tensor(d, s, keep, rng)?;
        }
        Ok(())
    }
}

/// Structured cross-over that migrates whole units between entities: a
/// fully-connected output neuron moves with its bias, a convolutional
/// filter with its bias, and a recurrent hidden component with its rows in
/// all three cell tensors.
///
/// Scalar-wise mixing destroys co-adapted weights; moving rows keeps the
/// direction of learned features intact. Entities whose structures do not
/// line up degrade to [`BasicCrosser`].
pub struct NeuronalCrosser;

/// Per-unit draw: `true` means the unit is taken from the source.
fn unit_mask(len: usize, keep: f64, rng: &mut StdRng) -> Vec<bool> {
    (0..len).map(|_| rng.gen::<f64>() >= keep).collect()
}

fn bad_index(idx: usize, len: usize) -> LeeaError {
    LeeaError::InvalidConfig(format!(
        "structure refers to parameter tensor {idx} but the entity has {len}"
    ))
}

/// Copies the masked unit rows of tensor `idx` from `source` into `dest`,
/// deriving the row length from the unit count.
fn unit_rows(
    dest: &mut [&mut Tensor],
    source: &[&Tensor],
    idx: usize,
    mask: &[bool],
) -> LeeaResult<()> {
    let len = dest.len();
    let d = dest.get_mut(idx).ok_or_else(|| bad_index(idx, len))?;
    let s = source.get(idx).ok_or_else(|| bad_index(idx, len))?;
    if d.len() % mask.len() != 0 {
        return Err(LeeaError::ShapeMismatch {
            expected: vec![mask.len()],
            found: d.shape().to_vec(),
        });
    }
    let row_len = d.len() / mask.len();
    d.copy_rows_from(s, mask, row_len)
}

fn apply(
    structure: &Structure,
    dest: &mut [&mut Tensor],
    source: &[&Tensor],
    keep: f64,
    rng: &mut StdRng,
) -> LeeaResult<()> {
    match structure {
        Structure::Chain(parts) => {
            for part in parts {
                apply(part, dest, source, keep, rng)?;
            }
            Ok(())
        }
        Structure::Dense { weights, biases, out } => {
            let mask = unit_mask(*out, keep, rng);
            unit_rows(dest, source, *weights, &mask)?;
            unit_rows(dest, source, *biases, &mask)
        }
        Structure::Conv { filters, biases, count } => {
            let mask = unit_mask(*count, keep, rng);
            unit_rows(dest, source, *filters, &mask)?;
            unit_rows(dest, source, *biases, &mask)
        }
        Structure::Recurrent { input, state, biases, hidden } => {
            let mask = unit_mask(*hidden, keep, rng);
            unit_rows(dest, source, *input, &mask)?;
            unit_rows(dest, source, *state, &mask)?;
            unit_rows(dest, source, *biases, &mask)
        }
        Structure::Raw(indices) => {
            let len = dest.len();
            for &i in indices {
                let d = dest.get_mut(i).ok_or_else(|| bad_index(i, len))?;
                let s = source.get(i).ok_or_else(|| bad_index(i, len))?;
                mix_tensor(d, s, keep, rng)?;
            }
            Ok(())
        }
    }
}

impl<E: Entity> Crosser<E> for NeuronalCrosser {
    fn cross(&self, dest: &mut E, source: &E, keep: f64, rng: &mut StdRng) -> LeeaResult<()> {
        let structure = dest.structure();
        if source.structure() != structure {
            return BasicCrosser.cross(dest, source, keep, rng);
        }
        let src = source.parameters();
        let mut dst = dest.parameters_mut();
        if dst.len() != src.len() {
            return Err(LeeaError::ShapeMismatch {
                expected: vec![dst.len()],
                found: vec![src.len()],
            });
        }
        apply(&structure, &mut dst, &src, keep, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{Dense, Layer, Network, RnnStack, VanillaRnn};
    use ndarray::{Array1, Array2};
    use rand::SeedableRng;

    struct FlatEntity(Tensor);

    impl Entity for FlatEntity {
        fn parameters(&self) -> Vec<&Tensor> {
            vec![&self.0]
        }
        fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
            vec![&mut self.0]
        }
    }

    fn constant_net(value: f32, out: usize, inp: usize) -> Network {
        Network::new(vec![Layer::Dense(Dense {
            weights: Tensor::from(Array2::from_elem((out, inp), value).into_dyn()),
            biases: Tensor::from(Array1::from_elem(out, value).into_dyn()),
        })])
    }

    #[test]
    fn basic_keep_zero_clones_the_source() {
        let mut dest = FlatEntity(Tensor::zeros(&[8]));
        let source = FlatEntity(Tensor::randn(&[8], 1.0));
        let mut rng = StdRng::seed_from_u64(1);
        BasicCrosser.cross(&mut dest, &source, 0.0, &mut rng).unwrap();
        assert_eq!(dest.0.as_slice().unwrap(), source.0.as_slice().unwrap());
    }

    #[test]
    fn basic_keep_one_leaves_dest_untouched() {
        let mut dest = FlatEntity(Tensor::randn(&[8], 1.0));
        let before = dest.0.clone();
        let source = FlatEntity(Tensor::zeros(&[8]));
        let mut rng = StdRng::seed_from_u64(2);
        BasicCrosser.cross(&mut dest, &source, 1.0, &mut rng).unwrap();
        assert_eq!(dest.0, before);
    }

    #[test]
    fn basic_rejects_shape_mismatch() {
        let mut dest = FlatEntity(Tensor::zeros(&[8]));
        let source = FlatEntity(Tensor::zeros(&[4]));
        let mut rng = StdRng::seed_from_u64(3);
        assert!(BasicCrosser.cross(&mut dest, &source, 0.5, &mut rng).is_err());
    }

    #[test]
    fn neuronal_moves_dense_rows_whole() {
        let mut dest = constant_net(1.0, 6, 3);
        let source = constant_net(-1.0, 6, 3);
        let mut rng = StdRng::seed_from_u64(4);
        NeuronalCrosser.cross(&mut dest, &source, 0.5, &mut rng).unwrap();

        let params = dest.parameters();
        let weights = params[0].as_slice().unwrap().to_vec();
        let biases = params[1].as_slice().unwrap().to_vec();
        for row in 0..6 {
            let row_vals = &weights[row * 3..(row + 1) * 3];
            let first = row_vals[0];
            assert!(first == 1.0 || first == -1.0);
            assert!(row_vals.iter().all(|v| *v == first), "row {row} was mixed");
            assert_eq!(biases[row], first, "bias {row} split from its row");
        }
    }

    #[test]
    fn neuronal_keeps_recurrent_units_coherent() {
        let make = |value: f32| RnnStack {
            cells: vec![VanillaRnn {
                input_weights: Tensor::from(Array2::from_elem((5, 2), value).into_dyn()),
                state_weights: Tensor::from(Array2::from_elem((5, 5), value).into_dyn()),
                biases: Tensor::from(Array1::from_elem(5, value).into_dyn()),
            }],
            output: Dense {
                weights: Tensor::from(Array2::from_elem((1, 5), value).into_dyn()),
                biases: Tensor::from(Array1::from_elem(1, value).into_dyn()),
            },
        };
        let mut dest = make(1.0);
        let source = make(-1.0);
        let mut rng = StdRng::seed_from_u64(5);
        NeuronalCrosser.cross(&mut dest, &source, 0.5, &mut rng).unwrap();

        let params = dest.parameters();
        let input = params[0].as_slice().unwrap();
        let state = params[1].as_slice().unwrap();
        let biases = params[2].as_slice().unwrap();
        for h in 0..5 {
            let owner = biases[h];
            assert!(input[h * 2..(h + 1) * 2].iter().all(|v| *v == owner));
            assert!(state[h * 5..(h + 1) * 5].iter().all(|v| *v == owner));
        }
    }

    #[test]
    fn structure_mismatch_falls_back_to_scalar_mixing() {
        // Different layer geometry but the same flattened scalar count.
        let mut dest = constant_net(1.0, 6, 3);
        let source = constant_net(-1.0, 3, 6);
        let mut rng = StdRng::seed_from_u64(6);
        // Basic fallback still requires matching tensor shapes, so this errs
        // rather than silently mixing mismatched rows.
        assert!(NeuronalCrosser.cross(&mut dest, &source, 0.5, &mut rng).is_err());

        // A raw-structure pair with equal shapes mixes scalar-wise.
        let mut flat_dest = FlatEntity(Tensor::zeros(&[16]));
        let flat_source = FlatEntity(Tensor::randn(&[16], 1.0));
        NeuronalCrosser.cross(&mut flat_dest, &flat_source, 0.0, &mut rng).unwrap();
        assert_eq!(
            flat_dest.0.as_slice().unwrap(),
            flat_source.0.as_slice().unwrap()
        );
    }
}
