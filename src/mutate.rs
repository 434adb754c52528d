use std::sync::Arc;

use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::Rng;

use crate::entity::Entity;
use crate::errors::{LeeaError, LeeaResult};
use crate::noise::Noise;
use crate::schedule::Schedule;

/// Applies random perturbations to an entity's parameters.
///
/// Must be safe to call in parallel on distinct entities; every call gets
/// its own RNG handle.
pub trait Mutator<E: Entity>: Send + Sync {
    fn mutate(&self, t: usize, entity: &mut E, rng: &mut StdRng) -> LeeaResult<()>;
}

/// Adds zero-mean noise with a scheduled standard deviation to every scalar.
pub struct AddMutator {
    pub stddev: Arc<dyn Schedule>,
    pub noise: Noise,
}

impl<E: Entity> Mutator<E> for AddMutator {
    fn mutate(&self, t: usize, entity: &mut E, rng: &mut StdRng) -> LeeaResult<()> {
        let stddev = self.stddev.value_at(t);
        if stddev == 0.0 {
            return Ok(());
        }
        for tensor in entity.parameters_mut() {
            for x in tensor.as_slice_mut()? {
                *x += (self.noise.sample(rng) * stddev) as f32;
            }
        }
        Ok(())
    }
}

/// Replaces a scheduled fraction of each tensor's scalars with fresh draws
/// scaled by that tensor's own stddev. The old value does not contribute.
///
/// `stddevs` must have one entry per parameter tensor.
pub struct SetMutator {
    pub fraction: Arc<dyn Schedule>,
    pub stddevs: Vec<f64>,
    pub noise: Noise,
}

impl<E: Entity> Mutator<E> for SetMutator {
    fn mutate(&self, t: usize, entity: &mut E, rng: &mut StdRng) -> LeeaResult<()> {
        let frac = self.fraction.value_at(t).clamp(0.0, 1.0);
        let mut params = entity.parameters_mut();
        if params.len() != self.stddevs.len() {
            return Err(LeeaError::StddevCountMismatch {
                got: self.stddevs.len(),
                want: params.len(),
            });
        }
        for (tensor, &stddev) in params.iter_mut().zip(&self.stddevs) {
            for x in tensor.as_slice_mut()? {
                if rng.gen::<f64>() < frac {
                    *x = (self.noise.sample(rng) * stddev) as f32;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{Dense, Layer, Network};
    use rand::SeedableRng;

    fn net(seed: u64) -> Network {
        let mut rng = StdRng::seed_from_u64(seed);
        Network::new(vec![Layer::Dense(Dense::random(4, 4, &mut rng))])
    }

    fn snapshot(net: &Network) -> Vec<f32> {
        net.parameters().iter().flat_map(|t| t.iter().copied().collect::<Vec<_>>()).collect()
    }

    #[test]
    fn add_mutator_with_zero_stddev_is_a_noop() {
        let mutator = AddMutator { stddev: Arc::new(0.0), noise: Noise::Gaussian };
        let mut entity = net(1);
        let before = snapshot(&entity);
        mutator.mutate(0, &mut entity, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(before, snapshot(&entity));
    }

    #[test]
    fn add_mutator_perturbs_every_scalar() {
        let mutator = AddMutator { stddev: Arc::new(0.5), noise: Noise::Gaussian };
        let mut entity = net(2);
        let before = snapshot(&entity);
        mutator.mutate(0, &mut entity, &mut StdRng::seed_from_u64(9)).unwrap();
        let after = snapshot(&entity);
        let changed = before.iter().zip(&after).filter(|(b, a)| b != a).count();
        assert_eq!(changed, before.len());
    }

    #[test]
    fn set_mutator_checks_stddev_count() {
        let mutator = SetMutator {
            fraction: Arc::new(1.0),
            stddevs: vec![0.1],
            noise: Noise::Gaussian,
        };
        let mut entity = net(3);
        assert!(matches!(
            mutator.mutate(0, &mut entity, &mut StdRng::seed_from_u64(9)),
            Err(LeeaError::StddevCountMismatch { got: 1, want: 2 })
        ));
    }

    #[test]
    fn set_mutator_replacement_ignores_old_values() {
        let mutator = SetMutator {
            fraction: Arc::new(1.0),
            stddevs: vec![0.01, 0.01],
            noise: Noise::Gaussian,
        };
        let mut entity = net(4);
        for t in entity.parameters_mut() {
            t.scale(1e6);
        }
        mutator.mutate(0, &mut entity, &mut StdRng::seed_from_u64(9)).unwrap();
        for v in snapshot(&entity) {
            assert!(v.abs() < 1.0, "stale value survived replacement: {v}");
        }
    }
}
