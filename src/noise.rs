use ndarray_rand::rand_distr::StandardNormal;
use rand::distributions::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Logistic distribution rescaled to unit variance.
///
/// Sampled by inverse CDF from `u ~ Uniform(-1, 1)`; `u` is re-drawn while it
/// sits on the open boundary so the logarithm stays finite.
#[derive(Clone, Copy, Debug)]
pub struct UnitLogistic;

impl Distribution<f64> for UnitLogistic {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let mut u: f64 = rng.gen_range(-1.0..1.0);
        while u <= -1.0 {
            u = rng.gen_range(-1.0..1.0);
        }
        (3.0f64.sqrt() / std::f64::consts::PI) * ((1.0 + u) / (1.0 - u)).ln()
    }
}

/// Zero-mean, unit-variance noise source used by the mutators.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum Noise {
    Gaussian,
    Logistic,
}

impl Distribution<f64> for Noise {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Noise::Gaussian => StandardNormal.sample(rng),
            Noise::Logistic => UnitLogistic.sample(rng),
        }
    }
}
