use std::sync::Arc;

use tracing::warn;

/// A time-indexed scalar controller. `t` is the 0-based generation index.
///
/// Schedules are pure and safe to call from any thread.
pub trait Schedule: Send + Sync {
    fn value_at(&self, t: usize) -> f64;
}

/// Constant schedules are just numbers.
impl Schedule for f64 {
    fn value_at(&self, _t: usize) -> f64 {
        *self
    }
}

/// Exponentially decaying schedule: `baseline + init * decay_rate^t`.
#[derive(Clone, Copy, Debug)]
pub struct ExpSchedule {
    pub baseline: f64,
    pub init: f64,
    pub decay_rate: f64,
}

impl Schedule for ExpSchedule {
    fn value_at(&self, t: usize) -> f64 {
        self.baseline + self.init * self.decay_rate.powf(t as f64)
    }
}

/// Derives a weight-decay rate from a companion mutation schedule so that the
/// stationary stddev of a repeatedly decayed-then-perturbed weight equals
/// `target`.
///
/// With per-generation noise stddev `sigma = mutation(t)` and
/// `c = (sigma/target)^2`, the fixed point of `x <- x*(1-d) + sigma*N(0,1)`
/// has stddev `target` when `d = (2 - sqrt(4*(1-c))) / 2`. The result is
/// clamped to `[0, 1)`; if the noise already exceeds the target (`c > 1`) no
/// decay rate can reach it, so the maximum is returned and a warning logged.
#[derive(Clone)]
pub struct DecaySchedule {
    pub mutation: Arc<dyn Schedule>,
    pub target: f64,
}

const MAX_DECAY: f64 = 1.0 - f64::EPSILON;

impl Schedule for DecaySchedule {
    fn value_at(&self, t: usize) -> f64 {
        if self.target <= 0.0 {
            warn!(target_stddev = self.target, "non-positive decay target; disabling decay");
            return 0.0;
        }
        let sigma = self.mutation.value_at(t);
        let c = (sigma / self.target).powi(2);
        if c > 1.0 {
            warn!(
                sigma,
                target_stddev = self.target,
                "mutation noise exceeds the target stddev; clamping decay rate"
            );
            return MAX_DECAY;
        }
        let d = (2.0 - (4.0 * (1.0 - c)).sqrt()) / 2.0;
        d.clamp(0.0, MAX_DECAY)
    }
}
