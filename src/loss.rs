use crate::tensor::Tensor;

/// A scalar training cost. Lower is better; evaluators negate it to turn it
/// into a fitness.
pub trait Loss: Send + Sync {
    fn cost(&self, predicted: &Tensor, target: &Tensor) -> f32;
}

/// Mean squared error over all elements.
pub struct Mse;

impl Loss for Mse {
    fn cost(&self, predicted: &Tensor, target: &Tensor) -> f32 {
        let diff = predicted.array() - target.array();
        (&diff * &diff).mean().unwrap_or(0.0)
    }
}

/// Dot cost over log-probabilities: `-sum(target * log_p) / batch`.
///
/// Expects the prediction to already be log-probabilities, i.e. the network
/// ends in a `LogSoftmax` layer.
pub struct CrossEntropy;

impl Loss for CrossEntropy {
    fn cost(&self, predicted: &Tensor, target: &Tensor) -> f32 {
        let batch = predicted.shape().first().copied().unwrap_or(1).max(1) as f32;
        let dot: f32 = predicted
            .iter()
            .zip(target.iter())
            .map(|(p, t)| p * t)
            .sum();
        -dot / batch
    }
}
