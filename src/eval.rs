use crate::errors::{LeeaError, LeeaResult};
use crate::loss::Loss;
use crate::nn::Network;
use crate::samples::LabeledBatch;

/// Computes a scalar fitness for an entity on a batch. Higher is better.
///
/// Evaluators are stateless; an entity/batch type mismatch is a programmer
/// error and fails eagerly.
pub trait Evaluator<E, B> {
    fn evaluate(&self, entity: &E, batch: &B) -> LeeaResult<f64>;
}

/// Adapts a plain scoring closure into an [`Evaluator`].
pub struct FnEvaluator<F>(pub F);

impl<E, B, F> Evaluator<E, B> for FnEvaluator<F>
where
    F: Fn(&E, &B) -> f64,
{
    fn evaluate(&self, entity: &E, batch: &B) -> LeeaResult<f64> {
        Ok((self.0)(entity, batch))
    }
}

/// Fitness as the negative mean cost on the batch, so a lower loss yields a
/// higher fitness.
pub struct NegMeanCost<L> {
    pub cost: L,
}

impl<L: Loss> Evaluator<Network, LabeledBatch> for NegMeanCost<L> {
    fn evaluate(&self, net: &Network, batch: &LabeledBatch) -> LeeaResult<f64> {
        let predicted = net.forward(&batch.inputs)?;
        if predicted.shape() != batch.targets.shape() {
            return Err(LeeaError::ShapeMismatch {
                expected: batch.targets.shape().to_vec(),
                found: predicted.shape().to_vec(),
            });
        }
        Ok(-(self.cost.cost(&predicted, &batch.targets) as f64))
    }
}

/// Fitness as the reciprocal of the mean cost on the batch.
///
/// Stays non-negative for non-negative costs, which roulette selection
/// requires; the cost should be bounded away from zero.
pub struct InvCost<L> {
    pub cost: L,
}

impl<L: Loss> Evaluator<Network, LabeledBatch> for InvCost<L> {
    fn evaluate(&self, net: &Network, batch: &LabeledBatch) -> LeeaResult<f64> {
        let predicted = net.forward(&batch.inputs)?;
        if predicted.shape() != batch.targets.shape() {
            return Err(LeeaError::ShapeMismatch {
                expected: batch.targets.shape().to_vec(),
                found: predicted.shape().to_vec(),
            });
        }
        Ok(1.0 / self.cost.cost(&predicted, &batch.targets) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::Mse;
    use crate::nn::{Dense, Layer, Network};
    use crate::tensor::Tensor;
    use ndarray::array;

    #[test]
    fn neg_mean_cost_negates_the_loss() {
        let net = Network::new(vec![Layer::Dense(Dense {
            weights: Tensor::from(array![[1.0f32]].into_dyn()),
            biases: Tensor::from(array![0.0f32].into_dyn()),
        })]);
        let batch = LabeledBatch {
            inputs: Tensor::from(array![[2.0f32]].into_dyn()),
            targets: Tensor::from(array![[0.0f32]].into_dyn()),
        };
        let fitness = NegMeanCost { cost: Mse }.evaluate(&net, &batch).unwrap();
        assert!((fitness - (-4.0)).abs() < 1e-6);
    }

    #[test]
    fn inv_cost_is_the_reciprocal_of_the_loss() {
        let net = Network::new(vec![Layer::Dense(Dense {
            weights: Tensor::from(array![[1.0f32]].into_dyn()),
            biases: Tensor::from(array![0.0f32].into_dyn()),
        })]);
        let batch = LabeledBatch {
            inputs: Tensor::from(array![[2.0f32]].into_dyn()),
            targets: Tensor::from(array![[0.0f32]].into_dyn()),
        };
        let fitness = InvCost { cost: Mse }.evaluate(&net, &batch).unwrap();
        assert!((fitness - 0.25).abs() < 1e-6);
    }

    #[test]
    fn wrapped_closures_are_evaluators() {
        let eval = FnEvaluator(|_e: &u32, b: &f64| *b);
        assert_eq!(eval.evaluate(&1, &2.5).unwrap(), 2.5);
    }
}
