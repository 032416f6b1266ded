//! Action distributions and the actor interface used by the loss.
//!
//! The loss only needs two things from a policy: the log probability of the
//! actions stored in the batch and the per-sample entropy, both with gradient
//! flow. Sampling is provided for rollout collection and is detached.
//!
//! Actions are always passed as a `[batch, action_dim]` float tensor:
//! - Categorical: `action_dim = 1`, holding the action index
//! - Diagonal Gaussian: raw (unsquashed) action values

use burn::module::Module;
use burn::tensor::activation::{log_softmax, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Int, Tensor};

use crate::core::error::LossError;

const LOG_STD_MIN: f32 = -20.0;
const LOG_STD_MAX: f32 = 2.0;

/// A batch of action distributions, one per observation.
pub trait ActionDistribution<B: Backend> {
    /// Reject actions this distribution cannot score.
    ///
    /// `log_prob` assumes the actions passed this check.
    fn check_actions(&self, actions: &Tensor<B, 2>) -> Result<(), LossError> {
        let _ = actions;
        Ok(())
    }

    /// Log probability of `actions` (with gradient flow): [batch]
    fn log_prob(&self, actions: Tensor<B, 2>) -> Tensor<B, 1>;

    /// Per-sample entropy (with gradient flow): [batch]
    fn entropy(&self) -> Tensor<B, 1>;

    /// Sample one action per row (detached).
    ///
    /// Returns `(actions, log_probs)` with shapes `[batch, action_dim]` and
    /// `[batch]`.
    fn sample(&self) -> (Tensor<B, 2>, Tensor<B, 1>);
}

/// Policy network producing an action distribution from observations.
///
/// The network body is left to the implementor.
pub trait StochasticActor<B: Backend>: Module<B> {
    type Distribution: ActionDistribution<B>;

    fn distribution(&self, observations: Tensor<B, 2>) -> Self::Distribution;
}

// ============================================================================
// Categorical
// ============================================================================

/// Categorical distribution over `n_actions` discrete actions.
#[derive(Debug, Clone)]
pub struct CategoricalDistribution<B: Backend> {
    /// Unnormalized log probabilities: [batch, n_actions]
    pub logits: Tensor<B, 2>,
}

impl<B: Backend> CategoricalDistribution<B> {
    pub fn new(logits: Tensor<B, 2>) -> Self {
        Self { logits }
    }

    pub fn probs(&self) -> Tensor<B, 2> {
        softmax(self.logits.clone(), 1)
    }

    pub fn n_actions(&self) -> usize {
        self.logits.dims()[1]
    }

    pub fn batch_size(&self) -> usize {
        self.logits.dims()[0]
    }
}

impl<B: Backend> ActionDistribution<B> for CategoricalDistribution<B> {
    fn check_actions(&self, actions: &Tensor<B, 2>) -> Result<(), LossError> {
        let expected = [self.batch_size(), 1];
        if actions.dims() != expected {
            return Err(LossError::shape_mismatch("actions", &expected, &actions.dims()));
        }
        let n_actions = self.n_actions() as f32;
        let bad = actions
            .clone()
            .into_data()
            .iter::<f32>()
            .find(|a| !(a.fract() == 0.0 && *a >= 0.0 && *a < n_actions));
        match bad {
            Some(a) => Err(LossError::invalid(format!(
                "action {} is not an index in [0, {})",
                a, n_actions
            ))),
            None => Ok(()),
        }
    }

    fn log_prob(&self, actions: Tensor<B, 2>) -> Tensor<B, 1> {
        let batch_size = self.batch_size();
        let indices: Tensor<B, 2, Int> = actions.int();
        log_softmax(self.logits.clone(), 1)
            .gather(1, indices)
            .reshape([batch_size])
    }

    fn entropy(&self) -> Tensor<B, 1> {
        let log_probs = log_softmax(self.logits.clone(), 1);
        let probs = log_probs.clone().exp();
        // H = -sum(p * log(p))
        let neg_entropy: Tensor<B, 2> = (probs * log_probs).sum_dim(1);
        neg_entropy.flatten::<1>(0, 1).neg()
    }

    fn sample(&self) -> (Tensor<B, 2>, Tensor<B, 1>) {
        let device = self.logits.device();
        let batch_size = self.batch_size();
        let n_actions = self.n_actions();

        let probs: Vec<f32> = self.probs().into_data().iter::<f32>().collect();
        let mut actions = Vec::with_capacity(batch_size);
        let mut log_probs = Vec::with_capacity(batch_size);

        for i in 0..batch_size {
            let row = &probs[i * n_actions..(i + 1) * n_actions];
            let rand_val = fastrand::f32();
            let mut cumsum = 0.0;
            let mut selected = n_actions - 1;
            for (a, p) in row.iter().enumerate() {
                cumsum += p;
                if rand_val < cumsum {
                    selected = a;
                    break;
                }
            }
            actions.push(selected as f32);
            log_probs.push((row[selected] + 1e-8).ln());
        }

        (
            Tensor::<B, 1>::from_floats(actions.as_slice(), &device).reshape([batch_size, 1]),
            Tensor::from_floats(log_probs.as_slice(), &device),
        )
    }
}

// ============================================================================
// Diagonal Gaussian
// ============================================================================

/// Independent Gaussian per action dimension.
#[derive(Debug, Clone)]
pub struct DiagGaussianDistribution<B: Backend> {
    /// [batch, action_dim]
    pub mean: Tensor<B, 2>,
    /// [batch, action_dim], clamped to [-20, 2]
    pub log_std: Tensor<B, 2>,
}

impl<B: Backend> DiagGaussianDistribution<B> {
    pub fn new(mean: Tensor<B, 2>, log_std: Tensor<B, 2>) -> Self {
        Self {
            mean,
            log_std: log_std.clamp(LOG_STD_MIN, LOG_STD_MAX),
        }
    }

    pub fn action_dim(&self) -> usize {
        self.mean.dims()[1]
    }

    pub fn batch_size(&self) -> usize {
        self.mean.dims()[0]
    }
}

impl<B: Backend> ActionDistribution<B> for DiagGaussianDistribution<B> {
    fn check_actions(&self, actions: &Tensor<B, 2>) -> Result<(), LossError> {
        let expected = self.mean.dims();
        if actions.dims() != expected {
            return Err(LossError::shape_mismatch("actions", &expected, &actions.dims()));
        }
        Ok(())
    }

    fn log_prob(&self, actions: Tensor<B, 2>) -> Tensor<B, 1> {
        // log N(x; μ, σ) = -0.5 * ((x - μ)/σ)² - log(σ) - 0.5 * log(2π)
        let log_2pi = (2.0 * std::f32::consts::PI).ln();
        let normalized = (actions - self.mean.clone()) / self.log_std.clone().exp();
        let per_dim: Tensor<B, 2> =
            normalized.powf_scalar(2.0).mul_scalar(-0.5) - self.log_std.clone() - 0.5 * log_2pi;
        per_dim.sum_dim(1).flatten(0, 1)
    }

    fn entropy(&self) -> Tensor<B, 1> {
        // H = 0.5 * D * (1 + log(2π)) + sum(log_std)
        let log_2pi = (2.0 * std::f32::consts::PI).ln();
        let constant = 0.5 * self.action_dim() as f32 * (1.0 + log_2pi);
        let sum_log_std: Tensor<B, 1> = self.log_std.clone().sum_dim(1).flatten(0, 1);
        sum_log_std.add_scalar(constant)
    }

    fn sample(&self) -> (Tensor<B, 2>, Tensor<B, 1>) {
        let mean = self.mean.clone().detach();
        let log_std = self.log_std.clone().detach();
        let noise: Tensor<B, 2> =
            Tensor::random(mean.dims(), Distribution::Normal(0.0, 1.0), &mean.device());
        let actions = mean + log_std.exp() * noise;
        let log_probs = self.log_prob(actions.clone()).detach();
        (actions, log_probs)
    }
}
