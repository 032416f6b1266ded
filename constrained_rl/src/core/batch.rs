//! Rollout batch with a two-channel reward signal.
//!
//! Required fields are explicit struct members; estimator outputs
//! (advantages, value targets, value predictions) live in a keyed side-table
//! so that key names stay configurable between estimators and the loss.
//!
//! ## Layout
//!
//! ```text
//! observations       [N, obs_dim]
//! actions            [N, action_dim]
//! rewards            [N, 2]        index 0 = reward, index 1 = cost
//! next_observations  [N, obs_dim]
//! old_log_probs      [N]           log π_behavior(a|s)
//! terminated         [N]
//! truncated          [N]
//! avg_violation      [K]           optional, mean is used
//! ```
//!
//! Transitions are time-ordered; a `terminated || truncated` flag marks the
//! end of a trajectory segment for advantage estimation.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::collections::HashMap;

use super::error::LossError;

/// Index of the task reward in the reward tensor's last dimension.
pub const REWARD_CHANNEL: usize = 0;
/// Index of the constraint cost in the reward tensor's last dimension.
pub const COST_CHANNEL: usize = 1;
/// Number of reward channels carried by every transition.
pub const N_CHANNELS: usize = 2;

/// Key under which the mean constraint violation is looked up.
pub const AVG_VIOLATION_KEY: &str = "avg_violation";

/// A batch of transitions carrying reward and cost.
#[derive(Debug, Clone)]
pub struct RolloutBatch<B: Backend> {
    pub observations: Tensor<B, 2>,
    pub actions: Tensor<B, 2>,
    /// Two-channel reward: `[N, 2]`.
    pub rewards: Tensor<B, 2>,
    pub next_observations: Tensor<B, 2>,
    /// Log-probability of the taken actions under the behavior policy.
    pub old_log_probs: Tensor<B, 1>,
    pub terminated: Vec<bool>,
    pub truncated: Vec<bool>,
    /// Mean constraint violation of the rollout this batch came from.
    pub avg_violation: Option<Tensor<B, 1>>,
    extras: HashMap<String, Tensor<B, 1>>,
}

impl<B: Backend> RolloutBatch<B> {
    /// Create a batch and check its structural invariants.
    pub fn new(
        observations: Tensor<B, 2>,
        actions: Tensor<B, 2>,
        rewards: Tensor<B, 2>,
        next_observations: Tensor<B, 2>,
        old_log_probs: Tensor<B, 1>,
        terminated: Vec<bool>,
        truncated: Vec<bool>,
    ) -> Result<Self, LossError> {
        let batch = Self {
            observations,
            actions,
            rewards,
            next_observations,
            old_log_probs,
            terminated,
            truncated,
            avg_violation: None,
            extras: HashMap::new(),
        };
        batch.validate()?;
        Ok(batch)
    }

    /// Attach a scalar violation, broadcast to every transition.
    pub fn with_avg_violation(mut self, avg_violation: f32) -> Self {
        let n = self.len();
        let device = self.device();
        self.avg_violation = Some(Tensor::full([n], avg_violation, &device));
        self
    }

    /// Attach a per-transition violation tensor.
    pub fn with_avg_violation_tensor(mut self, avg_violation: Tensor<B, 1>) -> Self {
        self.avg_violation = Some(avg_violation);
        self
    }

    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.observations.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn device(&self) -> B::Device {
        self.observations.device()
    }

    /// Check shapes of the required fields.
    pub fn validate(&self) -> Result<(), LossError> {
        let n = self.len();
        if n == 0 {
            return Err(LossError::invalid("batch contains no transitions"));
        }

        let reward_dims = self.rewards.dims();
        if reward_dims != [n, N_CHANNELS] {
            return Err(LossError::shape_mismatch(
                "rewards",
                &[n, N_CHANNELS],
                &reward_dims,
            ));
        }

        for (key, rows) in [
            ("actions", self.actions.dims()[0]),
            ("next_observations", self.next_observations.dims()[0]),
            ("old_log_probs", self.old_log_probs.dims()[0]),
        ] {
            if rows != n {
                return Err(LossError::shape_mismatch(key, &[n], &[rows]));
            }
        }

        if self.next_observations.dims() != self.observations.dims() {
            return Err(LossError::shape_mismatch(
                "next_observations",
                &self.observations.dims(),
                &self.next_observations.dims(),
            ));
        }

        if self.terminated.len() != n || self.truncated.len() != n {
            return Err(LossError::invalid(format!(
                "expected {} termination flags, got terminated={} truncated={}",
                n,
                self.terminated.len(),
                self.truncated.len()
            )));
        }

        Ok(())
    }

    /// Insert an extra per-transition field.
    pub fn insert(&mut self, key: impl Into<String>, value: Tensor<B, 1>) {
        self.extras.insert(key.into(), value);
    }

    /// Look up an extra field.
    pub fn get(&self, key: &str) -> Result<Tensor<B, 1>, LossError> {
        self.extras
            .get(key)
            .cloned()
            .ok_or_else(|| LossError::missing(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.extras.contains_key(key)
    }

    /// Scratch view exposing a single reward channel.
    ///
    /// The view holds its own copies of the tensors it needs, so estimator
    /// writes never reach this batch or a view of the other channel.
    pub fn channel(&self, channel: usize) -> Result<ChannelBatch<B>, LossError> {
        if channel >= N_CHANNELS {
            return Err(LossError::invalid(format!(
                "reward channel {} out of range (batch has {})",
                channel, N_CHANNELS
            )));
        }
        let n = self.len();
        let rewards = self.rewards.clone().narrow(1, channel, 1).reshape([n]);

        Ok(ChannelBatch {
            channel,
            observations: self.observations.clone(),
            next_observations: self.next_observations.clone(),
            rewards,
            terminated: self.terminated.clone(),
            truncated: self.truncated.clone(),
            scratch: self.extras.clone(),
        })
    }

    /// Contiguous sub-batch `[start, start + length)`.
    ///
    /// Per-transition extras are narrowed with the batch. A violation tensor
    /// that does not have one entry per transition is kept whole, since it
    /// describes the rollout rather than individual steps.
    pub fn narrow(&self, start: usize, length: usize) -> Self {
        let n = self.len();
        let end = (start + length).min(n);
        let start = start.min(end);
        let length = end - start;

        let extras = self
            .extras
            .iter()
            .map(|(k, v)| {
                let v = if v.dims()[0] == n {
                    v.clone().narrow(0, start, length)
                } else {
                    v.clone()
                };
                (k.clone(), v)
            })
            .collect();

        let avg_violation = self.avg_violation.as_ref().map(|v| {
            if v.dims()[0] == n {
                v.clone().narrow(0, start, length)
            } else {
                v.clone()
            }
        });

        Self {
            observations: self.observations.clone().narrow(0, start, length),
            actions: self.actions.clone().narrow(0, start, length),
            rewards: self.rewards.clone().narrow(0, start, length),
            next_observations: self.next_observations.clone().narrow(0, start, length),
            old_log_probs: self.old_log_probs.clone().narrow(0, start, length),
            terminated: self.terminated[start..end].to_vec(),
            truncated: self.truncated[start..end].to_vec(),
            avg_violation,
            extras,
        }
    }
}

/// Single-channel scratch copy of a [`RolloutBatch`], handed to one value
/// estimator.
#[derive(Debug, Clone)]
pub struct ChannelBatch<B: Backend> {
    channel: usize,
    pub observations: Tensor<B, 2>,
    pub next_observations: Tensor<B, 2>,
    /// Reward of the exposed channel: `[N]`.
    pub rewards: Tensor<B, 1>,
    pub terminated: Vec<bool>,
    pub truncated: Vec<bool>,
    scratch: HashMap<String, Tensor<B, 1>>,
}

impl<B: Backend> ChannelBatch<B> {
    /// Which reward channel this view exposes.
    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn len(&self) -> usize {
        self.observations.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn device(&self) -> B::Device {
        self.observations.device()
    }

    /// `terminated || truncated` per transition.
    pub fn dones(&self) -> Vec<bool> {
        self.terminated
            .iter()
            .zip(self.truncated.iter())
            .map(|(&term, &trunc)| term || trunc)
            .collect()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Tensor<B, 1>) {
        self.scratch.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Result<Tensor<B, 1>, LossError> {
        self.scratch
            .get(key)
            .cloned()
            .ok_or_else(|| LossError::missing(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.scratch.contains_key(key)
    }
}

/// Copy a tensor's values into a `Vec<f32>`.
pub(crate) fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor.into_data().iter::<f32>().collect()
}
