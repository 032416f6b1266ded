//! Per-channel advantage and value-target estimation.
//!
//! Each estimator owns a target snapshot of its critic. Current-state values
//! come from the live critic (detached); bootstrap values for the next state
//! come from the target. Outputs are written into the scratch table of the
//! channel view under the estimator's own keys.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

use super::critic::ValueCritic;
use super::gae::{compute_gae, compute_td0};
use crate::core::batch::{to_vec, ChannelBatch};
use crate::core::error::{check_range, ConfigError, LossError};
use crate::core::target_network::{detached_copy, soft_update};

/// Advantage estimator selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueEstimatorConfig {
    /// Generalized advantage estimation.
    Gae { gamma: f32, lmbda: f32 },
    /// One-step temporal difference.
    #[serde(rename = "td0")]
    TD0 { gamma: f32 },
}

impl Default for ValueEstimatorConfig {
    fn default() -> Self {
        ValueEstimatorConfig::Gae {
            gamma: 0.99,
            lmbda: 0.95,
        }
    }
}

impl ValueEstimatorConfig {
    pub fn gae(gamma: f32, lmbda: f32) -> Self {
        ValueEstimatorConfig::Gae { gamma, lmbda }
    }

    pub fn td0(gamma: f32) -> Self {
        ValueEstimatorConfig::TD0 { gamma }
    }

    pub fn gamma(&self) -> f32 {
        match *self {
            ValueEstimatorConfig::Gae { gamma, .. } | ValueEstimatorConfig::TD0 { gamma } => gamma,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("gamma", self.gamma() as f64, 0.0, 1.0)?;
        if let ValueEstimatorConfig::Gae { lmbda, .. } = *self {
            check_range("lmbda", lmbda as f64, 0.0, 1.0)?;
        }
        Ok(())
    }
}

/// Keys an estimator writes its outputs under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatorKeys {
    pub advantage: String,
    pub value_target: String,
    pub value: String,
}

impl EstimatorKeys {
    pub fn new(
        advantage: impl Into<String>,
        value_target: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            advantage: advantage.into(),
            value_target: value_target.into(),
            value: value.into(),
        }
    }
}

/// Produces advantages and value targets for one reward channel.
pub trait ValueEstimator<B: Backend, C: ValueCritic<B>> {
    /// Output keys written by [`estimate`](Self::estimate).
    fn keys(&self) -> &EstimatorKeys;

    /// Write advantage, value target and detached value prediction into
    /// `batch`.
    fn estimate(&self, batch: &mut ChannelBatch<B>, critic: &C) -> Result<(), LossError>;

    /// Move the target snapshot towards `online`.
    fn sync_target(&mut self, online: &C, tau: f32);

    /// Current target snapshot.
    fn target(&self) -> &C;
}

/// Estimator bootstrapping from an owned target critic.
#[derive(Debug)]
pub struct TargetValueEstimator<B: Backend, C: ValueCritic<B>> {
    config: ValueEstimatorConfig,
    keys: EstimatorKeys,
    target: C,
    _backend: PhantomData<B>,
}

impl<B: Backend, C: ValueCritic<B>> TargetValueEstimator<B, C> {
    /// Create an estimator whose target starts as a copy of `critic`.
    pub fn new(config: ValueEstimatorConfig, keys: EstimatorKeys, critic: &C) -> Self {
        Self {
            config,
            keys,
            target: detached_copy(critic),
            _backend: PhantomData,
        }
    }

    pub fn config(&self) -> &ValueEstimatorConfig {
        &self.config
    }
}

impl<B: Backend, C: ValueCritic<B>> ValueEstimator<B, C> for TargetValueEstimator<B, C> {
    fn keys(&self) -> &EstimatorKeys {
        &self.keys
    }

    fn estimate(&self, batch: &mut ChannelBatch<B>, critic: &C) -> Result<(), LossError> {
        let n = batch.len();
        let device = batch.device();

        let values = critic.values(batch.observations.clone()).detach();
        let next_values = self.target.values(batch.next_observations.clone()).detach();
        for (key, t) in [(self.keys.value.as_str(), &values), ("next_value", &next_values)] {
            if t.dims() != [n] {
                return Err(LossError::shape_mismatch(key, &[n], &t.dims()));
            }
        }

        let rewards = to_vec(batch.rewards.clone());
        let v = to_vec(values.clone());
        let v_next = to_vec(next_values);

        let (advantages, targets) = match self.config {
            ValueEstimatorConfig::Gae { gamma, lmbda } => compute_gae(
                &rewards,
                &v,
                &v_next,
                &batch.terminated,
                &batch.truncated,
                gamma,
                lmbda,
            ),
            ValueEstimatorConfig::TD0 { gamma } => {
                compute_td0(&rewards, &v, &v_next, &batch.terminated, gamma)
            }
        };

        batch.insert(
            self.keys.advantage.clone(),
            Tensor::from_floats(advantages.as_slice(), &device),
        );
        batch.insert(
            self.keys.value_target.clone(),
            Tensor::from_floats(targets.as_slice(), &device),
        );
        batch.insert(self.keys.value.clone(), values);
        Ok(())
    }

    fn sync_target(&mut self, online: &C, tau: f32) {
        let target = self.target.clone();
        self.target = soft_update(online, target, tau);
    }

    fn target(&self) -> &C {
        &self.target
    }
}
