//! Configuration for the PPO-Lag optimisation phase.

use serde::{Deserialize, Serialize};

use crate::core::error::{check_range, ConfigError};
use crate::scheduling::LRSchedule;

/// When the Lagrange multiplier is stepped during an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DualUpdateCadence {
    /// Once, on the first minibatch of the iteration.
    #[default]
    PerIteration,
    /// On the first minibatch of every epoch.
    PerEpoch,
    /// On every minibatch.
    PerMinibatch,
    /// Never; λ stays at its initial value.
    Never,
}

impl DualUpdateCadence {
    /// Whether minibatch `minibatch` of epoch `epoch` carries a dual update.
    pub fn is_due(self, epoch: usize, minibatch: usize) -> bool {
        match self {
            DualUpdateCadence::PerIteration => epoch == 0 && minibatch == 0,
            DualUpdateCadence::PerEpoch => minibatch == 0,
            DualUpdateCadence::PerMinibatch => true,
            DualUpdateCadence::Never => false,
        }
    }
}

/// Learner settings for one outer training iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Passes over the rollout per iteration.
    pub n_epochs: usize,
    /// Transitions per minibatch; the last minibatch may be shorter.
    pub minibatch_size: usize,
    /// Base learning rate for the actor and both critics.
    pub lr: f64,
    /// Learning rate of the multiplier. Falls back to the scheduled `lr`.
    pub lagrangian_lr: Option<f64>,
    /// Gradient norm clip applied by the optimizers.
    pub max_grad_norm: Option<f32>,
    pub dual_update: DualUpdateCadence,
    /// Polyak factor used to sync the target critics after each iteration.
    pub target_tau: f32,
    pub lr_schedule: LRSchedule,
    /// Seed for minibatch ordering.
    pub seed: u64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            n_epochs: 10,
            minibatch_size: 64,
            lr: 3e-4,
            lagrangian_lr: None,
            max_grad_norm: None,
            dual_update: DualUpdateCadence::PerIteration,
            target_tau: 1.0,
            lr_schedule: LRSchedule::Constant,
            seed: 0,
        }
    }
}

impl LearnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_epochs(mut self, n_epochs: usize) -> Self {
        self.n_epochs = n_epochs;
        self
    }

    pub fn with_minibatch_size(mut self, minibatch_size: usize) -> Self {
        self.minibatch_size = minibatch_size;
        self
    }

    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    pub fn with_lagrangian_lr(mut self, lagrangian_lr: f64) -> Self {
        self.lagrangian_lr = Some(lagrangian_lr);
        self
    }

    pub fn with_max_grad_norm(mut self, max_grad_norm: f32) -> Self {
        self.max_grad_norm = Some(max_grad_norm);
        self
    }

    pub fn with_dual_update(mut self, dual_update: DualUpdateCadence) -> Self {
        self.dual_update = dual_update;
        self
    }

    pub fn with_target_tau(mut self, target_tau: f32) -> Self {
        self.target_tau = target_tau;
        self
    }

    pub fn with_lr_schedule(mut self, lr_schedule: LRSchedule) -> Self {
        self.lr_schedule = lr_schedule;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_epochs == 0 {
            return Err(ConfigError::InvalidCount {
                field: "n_epochs",
                value: self.n_epochs,
            });
        }
        if self.minibatch_size == 0 {
            return Err(ConfigError::InvalidCount {
                field: "minibatch_size",
                value: self.minibatch_size,
            });
        }
        check_range("lr", self.lr, 0.0, f64::MAX)?;
        if let Some(lr) = self.lagrangian_lr {
            check_range("lagrangian_lr", lr, 0.0, f64::MAX)?;
        }
        if let Some(norm) = self.max_grad_norm {
            if !(norm > 0.0) || !norm.is_finite() {
                return Err(ConfigError::OutOfRange {
                    field: "max_grad_norm",
                    value: norm as f64,
                    min: f64::MIN_POSITIVE,
                    max: f64::MAX,
                });
            }
        }
        check_range("target_tau", self.target_tau as f64, 0.0, 1.0)?;
        self.lr_schedule.validate()
    }
}
