//! Configuration for the Lagrange multiplier and the PPO-Lag loss.

use serde::{Deserialize, Serialize};

use crate::algorithms::policy_loss::DistanceLoss;
use crate::algorithms::value_estimator::EstimatorKeys;
use crate::core::error::{check_range, ConfigError};

/// Lagrange multiplier configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LagrangeConfig {
    /// Starting multiplier value, must be > 0.
    pub initial_value: f32,
    /// Episode cost budget. Stored with the multiplier and consumed by the
    /// violation computation, not by the loss.
    pub cost_limit: f32,
}

impl Default for LagrangeConfig {
    fn default() -> Self {
        Self {
            initial_value: 1.0,
            cost_limit: 0.0,
        }
    }
}

impl LagrangeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_value(mut self, initial_value: f32) -> Self {
        self.initial_value = initial_value;
        self
    }

    pub fn with_cost_limit(mut self, cost_limit: f32) -> Self {
        self.cost_limit = cost_limit;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_value > 0.0) || !self.initial_value.is_finite() {
            return Err(ConfigError::OutOfRange {
                field: "initial_value",
                value: self.initial_value as f64,
                min: f64::MIN_POSITIVE,
                max: f64::INFINITY,
            });
        }
        if !self.cost_limit.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "cost_limit",
                reason: format!("must be finite, got {}", self.cost_limit),
            });
        }
        Ok(())
    }
}

/// Batch keys read by the loss after estimation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PPOLagKeys {
    pub r_advantage: String,
    pub c_advantage: String,
    pub r_value: String,
    pub c_value: String,
    pub r_value_target: String,
    pub c_value_target: String,
}

impl Default for PPOLagKeys {
    fn default() -> Self {
        Self {
            r_advantage: "r_advantage".into(),
            c_advantage: "c_advantage".into(),
            r_value: "r_value".into(),
            c_value: "c_value".into(),
            r_value_target: "r_value_target".into(),
            c_value_target: "c_value_target".into(),
        }
    }
}

impl PPOLagKeys {
    /// Keys the reward estimator must write under.
    pub fn reward(&self) -> EstimatorKeys {
        EstimatorKeys::new(&self.r_advantage, &self.r_value_target, &self.r_value)
    }

    /// Keys the cost estimator must write under.
    pub fn cost(&self) -> EstimatorKeys {
        EstimatorKeys::new(&self.c_advantage, &self.c_value_target, &self.c_value)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let all = [
            &self.r_advantage,
            &self.c_advantage,
            &self.r_value,
            &self.c_value,
            &self.r_value_target,
            &self.c_value_target,
        ];
        if all.iter().any(|k| k.is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "keys",
                reason: "key names must not be empty".into(),
            });
        }
        for (i, a) in all.iter().enumerate() {
            if all[i + 1..].contains(a) {
                return Err(ConfigError::InvalidValue {
                    field: "keys",
                    reason: format!("key '{}' is used for more than one field", a),
                });
            }
        }
        Ok(())
    }
}

/// PPO-Lag loss configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PPOLagConfig {
    /// Importance ratio is clipped to `[1 - eps, 1 + eps]`.
    pub clip_epsilon: f32,
    pub entropy_bonus: bool,
    pub entropy_coef: f32,
    /// Scale applied to both critic losses.
    pub critic_coef: f32,
    pub loss_critic_type: DistanceLoss,
    pub normalize_advantage: bool,
    /// Multiplies the violation in the dual loss.
    pub cost_scale: f32,
    pub keys: PPOLagKeys,
}

impl Default for PPOLagConfig {
    fn default() -> Self {
        Self {
            clip_epsilon: 0.2,
            entropy_bonus: true,
            entropy_coef: 0.01,
            critic_coef: 1.0,
            loss_critic_type: DistanceLoss::SmoothL1,
            normalize_advantage: false,
            cost_scale: 1.0,
            keys: PPOLagKeys::default(),
        }
    }
}

impl PPOLagConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clip_epsilon(mut self, clip_epsilon: f32) -> Self {
        self.clip_epsilon = clip_epsilon;
        self
    }

    pub fn with_entropy_bonus(mut self, entropy_bonus: bool) -> Self {
        self.entropy_bonus = entropy_bonus;
        self
    }

    pub fn with_entropy_coef(mut self, entropy_coef: f32) -> Self {
        self.entropy_coef = entropy_coef;
        self
    }

    pub fn with_critic_coef(mut self, critic_coef: f32) -> Self {
        self.critic_coef = critic_coef;
        self
    }

    pub fn with_loss_critic_type(mut self, loss_critic_type: DistanceLoss) -> Self {
        self.loss_critic_type = loss_critic_type;
        self
    }

    pub fn with_normalize_advantage(mut self, normalize_advantage: bool) -> Self {
        self.normalize_advantage = normalize_advantage;
        self
    }

    pub fn with_cost_scale(mut self, cost_scale: f32) -> Self {
        self.cost_scale = cost_scale;
        self
    }

    pub fn with_keys(mut self, keys: PPOLagKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let eps = self.clip_epsilon as f64;
        if !(eps > 0.0 && eps < 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "clip_epsilon",
                value: eps,
                min: 0.0,
                max: 1.0,
            });
        }
        check_range("entropy_coef", self.entropy_coef as f64, 0.0, f64::MAX)?;
        check_range("critic_coef", self.critic_coef as f64, 0.0, f64::MAX)?;
        check_range("cost_scale", self.cost_scale as f64, f64::MIN, f64::MAX)?;
        self.keys.validate()
    }
}
