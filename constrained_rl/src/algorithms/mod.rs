//! Algorithm components for constrained PPO.
//!
//! - `gae`: Generalized Advantage Estimation and one-step TD targets
//! - `policy_loss`: Clipped surrogate, penalized actor loss, critic regression
//! - `action_policy`: Action distributions and the actor interface
//! - `critic`: State-value critic interface
//! - `value_estimator`: Per-channel advantage estimators with target critics
//! - `ppo_lag`: Lagrange multiplier and the PPO-Lag loss

pub mod action_policy;
pub mod critic;
pub mod gae;
pub mod policy_loss;
pub mod ppo_lag;
pub mod value_estimator;

#[cfg(test)]
pub(crate) mod tests;

pub use action_policy::{
    ActionDistribution, CategoricalDistribution, DiagGaussianDistribution, StochasticActor,
};
pub use critic::ValueCritic;
pub use gae::{compute_gae, compute_td0};
pub use policy_loss::{
    clip_bounds, clipped_surrogate_gain, distance_loss, importance_weighted_gain,
    lagrangian_actor_loss, log_weight, normalize_advantage, normalize_advantages, DistanceLoss,
};
pub use ppo_lag::{
    LagrangeConfig, NaiveLagrange, PPOLagConfig, PPOLagKeys, PPOLagLoss, PPOLagLossOutput,
    PPOLagOptimizers,
};
pub use value_estimator::{
    EstimatorKeys, TargetValueEstimator, ValueEstimator, ValueEstimatorConfig,
};
