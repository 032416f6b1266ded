//! Training drivers for PPO-Lag.
//!
//! - [`PPOLagLearner`]: epochs × minibatches over one rollout, dual-update
//!   cadence, learning rate schedule and target critic sync
//! - [`LearnerConfig`]: optimisation settings
//! - [`create_optimizers`]: Adam optimizers for actor, critics and multiplier
//!
//! Rollout collection and environment stepping stay with the caller; the
//! caller feeds completed episodes to a
//! [`ConstraintTracker`](crate::core::ConstraintTracker) and attaches its
//! violation to the batch.

pub mod learner_config;
pub mod ppo_lag_learner;

#[cfg(test)]
mod tests;

pub use learner_config::{DualUpdateCadence, LearnerConfig};
pub use ppo_lag_learner::{create_optimizers, IterationStats, PPOLagLearner};
