//! # Constrained RL: PPO with a Lagrangian cost constraint
//!
//! PPO-Lag trains a policy to maximise reward while keeping the expected
//! episode cost under a budget. A learned multiplier λ trades the two off:
//!
//! ```text
//! ┌──────────────┐  rollout   ┌────────────────────┐  avg_violation
//! │  collector   │ ─────────► │ ConstraintTracker  │ ──────────┐
//! │ (caller)     │            └────────────────────┘           ▼
//! └──────────────┘                                   ┌─────────────────┐
//!        │ RolloutBatch (rewards [N, 2])             │  NaiveLagrange  │
//!        ▼                                           │ λ = softplus(θ) │
//! ┌──────────────────────────────────────────┐       └────────┬────────┘
//! │ PPOLagLoss                               │  λ (detached)  │
//! │  reward view ─► estimator ─► A_r, V_r^tgt│ ◄──────────────┘
//! │  cost view   ─► estimator ─► A_c, V_c^tgt│
//! │  loss_pi = (λ·ρA_c − clip(ρ)A_r) / (1+λ) │
//! │  + entropy bonus + two critic losses     │
//! └──────────────────────────────────────────┘
//!        │ PPOLagLearner: epochs × minibatches, Adam, LR schedule
//!        ▼
//!   IterationStats ─► MetricsLogger
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use constrained_rl::{
//!     create_optimizers, LagrangeConfig, LearnerConfig, PPOLagConfig, PPOLagLearner,
//!     PPOLagLoss, ValueEstimatorConfig,
//! };
//!
//! let mut loss = PPOLagLoss::with_target_estimators(
//!     actor, critic, safe_critic,
//!     LagrangeConfig::new().with_cost_limit(25.0).init(&device),
//!     ValueEstimatorConfig::gae(0.99, 0.95),
//!     PPOLagConfig::default(),
//! )?;
//! let config = LearnerConfig::new().with_n_epochs(10).with_minibatch_size(64);
//! let optimizers = create_optimizers::<B, Actor, Critic>(&config);
//! let mut learner = PPOLagLearner::new(config, optimizers)?;
//!
//! tracker.record_rollout(&rewards, &costs, &dones);
//! let batch = batch.with_avg_violation(tracker.avg_violation().unwrap_or(0.0));
//! let stats = learner.run_iteration(&mut loss, &batch)?;
//! ```

pub mod core;
pub mod algorithms;
pub mod runners;
pub mod metrics;
pub mod scheduling;

pub use core::batch::{ChannelBatch, RolloutBatch};
pub use core::constraint::ConstraintTracker;
pub use core::error::{ConfigError, LossError};

pub use algorithms::action_policy::{
    ActionDistribution, CategoricalDistribution, DiagGaussianDistribution, StochasticActor,
};
pub use algorithms::critic::ValueCritic;
pub use algorithms::policy_loss::DistanceLoss;
pub use algorithms::ppo_lag::{
    LagrangeConfig, NaiveLagrange, PPOLagConfig, PPOLagKeys, PPOLagLoss, PPOLagLossOutput,
    PPOLagOptimizers,
};
pub use algorithms::value_estimator::{
    EstimatorKeys, TargetValueEstimator, ValueEstimator, ValueEstimatorConfig,
};

pub use runners::{create_optimizers, DualUpdateCadence, IterationStats, LearnerConfig, PPOLagLearner};
pub use scheduling::{CosineCycle, LRSchedule, LRScheduler};
pub use metrics::{CSVLogger, ConsoleLogger, MetricsLogger, MultiLogger, TrainingSnapshot};
