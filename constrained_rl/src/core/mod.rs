//! Core types: rollout batches, errors, constraint tracking and target networks.

pub mod batch;
pub mod constraint;
pub mod error;
pub mod target_network;

pub use batch::{
    ChannelBatch, RolloutBatch, AVG_VIOLATION_KEY, COST_CHANNEL, N_CHANNELS, REWARD_CHANNEL,
};
pub use constraint::ConstraintTracker;
pub use error::{ConfigError, LossError};
pub use target_network::{detached_copy, soft_update};
