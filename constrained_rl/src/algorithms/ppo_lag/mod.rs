//! PPO with a Lagrangian cost constraint.
//!
//! - `lagrange`: softplus-parameterized dual variable
//! - `config`: loss and multiplier configuration
//! - `loss`: dual-objective actor/critic loss and its gradient step

pub mod config;
pub mod lagrange;
pub mod loss;

#[cfg(test)]
mod tests;

pub use config::{LagrangeConfig, PPOLagConfig, PPOLagKeys};
pub use lagrange::{inv_softplus, softplus_scalar, NaiveLagrange};
pub use loss::{PPOLagLoss, PPOLagLossOutput, PPOLagOptimizers};
