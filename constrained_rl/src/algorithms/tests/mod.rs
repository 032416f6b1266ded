//! Tests for the algorithms module.
//!
//! - `fixtures`: Small deterministic actors, critics and batches
//! - `gae_tests`: Advantage estimation edge cases
//! - `policy_loss_tests`: Surrogate, penalized actor loss and critic regression
