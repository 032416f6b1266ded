//! Test suite for the runners module.
//!
//! # Test Organization
//!
//! - `config_tests`: Learner configuration builders, serde and validation
//! - `learner_tests`: Minibatch loop, dual-update cadence, target sync
