//! Tests for the PPO-Lag loss.
//!
//! Most tests use a uniform categorical actor whose log-probabilities equal
//! the behavior log-probabilities, so the log importance weight is exactly
//! zero and the surrogate reduces to the raw advantages.

use burn::backend::{Autodiff, NdArray};
use burn::optim::{AdamConfig, SgdConfig};
use burn::tensor::{ElementConversion, Tensor};

use super::config::{LagrangeConfig, PPOLagConfig, PPOLagKeys};
use super::lagrange::NaiveLagrange;
use super::loss::{PPOLagLoss, PPOLagOptimizers};
use crate::algorithms::critic::ValueCritic;
use crate::algorithms::policy_loss::DistanceLoss;
use crate::algorithms::tests::fixtures::{
    make_batch, FixedEstimator, LinearCategoricalActor, LinearCritic,
};
use crate::algorithms::value_estimator::{ValueEstimator, ValueEstimatorConfig};
use crate::core::batch::to_vec;
use crate::core::error::{ConfigError, LossError};

type B = Autodiff<NdArray<f32>>;

const OBS_DIM: usize = 3;
const N_ACTIONS: usize = 3;

type FixedLoss = PPOLagLoss<B, LinearCategoricalActor<B>, LinearCritic<B>, FixedEstimator<B, LinearCritic<B>>>;

fn scalar(t: &Tensor<B, 1>) -> f32 {
    t.clone().into_scalar().elem::<f32>()
}

/// Loss with preset advantages/targets and zero-valued critics.
fn fixed_loss(
    lambda: f32,
    r_adv: Vec<f32>,
    c_adv: Vec<f32>,
    r_target: Vec<f32>,
    c_target: Vec<f32>,
    config: PPOLagConfig,
) -> FixedLoss {
    let device = Default::default();
    let critic = LinearCritic::constant(OBS_DIM, 0.0, &device);
    let safe_critic = LinearCritic::constant(OBS_DIM, 0.0, &device);
    let r_est = FixedEstimator::new(config.keys.reward(), r_adv, r_target, critic.clone());
    let c_est = FixedEstimator::new(config.keys.cost(), c_adv, c_target, safe_critic.clone());

    PPOLagLoss::new(
        LinearCategoricalActor::uniform(OBS_DIM, N_ACTIONS, &device),
        critic,
        safe_critic,
        NaiveLagrange::new(lambda, 0.0, &device),
        r_est,
        c_est,
        config,
    )
    .unwrap()
}

fn batch4() -> crate::core::batch::RolloutBatch<B> {
    make_batch(&[1.0, 0.0, 0.5, 0.0], &[0.0, 1.0, 0.0, 0.0], OBS_DIM, N_ACTIONS, &Default::default())
}

// ============================================================================
// Actor loss scenarios
// ============================================================================

/// adv_r = [1, -1, 2, -2], adv_c = 0, ratio = 1, λ ≈ 0
/// loss_pi = mean(-[1, -1, 2, -2]) / 1 = 0
#[test]
fn test_actor_loss_zero_lambda_scenario() {
    let loss = fixed_loss(
        1e-6,
        vec![1.0, -1.0, 2.0, -2.0],
        vec![0.0; 4],
        vec![0.0; 4],
        vec![0.0; 4],
        PPOLagConfig::default(),
    );
    let out = loss.forward(&batch4(), false).unwrap();
    assert!(scalar(&out.loss_pi).abs() < 1e-5, "got {}", scalar(&out.loss_pi));
}

/// Same batch with λ = 1 and adv_c = 1:
/// mean(-[1, -1, 2, -2] + [1, 1, 1, 1]) / 2 = mean([0, 2, -1, 3]) / 2 = 0.5
#[test]
fn test_actor_loss_unit_lambda_scenario() {
    let loss = fixed_loss(
        1.0,
        vec![1.0, -1.0, 2.0, -2.0],
        vec![1.0; 4],
        vec![0.0; 4],
        vec![0.0; 4],
        PPOLagConfig::default(),
    );
    let out = loss.forward(&batch4(), false).unwrap();
    assert!((out.lagrangian - 1.0).abs() < 1e-5);
    assert!((scalar(&out.loss_pi) - 0.5).abs() < 1e-5, "got {}", scalar(&out.loss_pi));
}

#[test]
fn test_cost_advantage_shape_mismatch() {
    let loss = fixed_loss(
        1.0,
        vec![1.0; 4],
        vec![1.0; 3],
        vec![0.0; 4],
        vec![0.0; 4],
        PPOLagConfig::default(),
    );
    let err = loss.forward(&batch4(), false).unwrap_err();
    assert_eq!(err, LossError::shape_mismatch("c_advantage", &[4], &[3]));
}

#[test]
fn test_missing_advantage_is_reported() {
    let loss = fixed_loss(1.0, vec![], vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], PPOLagConfig::default());
    let err = loss.forward(&batch4(), false).unwrap_err();
    assert_eq!(err, LossError::missing("r_advantage"));
}

#[test]
fn test_missing_value_target_is_reported() {
    let loss = fixed_loss(1.0, vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], vec![], PPOLagConfig::default());
    let err = loss.forward(&batch4(), false).unwrap_err();
    assert_eq!(err, LossError::missing("c_value_target"));
}

#[test]
fn test_dual_update_requires_violation() {
    let loss = fixed_loss(1.0, vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], PPOLagConfig::default());
    let err = loss.forward(&batch4(), true).unwrap_err();
    assert_eq!(err, LossError::missing("avg_violation"));

    // Not needed when no dual update is requested.
    assert!(loss.forward(&batch4(), false).is_ok());
}

#[test]
fn test_empty_violation_is_rejected() {
    let device = Default::default();
    let loss = fixed_loss(1.0, vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], PPOLagConfig::default());
    let batch = batch4().with_avg_violation_tensor(Tensor::from_floats([0.0f32; 0], &device));

    let err = loss.forward(&batch, true).unwrap_err();
    assert!(matches!(err, LossError::InvalidBatch { .. }), "{:?}", err);

    // Ignored when no dual update is requested.
    assert!(loss.forward(&batch, false).is_ok());
}

#[test]
fn test_multi_column_actions_rejected() {
    let device = Default::default();
    let loss = fixed_loss(1.0, vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], PPOLagConfig::default());
    let mut batch = batch4();
    batch.actions = Tensor::zeros([4, 2], &device);
    assert!(batch.validate().is_ok());

    let err = loss.forward(&batch, false).unwrap_err();
    assert_eq!(err, LossError::shape_mismatch("actions", &[4, 1], &[4, 2]));
}

#[test]
fn test_out_of_range_action_rejected() {
    let device = Default::default();
    let loss = fixed_loss(1.0, vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], PPOLagConfig::default());
    let mut batch = batch4();
    batch.actions = Tensor::<B, 1>::from_floats([0.0, 1.0, N_ACTIONS as f32, 2.0], &device).reshape([4, 1]);

    let err = loss.forward(&batch, false).unwrap_err();
    assert!(matches!(err, LossError::InvalidBatch { .. }), "{:?}", err);
}

// ============================================================================
// Output mapping
// ============================================================================

#[test]
fn test_output_keys_follow_flags() {
    let loss = fixed_loss(0.5, vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], PPOLagConfig::default());
    let batch = batch4().with_avg_violation(0.3);

    let full = loss.forward(&batch, true).unwrap();
    assert_eq!(
        full.keys(),
        vec![
            "lagrangian",
            "loss_lagrangian",
            "loss_pi",
            "loss_entropy",
            "entropy",
            "loss_r_critic",
            "loss_c_critic"
        ]
    );
    assert_eq!(full.scalars().len(), 7);

    let no_entropy = fixed_loss(
        0.5,
        vec![0.0; 4],
        vec![0.0; 4],
        vec![0.0; 4],
        vec![0.0; 4],
        PPOLagConfig::default().with_entropy_bonus(false),
    );
    let lean = no_entropy.forward(&batch, false).unwrap();
    assert_eq!(
        lean.keys(),
        vec!["lagrangian", "loss_pi", "entropy", "loss_r_critic", "loss_c_critic"]
    );
    // Entropy is still reported.
    assert!((lean.entropy - (N_ACTIONS as f32).ln()).abs() < 1e-5);
}

/// λ = 0.5, violation = 0.3: loss_lagrangian = -0.5 * 0.3 = -0.15
/// uniform over 3 actions: loss_entropy = -0.01 * ln 3
#[test]
fn test_dual_and_entropy_terms() {
    let loss = fixed_loss(0.5, vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], PPOLagConfig::default());
    let out = loss.forward(&batch4().with_avg_violation(0.3), true).unwrap();
    let s = out.scalars();
    assert!((s["loss_lagrangian"] + 0.15).abs() < 1e-5);
    assert!((s["loss_entropy"] + 0.01 * 3f32.ln()).abs() < 1e-6);
    assert!((s["lagrangian"] - 0.5).abs() < 1e-5);
}

/// Critics predict 0; targets [0.5, 2, -3, 0]
/// smooth L1: [0.125, 1.5, 2.5, 0] → mean 1.03125
/// L2:        [0.25, 4, 9, 0]      → mean 3.3125, × critic_coef 0.5 = 1.65625
#[test]
fn test_critic_losses_are_independent() {
    let targets = vec![0.5, 2.0, -3.0, 0.0];
    let loss = fixed_loss(1.0, vec![0.0; 4], vec![0.0; 4], targets.clone(), vec![0.0; 4], PPOLagConfig::default());
    let out = loss.forward(&batch4(), false).unwrap();
    assert!((scalar(&out.loss_r_critic) - 1.03125).abs() < 1e-5);
    assert!(scalar(&out.loss_c_critic).abs() < 1e-6);

    let config = PPOLagConfig::default()
        .with_loss_critic_type(DistanceLoss::L2)
        .with_critic_coef(0.5);
    let loss = fixed_loss(1.0, vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], targets, config);
    let out = loss.forward(&batch4(), false).unwrap();
    assert!(scalar(&out.loss_r_critic).abs() < 1e-6);
    assert!((scalar(&out.loss_c_critic) - 1.65625).abs() < 1e-5);
}

/// With normalization, adv_r = [1, 2, 3, 4] becomes (a - 2.5) / 1.291
/// which sums to zero, so loss_pi = 0 at ratio 1 and λ ≈ 0.
#[test]
fn test_normalized_advantages_center_the_surrogate() {
    let loss = fixed_loss(
        1e-6,
        vec![1.0, 2.0, 3.0, 4.0],
        vec![5.0; 4],
        vec![0.0; 4],
        vec![0.0; 4],
        PPOLagConfig::default().with_normalize_advantage(true),
    );
    let out = loss.forward(&batch4(), false).unwrap();
    assert!(scalar(&out.loss_pi).abs() < 1e-5);
}

#[test]
fn test_caller_batch_untouched() {
    let loss = fixed_loss(1.0, vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], PPOLagConfig::default());
    let batch = batch4();
    let rewards_before = to_vec(batch.rewards.clone());
    loss.forward(&batch, false).unwrap();

    for key in ["r_advantage", "c_advantage", "r_value_target", "c_value", "r_value"] {
        assert!(!batch.contains(key), "batch gained '{}'", key);
    }
    assert_eq!(to_vec(batch.rewards.clone()), rewards_before);
}

#[test]
fn test_estimator_keys_must_match_config() {
    let device = Default::default();
    let config = PPOLagConfig::default();
    let critic = LinearCritic::<B>::constant(OBS_DIM, 0.0, &device);
    let wrong_keys = PPOLagKeys {
        c_advantage: "cost_adv".into(),
        ..PPOLagKeys::default()
    };
    let r_est = FixedEstimator::new(config.keys.reward(), vec![], vec![], critic.clone());
    let c_est = FixedEstimator::new(wrong_keys.cost(), vec![], vec![], critic.clone());

    let result = PPOLagLoss::new(
        LinearCategoricalActor::uniform(OBS_DIM, N_ACTIONS, &device),
        critic.clone(),
        critic,
        NaiveLagrange::new(1.0, 0.0, &device),
        r_est,
        c_est,
        config,
    );
    assert!(matches!(
        result,
        Err(ConfigError::InvalidValue { field: "c_estimator", .. })
    ));
}

// ============================================================================
// Gradient steps
// ============================================================================

#[test]
fn test_dual_step_only_when_requested() {
    let mut loss = fixed_loss(1.0, vec![1.0; 4], vec![1.0; 4], vec![1.0; 4], vec![1.0; 4], PPOLagConfig::default());
    let mut optimizers = PPOLagOptimizers {
        actor: SgdConfig::new().init::<B, LinearCategoricalActor<B>>(),
        critic: SgdConfig::new().init::<B, LinearCritic<B>>(),
        safe_critic: SgdConfig::new().init::<B, LinearCritic<B>>(),
        lagrange: SgdConfig::new().init::<B, NaiveLagrange<B>>(),
    };
    let batch = batch4().with_avg_violation(2.0);

    let before = loss.lagrange().current_value();
    let out = loss.forward(&batch, false).unwrap();
    loss.apply_gradients(out, &mut optimizers, 0.1, 0.1);
    assert_eq!(loss.lagrange().current_value(), before);

    let out = loss.forward(&batch, true).unwrap();
    loss.apply_gradients(out, &mut optimizers, 0.1, 0.1);
    assert!(loss.lagrange().current_value() > before);
}

/// Critics predict 0 against targets 2 and -2: one step must reduce both errors.
#[test]
fn test_critic_step_reduces_regression_error() {
    let mut loss = fixed_loss(1.0, vec![0.0; 4], vec![0.0; 4], vec![2.0; 4], vec![-2.0; 4], PPOLagConfig::default());
    let mut optimizers = PPOLagOptimizers {
        actor: AdamConfig::new().init::<B, LinearCategoricalActor<B>>(),
        critic: AdamConfig::new().init::<B, LinearCritic<B>>(),
        safe_critic: AdamConfig::new().init::<B, LinearCritic<B>>(),
        lagrange: AdamConfig::new().init::<B, NaiveLagrange<B>>(),
    };
    let batch = batch4();

    let first = loss.forward(&batch, false).unwrap();
    let (r0, c0) = (scalar(&first.loss_r_critic), scalar(&first.loss_c_critic));
    loss.apply_gradients(first, &mut optimizers, 0.05, 0.0);

    let second = loss.forward(&batch, false).unwrap();
    assert!(scalar(&second.loss_r_critic) < r0);
    assert!(scalar(&second.loss_c_critic) < c0);
}

// ============================================================================
// Target estimators
// ============================================================================

#[test]
fn test_target_estimators_end_to_end() {
    let device = Default::default();
    let critic = LinearCritic::<B>::new(OBS_DIM, &device);
    let safe_critic = LinearCritic::<B>::new(OBS_DIM, &device);
    let mut loss = PPOLagLoss::with_target_estimators(
        LinearCategoricalActor::new(OBS_DIM, N_ACTIONS, &device),
        critic,
        safe_critic,
        LagrangeConfig::new().with_cost_limit(0.1).init(&device),
        ValueEstimatorConfig::gae(0.99, 0.95),
        PPOLagConfig::default().with_normalize_advantage(true),
    )
    .unwrap();

    let out = loss
        .forward(&batch4().with_avg_violation(0.4), true)
        .unwrap();
    for (key, value) in out.scalars() {
        assert!(value.is_finite(), "{} = {}", key, value);
    }

    // Hard sync: target predictions equal the live critics.
    loss.sync_targets(1.0);
    let obs = batch4().observations;
    let live = to_vec(loss.critic().values(obs.clone()));
    let target = to_vec(loss.r_estimator().target().values(obs.clone()));
    for (l, t) in live.iter().zip(target.iter()) {
        assert!((l - t).abs() < 1e-6);
    }
    let live = to_vec(loss.safe_critic().values(obs.clone()));
    let target = to_vec(loss.c_estimator().target().values(obs));
    for (l, t) in live.iter().zip(target.iter()) {
        assert!((l - t).abs() < 1e-6);
    }
}

/// Zero critics and γ = 0.5 bootstrapping from zero: value targets equal the
/// per-channel rewards, so L2 critic losses are r² and c².
#[test]
fn test_reward_and_cost_channels_reach_their_own_critic() {
    let device = Default::default();
    let loss = PPOLagLoss::with_target_estimators(
        LinearCategoricalActor::uniform(OBS_DIM, N_ACTIONS, &device),
        LinearCritic::<B>::constant(OBS_DIM, 0.0, &device),
        LinearCritic::<B>::constant(OBS_DIM, 0.0, &device),
        NaiveLagrange::new(1.0, 0.0, &device),
        ValueEstimatorConfig::td0(0.5),
        PPOLagConfig::default()
            .with_loss_critic_type(DistanceLoss::L2)
            .with_critic_coef(1.0),
    )
    .unwrap();
    let batch = make_batch(&[1.0; 4], &[3.0; 4], OBS_DIM, N_ACTIONS, &device);

    let out = loss.forward(&batch, false).unwrap();

    assert!((scalar(&out.loss_r_critic) - 1.0).abs() < 1e-5);
    assert!((scalar(&out.loss_c_critic) - 9.0).abs() < 1e-5);
    // ratio = 1, λ = 1: loss_pi = (1 * 3 - 1) / 2
    assert!((scalar(&out.loss_pi) - 1.0).abs() < 1e-5);
}

#[test]
fn test_invalid_estimator_config_rejected() {
    let device = Default::default();
    let critic = LinearCritic::<B>::new(OBS_DIM, &device);
    let result = PPOLagLoss::with_target_estimators(
        LinearCategoricalActor::new(OBS_DIM, N_ACTIONS, &device),
        critic.clone(),
        critic,
        NaiveLagrange::new(1.0, 0.0, &device),
        ValueEstimatorConfig::gae(1.5, 0.95),
        PPOLagConfig::default(),
    );
    assert!(matches!(result, Err(ConfigError::OutOfRange { field: "gamma", .. })));
}

// ============================================================================
// Property-Based Tests with Proptest
// ============================================================================

mod proptest_ppo_lag {
    use super::*;
    use crate::algorithms::policy_loss::{
        clip_bounds, clipped_surrogate_gain_scalar, lagrangian_actor_loss_scalar,
        normalize_advantage,
    };
    use proptest::prelude::*;

    proptest! {
        /// Property: λ = softplus(raw) is strictly positive for finite raw.
        #[test]
        fn test_multiplier_always_positive(raw in -30.0f32..30.0) {
            let device = Default::default();
            let lag = NaiveLagrange::<B>::from_raw(raw, 0.0, &device);
            prop_assert!(lag.current_value() > 0.0);
        }

        /// Property: the surrogate gain never exceeds either the unclipped or
        /// the clipped term, whatever the sign of the advantage.
        #[test]
        fn test_clipped_gain_is_pessimistic(
            lw in -5.0f32..5.0,
            adv in -10.0f32..10.0,
            eps in 0.01f32..0.99,
        ) {
            let (low, high) = clip_bounds(eps);
            let gain = clipped_surrogate_gain_scalar(lw, adv, (low, high));
            let unclipped = lw.exp() * adv;
            let clipped = lw.clamp(low, high).exp() * adv;
            prop_assert!(gain <= unclipped + 1e-4 * unclipped.abs().max(1.0));
            prop_assert!(gain <= clipped + 1e-4 * clipped.abs().max(1.0));
        }

        /// Property: the actor loss is finite for finite inputs.
        #[test]
        fn test_actor_loss_finite(
            gains in prop::collection::vec((-1e3f32..1e3, -1e3f32..1e3), 1..16),
            lambda in 0.0f32..1e3,
        ) {
            let (r, c): (Vec<f32>, Vec<f32>) = gains.into_iter().unzip();
            let loss = lagrangian_actor_loss_scalar(&r, &c, lambda);
            prop_assert!(loss.is_finite());
        }

        /// Property: normalization yields mean 0 and unbiased std 1.
        #[test]
        fn test_normalization_standardizes(
            adv in prop::collection::vec(-100.0f32..100.0, 2..32),
        ) {
            let n = adv.len() as f32;
            let mean = adv.iter().sum::<f32>() / n;
            let var = adv.iter().map(|a| (a - mean).powi(2)).sum::<f32>() / (n - 1.0);
            prop_assume!(var.sqrt() > 1e-2);

            let device = Default::default();
            let out = to_vec(normalize_advantage(Tensor::<B, 1>::from_floats(adv.as_slice(), &device)));
            let m = out.iter().sum::<f32>() / n;
            let s = (out.iter().map(|a| (a - m).powi(2)).sum::<f32>() / (n - 1.0)).sqrt();
            prop_assert!(m.abs() < 1e-3, "mean {}", m);
            prop_assert!((s - 1.0).abs() < 1e-3, "std {}", s);
        }
    }

    #[test]
    fn test_normalization_single_element_noop() {
        let device = Default::default();
        let out = to_vec(normalize_advantage(Tensor::<B, 1>::from_floats([7.5], &device)));
        assert_eq!(out, vec![7.5]);
    }

    #[test]
    fn test_edge_batches_finite() {
        // single transition, zero advantage, λ near 0
        for (adv, lambda) in [(vec![0.0], 1e-6), (vec![3.0], 1e-6), (vec![0.0, 0.0], 0.0)] {
            let loss = lagrangian_actor_loss_scalar(&adv, &adv, lambda);
            assert!(loss.is_finite());
        }
    }
}
