//! Building blocks of the constrained PPO objective.
//!
//! Tensor functions are used for gradient computation; the `_scalar`
//! variants mirror them on plain slices for property tests and logging.
//!
//! # Numerical Stability
//!
//! The log importance weight is clamped to [-20, 20] before exp() to prevent
//! overflow. This limits ratios to approximately [2e-9, 485 million], which
//! leaves the clipped branch untouched for any practical clip epsilon.

use burn::tensor::{backend::Backend, ElementConversion, Tensor};
use serde::{Deserialize, Serialize};

/// Maximum log ratio before exp() to prevent overflow.
pub const MAX_LOG_RATIO: f32 = 20.0;

/// Floor applied to the advantage standard deviation.
pub const ADVANTAGE_STD_FLOOR: f32 = 1e-6;

/// Regression loss used by the critics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceLoss {
    /// |target - pred|
    L1,
    /// (target - pred)^2
    L2,
    /// Huber loss with beta = 1.
    #[default]
    SmoothL1,
}

/// Log-weight clip bounds for a ratio clipped to `[1 - eps, 1 + eps]`.
pub fn clip_bounds(clip_epsilon: f32) -> (f32, f32) {
    ((-clip_epsilon).ln_1p(), clip_epsilon.ln_1p())
}

/// `log π(a|s) - log π_old(a|s)`, clamped to `±MAX_LOG_RATIO`.
pub fn log_weight<B: Backend>(log_probs: Tensor<B, 1>, old_log_probs: Tensor<B, 1>) -> Tensor<B, 1> {
    (log_probs - old_log_probs).clamp(-MAX_LOG_RATIO, MAX_LOG_RATIO)
}

/// `exp(lw) * A`.
pub fn importance_weighted_gain<B: Backend>(
    log_weight: Tensor<B, 1>,
    advantage: Tensor<B, 1>,
) -> Tensor<B, 1> {
    log_weight.exp() * advantage
}

/// PPO pessimistic gain: `min(exp(lw) * A, exp(clip(lw, low, high)) * A)`.
pub fn clipped_surrogate_gain<B: Backend>(
    log_weight: Tensor<B, 1>,
    advantage: Tensor<B, 1>,
    bounds: (f32, f32),
) -> Tensor<B, 1> {
    let (low, high) = bounds;
    let unclipped = importance_weighted_gain(log_weight.clone(), advantage.clone());
    let clipped = log_weight.clamp(low, high).exp() * advantage;
    unclipped.min_pair(clipped)
}

/// Penalized actor loss: `mean(-reward_gain + λ * cost_gain) / (1 + λ)`.
///
/// `lambda` is a detached snapshot of the multiplier; no gradient reaches
/// the Lagrange parameter through this term.
pub fn lagrangian_actor_loss<B: Backend>(
    reward_gain: Tensor<B, 1>,
    cost_gain: Tensor<B, 1>,
    lambda: f32,
) -> Tensor<B, 1> {
    (cost_gain.mul_scalar(lambda) - reward_gain)
        .mean()
        .div_scalar(1.0 + lambda)
}

/// Elementwise critic regression loss.
pub fn distance_loss<B: Backend>(
    target: Tensor<B, 1>,
    prediction: Tensor<B, 1>,
    kind: DistanceLoss,
) -> Tensor<B, 1> {
    let diff = prediction - target;
    match kind {
        DistanceLoss::L1 => diff.abs(),
        DistanceLoss::L2 => diff.powf_scalar(2.0),
        DistanceLoss::SmoothL1 => {
            let abs = diff.abs();
            let quad = abs.clone().clamp_max(1.0);
            quad.clone().powf_scalar(2.0).mul_scalar(0.5) + (abs - quad)
        }
    }
}

/// Standardize an advantage tensor with the unbiased standard deviation
/// floored at [`ADVANTAGE_STD_FLOOR`]. Tensors with fewer than two elements
/// are returned unchanged.
pub fn normalize_advantage<B: Backend>(advantage: Tensor<B, 1>) -> Tensor<B, 1> {
    let n = advantage.dims()[0];
    if n <= 1 {
        return advantage;
    }
    let mean: f32 = advantage.clone().mean().into_scalar().elem();
    let var: f32 = advantage.clone().var(0).into_scalar().elem();
    let std = var.max(0.0).sqrt().max(ADVANTAGE_STD_FLOOR);
    if !std.is_finite() {
        log::warn!("advantage std is not finite, skipping normalization");
        return advantage;
    }
    advantage.sub_scalar(mean).div_scalar(std)
}

// ============================================================================
// Scalar mirrors
// ============================================================================

/// Scalar counterpart of [`clipped_surrogate_gain`] for a single transition.
pub fn clipped_surrogate_gain_scalar(log_weight: f32, advantage: f32, bounds: (f32, f32)) -> f32 {
    let lw = if log_weight.is_finite() {
        log_weight.clamp(-MAX_LOG_RATIO, MAX_LOG_RATIO)
    } else {
        0.0
    };
    let unclipped = lw.exp() * advantage;
    let clipped = lw.clamp(bounds.0, bounds.1).exp() * advantage;
    unclipped.min(clipped)
}

/// Scalar counterpart of [`lagrangian_actor_loss`].
///
/// Averages over the common prefix when the slices differ in length.
pub fn lagrangian_actor_loss_scalar(reward_gain: &[f32], cost_gain: &[f32], lambda: f32) -> f32 {
    let n = reward_gain.len().min(cost_gain.len());
    if n == 0 {
        return 0.0;
    }
    let total: f32 = reward_gain
        .iter()
        .zip(cost_gain.iter())
        .map(|(r, c)| -r + lambda * c)
        .sum();
    total / n as f32 / (1.0 + lambda)
}

/// In-place counterpart of [`normalize_advantage`].
pub fn normalize_advantages(advantages: &mut [f32]) {
    let n = advantages.len();
    if n <= 1 {
        return;
    }
    let mean = advantages.iter().sum::<f32>() / n as f32;
    let var = advantages.iter().map(|a| (a - mean).powi(2)).sum::<f32>() / (n - 1) as f32;
    let std = var.sqrt().max(ADVANTAGE_STD_FLOOR);
    for a in advantages.iter_mut() {
        *a = (*a - mean) / std;
    }
}
