//! Advantage estimation over a time-ordered batch of transitions.
//!
//! Every transition carries its own bootstrap value `V'(s')` (from the
//! target critic), so segments do not need a separate last value:
//!
//! ```text
//! δ_t = r_t + γ (1 - terminated_t) V'(s'_t) - V(s_t)
//! A_t = δ_t + γλ (1 - done_t) A_{t+1}        done = terminated ∨ truncated
//! target_t = A_t + V(s_t)
//! ```
//!
//! Truncation stops the recursion but still bootstraps from `V'(s')`;
//! termination does neither.
//!
//! ## References
//!
//! - Schulman et al., "High-Dimensional Continuous Control Using
//!   Generalized Advantage Estimation" (2016)

/// Compute GAE advantages and value targets.
///
/// # Arguments
///
/// * `rewards` - rewards of one channel [T]
/// * `values` - V(s_t) from the live critic [T]
/// * `next_values` - V'(s'_t) from the target critic [T]
/// * `terminated` - true terminal states [T]
/// * `truncated` - time-limit cut-offs [T]
///
/// # Returns
///
/// (advantages, value_targets) - both [T]
pub fn compute_gae(
    rewards: &[f32],
    values: &[f32],
    next_values: &[f32],
    terminated: &[bool],
    truncated: &[bool],
    gamma: f32,
    lmbda: f32,
) -> (Vec<f32>, Vec<f32>) {
    let n = rewards.len();
    assert_eq!(values.len(), n);
    assert_eq!(next_values.len(), n);
    assert_eq!(terminated.len(), n);
    assert_eq!(truncated.len(), n);

    let mut advantages = vec![0.0f32; n];
    let mut targets = vec![0.0f32; n];
    let mut gae = 0.0f32;

    for t in (0..n).rev() {
        let not_terminal = if terminated[t] { 0.0 } else { 1.0 };
        let not_done = if terminated[t] || truncated[t] { 0.0 } else { 1.0 };

        let delta = rewards[t] + gamma * not_terminal * next_values[t] - values[t];
        gae = delta + gamma * lmbda * not_done * gae;

        advantages[t] = gae;
        targets[t] = gae + values[t];
    }

    (advantages, targets)
}

/// One-step TD targets: `target_t = r_t + γ (1 - terminated_t) V'(s'_t)`,
/// `A_t = target_t - V(s_t)`.
pub fn compute_td0(
    rewards: &[f32],
    values: &[f32],
    next_values: &[f32],
    terminated: &[bool],
    gamma: f32,
) -> (Vec<f32>, Vec<f32>) {
    let n = rewards.len();
    assert_eq!(values.len(), n);
    assert_eq!(next_values.len(), n);
    assert_eq!(terminated.len(), n);

    let targets: Vec<f32> = (0..n)
        .map(|t| {
            let not_terminal = if terminated[t] { 0.0 } else { 1.0 };
            rewards[t] + gamma * not_terminal * next_values[t]
        })
        .collect();
    let advantages = targets.iter().zip(values).map(|(g, v)| g - v).collect();

    (advantages, targets)
}
