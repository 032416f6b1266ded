//! Episode cost accounting for the dual update.
//!
//! [`ConstraintTracker`] accumulates the cost channel per environment and
//! closes an episode whenever its terminated or truncated flag is set. The
//! average violation fed to the Lagrange multiplier is
//!
//! ```text
//! avg_violation = mean(completed episode cost) - cost_limit
//! ```
//!
//! Episodes still running at the end of a rollout carry their partial cost
//! into the next rollout and are not counted until they finish.

/// Per-environment episode cost tracker.
#[derive(Debug, Clone)]
pub struct ConstraintTracker {
    cost_limit: f32,
    running: Vec<f32>,
    running_reward: Vec<f32>,
    completed_costs: Vec<f32>,
    completed_rewards: Vec<f32>,
}

impl ConstraintTracker {
    /// Create a tracker for `n_envs` parallel environments.
    pub fn new(n_envs: usize, cost_limit: f32) -> Self {
        let n_envs = n_envs.max(1);
        Self {
            cost_limit,
            running: vec![0.0; n_envs],
            running_reward: vec![0.0; n_envs],
            completed_costs: Vec::new(),
            completed_rewards: Vec::new(),
        }
    }

    pub fn n_envs(&self) -> usize {
        self.running.len()
    }

    pub fn cost_limit(&self) -> f32 {
        self.cost_limit
    }

    /// Record one vectorized environment step.
    ///
    /// Slices are indexed by environment; extra entries beyond `n_envs` are
    /// ignored.
    pub fn record_step(&mut self, rewards: &[f32], costs: &[f32], dones: &[bool]) {
        for env in 0..self.n_envs() {
            let reward = rewards.get(env).copied().unwrap_or(0.0);
            let cost = costs.get(env).copied().unwrap_or(0.0);
            self.running[env] += cost;
            self.running_reward[env] += reward;

            if dones.get(env).copied().unwrap_or(false) {
                self.completed_costs.push(self.running[env]);
                self.completed_rewards.push(self.running_reward[env]);
                self.running[env] = 0.0;
                self.running_reward[env] = 0.0;
            }
        }
    }

    /// Record a whole rollout stored step-major: transition `i` belongs to
    /// environment `i % n_envs`.
    pub fn record_rollout(&mut self, rewards: &[f32], costs: &[f32], dones: &[bool]) {
        let n_envs = self.n_envs();
        let steps = costs.len().min(dones.len()) / n_envs;
        for step in 0..steps {
            let range = step * n_envs..(step + 1) * n_envs;
            let r = rewards.get(range.clone()).unwrap_or(&[]);
            self.record_step(r, &costs[range.clone()], &dones[range]);
        }
    }

    /// Number of episodes completed since the last reset.
    pub fn completed_episodes(&self) -> usize {
        self.completed_costs.len()
    }

    /// Mean cost of completed episodes, `None` before the first one ends.
    pub fn mean_episode_cost(&self) -> Option<f32> {
        mean(&self.completed_costs)
    }

    /// Mean undiscounted return of completed episodes.
    pub fn mean_episode_reward(&self) -> Option<f32> {
        mean(&self.completed_rewards)
    }

    /// Mean episode cost above the limit. `None` until an episode completes.
    pub fn avg_violation(&self) -> Option<f32> {
        self.mean_episode_cost().map(|c| c - self.cost_limit)
    }

    /// Forget completed episodes. Running episode costs are kept.
    pub fn reset(&mut self) {
        self.completed_costs.clear();
        self.completed_rewards.clear();
    }
}

fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f32>() / values.len() as f32)
    }
}
