//! Optimisation phase of one PPO-Lag training iteration.
//!
//! ```text
//! for epoch in 0..n_epochs:
//!     for segment in shuffled(contiguous minibatches of the rollout):
//!         output = loss.forward(segment, dual update due?)
//!         loss.apply_gradients(output, optimizers, lr, lagrangian_lr)
//! loss.sync_targets(target_tau)
//! ```
//!
//! Minibatches are contiguous slices so that advantage estimation inside
//! the loss still runs over time-ordered transitions. Only the order in
//! which the slices are visited is shuffled.

use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

use crate::algorithms::action_policy::StochasticActor;
use crate::algorithms::critic::ValueCritic;
use crate::algorithms::ppo_lag::{NaiveLagrange, PPOLagLoss, PPOLagOptimizers};
use crate::algorithms::value_estimator::ValueEstimator;
use crate::core::batch::RolloutBatch;
use crate::core::error::{ConfigError, LossError};
use crate::scheduling::LRScheduler;

use super::learner_config::LearnerConfig;

/// Adam optimizers for every PPO-Lag module.
///
/// Both critics share one optimizer type; gradient clipping is applied when
/// `max_grad_norm` is set.
pub fn create_optimizers<B, A, C>(
    config: &LearnerConfig,
) -> PPOLagOptimizers<
    impl Optimizer<A, B>,
    impl Optimizer<C, B>,
    impl Optimizer<NaiveLagrange<B>, B>,
>
where
    B: AutodiffBackend,
    A: AutodiffModule<B>,
    C: AutodiffModule<B>,
{
    let adam = || {
        let mut adam = AdamConfig::new().with_epsilon(1e-5);
        if let Some(max_norm) = config.max_grad_norm {
            adam = adam.with_grad_clipping(Some(GradientClippingConfig::Norm(max_norm)));
        }
        adam
    };

    PPOLagOptimizers {
        actor: adam().init::<B, A>(),
        critic: adam().init::<B, C>(),
        safe_critic: adam().init::<B, C>(),
        // Not clipped: a single scalar parameter.
        lagrange: AdamConfig::new()
            .with_epsilon(1e-5)
            .init::<B, NaiveLagrange<B>>(),
    }
}

/// Summary of one optimisation phase.
#[derive(Debug, Clone, Default)]
pub struct IterationStats {
    /// Zero-based index of the iteration.
    pub iteration: usize,
    /// Mean of every emitted scalar over the minibatches that emitted it.
    pub means: BTreeMap<&'static str, f32>,
    pub n_minibatches: usize,
    pub n_dual_updates: usize,
    /// Learning rate used for the actor and critics.
    pub lr: f64,
    /// λ after the last optimizer step.
    pub lagrangian: f32,
}

impl IterationStats {
    pub fn mean(&self, key: &str) -> Option<f32> {
        self.means.get(key).copied()
    }
}

/// Drives the minibatch loop and owns the optimizers and schedule.
pub struct PPOLagLearner<OA, OC, OL> {
    config: LearnerConfig,
    optimizers: PPOLagOptimizers<OA, OC, OL>,
    scheduler: Box<dyn LRScheduler>,
    iteration: usize,
    rng: StdRng,
}

impl<OA, OC, OL> PPOLagLearner<OA, OC, OL> {
    pub fn new(
        config: LearnerConfig,
        optimizers: PPOLagOptimizers<OA, OC, OL>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let scheduler = config.lr_schedule.build(config.lr);
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            optimizers,
            scheduler,
            iteration: 0,
            rng,
        })
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    /// Number of completed iterations.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Learning rate the next iteration will use.
    pub fn current_lr(&self) -> f64 {
        self.scheduler.get_lr(self.iteration)
    }

    /// Start offsets of the contiguous minibatches covering `n` transitions.
    fn segment_starts(&self, n: usize) -> Vec<usize> {
        (0..n).step_by(self.config.minibatch_size).collect()
    }

    /// Run `n_epochs` passes over `batch` and sync the target critics.
    ///
    /// The rollout must carry `avg_violation` unless the dual cadence is
    /// [`Never`](super::DualUpdateCadence::Never).
    pub fn run_iteration<B, A, C, E>(
        &mut self,
        loss: &mut PPOLagLoss<B, A, C, E>,
        batch: &RolloutBatch<B>,
    ) -> Result<IterationStats, LossError>
    where
        B: AutodiffBackend,
        A: StochasticActor<B> + AutodiffModule<B>,
        C: ValueCritic<B> + AutodiffModule<B>,
        E: ValueEstimator<B, C>,
        OA: Optimizer<A, B>,
        OC: Optimizer<C, B>,
        OL: Optimizer<NaiveLagrange<B>, B>,
    {
        batch.validate()?;

        let lr = self.current_lr();
        let lagrangian_lr = self.config.lagrangian_lr.unwrap_or(lr);
        let mut starts = self.segment_starts(batch.len());

        let mut sums: BTreeMap<&'static str, (f32, usize)> = BTreeMap::new();
        let mut n_minibatches = 0;
        let mut n_dual_updates = 0;

        for epoch in 0..self.config.n_epochs {
            starts.shuffle(&mut self.rng);
            for (index, &start) in starts.iter().enumerate() {
                let minibatch = batch.narrow(start, self.config.minibatch_size);
                let update_dual = self.config.dual_update.is_due(epoch, index);

                let output = loss.forward(&minibatch, update_dual)?;
                for (key, value) in output.scalars() {
                    let entry = sums.entry(key).or_insert((0.0, 0));
                    entry.0 += value;
                    entry.1 += 1;
                }
                if output.loss_lagrangian.is_some() {
                    n_dual_updates += 1;
                }
                loss.apply_gradients(output, &mut self.optimizers, lr, lagrangian_lr);
                n_minibatches += 1;
            }
        }

        loss.sync_targets(self.config.target_tau);

        let means = sums
            .into_iter()
            .map(|(key, (sum, count))| (key, sum / count as f32))
            .collect();
        let stats = IterationStats {
            iteration: self.iteration,
            means,
            n_minibatches,
            n_dual_updates,
            lr,
            lagrangian: loss.lagrange().current_value(),
        };
        self.iteration += 1;

        log::debug!(
            "iteration {}: {} minibatches, {} dual updates, lr={:.2e}, lambda={:.4}, loss_pi={:.4}",
            stats.iteration,
            stats.n_minibatches,
            stats.n_dual_updates,
            stats.lr,
            stats.lagrangian,
            stats.mean("loss_pi").unwrap_or(f32::NAN),
        );

        Ok(stats)
    }
}
