//! PPO-Lag dual-objective loss.
//!
//! One call produces, from a rollout minibatch:
//!
//! ```text
//! loss_pi        = mean(-min(ρA_r, clip(ρ)A_r) + λ ρA_c) / (1 + λ)
//! loss_entropy   = -entropy_coef * mean(H)                (optional)
//! loss_r_critic  = critic_coef * mean(d(V_r(s), target_r))
//! loss_c_critic  = critic_coef * mean(d(V_c(s), target_c))
//! loss_lagrangian = -softplus(raw) * mean(avg_violation)  (on request)
//! ```
//!
//! where ρ = exp(log π(a|s) - log π_old(a|s)) and λ is a detached snapshot.
//! The reward and cost estimators run on independent single-channel views
//! of the batch; the caller's batch is never modified.

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use std::collections::BTreeMap;

use super::config::PPOLagConfig;
use super::lagrange::NaiveLagrange;
use crate::algorithms::action_policy::{ActionDistribution, StochasticActor};
use crate::algorithms::critic::ValueCritic;
use crate::algorithms::policy_loss::{
    clip_bounds, clipped_surrogate_gain, distance_loss, importance_weighted_gain,
    lagrangian_actor_loss, log_weight, normalize_advantage,
};
use crate::algorithms::value_estimator::{
    TargetValueEstimator, ValueEstimator, ValueEstimatorConfig,
};
use crate::core::batch::{ChannelBatch, RolloutBatch, AVG_VIOLATION_KEY, COST_CHANNEL, REWARD_CHANNEL};
use crate::core::error::{ConfigError, LossError};

// ============================================================================
// Output
// ============================================================================

/// Named losses and metrics of one forward call.
#[derive(Debug, Clone)]
pub struct PPOLagLossOutput<B: Backend> {
    /// Detached multiplier at call time.
    pub lagrangian: f32,
    /// Present only when a dual update was requested.
    pub loss_lagrangian: Option<Tensor<B, 1>>,
    pub loss_pi: Tensor<B, 1>,
    /// Present only when the entropy bonus is enabled.
    pub loss_entropy: Option<Tensor<B, 1>>,
    /// Detached mean entropy.
    pub entropy: f32,
    pub loss_r_critic: Tensor<B, 1>,
    pub loss_c_critic: Tensor<B, 1>,
}

impl<B: Backend> PPOLagLossOutput<B> {
    /// Names of the emitted entries.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = vec!["lagrangian"];
        if self.loss_lagrangian.is_some() {
            keys.push("loss_lagrangian");
        }
        keys.push("loss_pi");
        if self.loss_entropy.is_some() {
            keys.push("loss_entropy");
        }
        keys.extend(["entropy", "loss_r_critic", "loss_c_critic"]);
        keys
    }

    /// Sum of every loss term, for a single backward pass.
    pub fn total(&self) -> Tensor<B, 1> {
        let mut total =
            self.loss_pi.clone() + self.loss_r_critic.clone() + self.loss_c_critic.clone();
        if let Some(entropy) = &self.loss_entropy {
            total = total + entropy.clone();
        }
        if let Some(dual) = &self.loss_lagrangian {
            total = total + dual.clone();
        }
        total
    }

    /// Every entry as a plain scalar.
    pub fn scalars(&self) -> BTreeMap<&'static str, f32> {
        let mut out = BTreeMap::new();
        out.insert("lagrangian", self.lagrangian);
        out.insert("entropy", self.entropy);
        out.insert("loss_pi", scalar(&self.loss_pi));
        out.insert("loss_r_critic", scalar(&self.loss_r_critic));
        out.insert("loss_c_critic", scalar(&self.loss_c_critic));
        if let Some(t) = &self.loss_entropy {
            out.insert("loss_entropy", scalar(t));
        }
        if let Some(t) = &self.loss_lagrangian {
            out.insert("loss_lagrangian", scalar(t));
        }
        out
    }
}

fn scalar<B: Backend>(t: &Tensor<B, 1>) -> f32 {
    t.clone().into_scalar().elem::<f32>()
}

// ============================================================================
// Loss module
// ============================================================================

/// Constrained PPO loss owning the actor, both live critics and the
/// Lagrange multiplier. Target critics belong to the estimators.
pub struct PPOLagLoss<B, A, C, E = TargetValueEstimator<B, C>>
where
    B: Backend,
    A: StochasticActor<B>,
    C: ValueCritic<B>,
    E: ValueEstimator<B, C>,
{
    actor: A,
    critic: C,
    safe_critic: C,
    lagrange: NaiveLagrange<B>,
    r_estimator: E,
    c_estimator: E,
    config: PPOLagConfig,
}

impl<B, A, C> PPOLagLoss<B, A, C, TargetValueEstimator<B, C>>
where
    B: Backend,
    A: StochasticActor<B>,
    C: ValueCritic<B>,
{
    /// Build with one [`TargetValueEstimator`] per channel, keyed from
    /// `config.keys`. Each target starts as a copy of its live critic.
    pub fn with_target_estimators(
        actor: A,
        critic: C,
        safe_critic: C,
        lagrange: NaiveLagrange<B>,
        estimator: ValueEstimatorConfig,
        config: PPOLagConfig,
    ) -> Result<Self, ConfigError> {
        estimator.validate()?;
        let r_estimator = TargetValueEstimator::new(estimator, config.keys.reward(), &critic);
        let c_estimator = TargetValueEstimator::new(estimator, config.keys.cost(), &safe_critic);
        Self::new(actor, critic, safe_critic, lagrange, r_estimator, c_estimator, config)
    }
}

impl<B, A, C, E> PPOLagLoss<B, A, C, E>
where
    B: Backend,
    A: StochasticActor<B>,
    C: ValueCritic<B>,
    E: ValueEstimator<B, C>,
{
    /// Assemble the loss. The estimators must write under the keys named in
    /// `config.keys`.
    pub fn new(
        actor: A,
        critic: C,
        safe_critic: C,
        lagrange: NaiveLagrange<B>,
        r_estimator: E,
        c_estimator: E,
        config: PPOLagConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if r_estimator.keys() != &config.keys.reward() {
            return Err(ConfigError::InvalidValue {
                field: "r_estimator",
                reason: format!("writes {:?}, loss reads {:?}", r_estimator.keys(), config.keys.reward()),
            });
        }
        if c_estimator.keys() != &config.keys.cost() {
            return Err(ConfigError::InvalidValue {
                field: "c_estimator",
                reason: format!("writes {:?}, loss reads {:?}", c_estimator.keys(), config.keys.cost()),
            });
        }
        Ok(Self {
            actor,
            critic,
            safe_critic,
            lagrange,
            r_estimator,
            c_estimator,
            config,
        })
    }

    pub fn forward(
        &self,
        batch: &RolloutBatch<B>,
        train_lagrangian: bool,
    ) -> Result<PPOLagLossOutput<B>, LossError> {
        batch.validate()?;
        let keys = &self.config.keys;

        // Dual loss.
        let lagrangian = self.lagrange.current_value();
        let loss_lagrangian = if train_lagrangian {
            let violation = batch
                .avg_violation
                .clone()
                .ok_or_else(|| LossError::missing(AVG_VIOLATION_KEY))?;
            if violation.dims()[0] == 0 {
                return Err(LossError::invalid(format!("{} has no elements", AVG_VIOLATION_KEY)));
            }
            Some(self.lagrange.loss(violation, self.config.cost_scale))
        } else {
            None
        };

        // Per-channel estimation on independent views.
        let mut r_view = batch.channel(REWARD_CHANNEL)?;
        self.r_estimator.estimate(&mut r_view, &self.critic)?;
        let mut c_view = batch.channel(COST_CHANNEL)?;
        self.c_estimator.estimate(&mut c_view, &self.safe_critic)?;

        let mut r_advantage = r_view.get(&keys.r_advantage)?.detach();
        let mut c_advantage = c_view.get(&keys.c_advantage)?.detach();
        if self.config.normalize_advantage {
            r_advantage = normalize_advantage(r_advantage);
            c_advantage = normalize_advantage(c_advantage);
        }

        // Surrogate.
        let dist = self.actor.distribution(batch.observations.clone());
        dist.check_actions(&batch.actions)?;
        let log_prob = dist.log_prob(batch.actions.clone());
        let lw = log_weight(log_prob, batch.old_log_probs.clone().detach());
        let lw_dims = lw.dims();
        for (key, dims) in [
            (&keys.r_advantage, r_advantage.dims()),
            (&keys.c_advantage, c_advantage.dims()),
        ] {
            if dims != lw_dims {
                return Err(LossError::shape_mismatch(key.as_str(), &lw_dims, &dims));
            }
        }

        let r_gain = clipped_surrogate_gain(
            lw.clone(),
            r_advantage,
            clip_bounds(self.config.clip_epsilon),
        );
        let c_gain = importance_weighted_gain(lw, c_advantage);
        let loss_pi = lagrangian_actor_loss(r_gain, c_gain, lagrangian);

        // Entropy.
        let entropy_mean = dist.entropy().mean();
        let entropy = scalar(&entropy_mean);
        let loss_entropy = self
            .config
            .entropy_bonus
            .then(|| entropy_mean.mul_scalar(-self.config.entropy_coef));

        // Critics.
        let loss_r_critic = self.critic_loss(&self.critic, &r_view, &keys.r_value_target)?;
        let loss_c_critic = self.critic_loss(&self.safe_critic, &c_view, &keys.c_value_target)?;

        Ok(PPOLagLossOutput {
            lagrangian,
            loss_lagrangian,
            loss_pi,
            loss_entropy,
            entropy,
            loss_r_critic,
            loss_c_critic,
        })
    }

    fn critic_loss(
        &self,
        critic: &C,
        view: &ChannelBatch<B>,
        target_key: &str,
    ) -> Result<Tensor<B, 1>, LossError> {
        let target = view.get(target_key)?.detach();
        let prediction = critic.values(view.observations.clone());
        if prediction.dims() != target.dims() {
            return Err(LossError::shape_mismatch(
                target_key,
                &target.dims(),
                &prediction.dims(),
            ));
        }
        Ok(distance_loss(target, prediction, self.config.loss_critic_type)
            .mean()
            .mul_scalar(self.config.critic_coef))
    }

    /// Move both target critics towards their live critics.
    pub fn sync_targets(&mut self, tau: f32) {
        self.r_estimator.sync_target(&self.critic, tau);
        self.c_estimator.sync_target(&self.safe_critic, tau);
    }

    pub fn actor(&self) -> &A {
        &self.actor
    }

    pub fn critic(&self) -> &C {
        &self.critic
    }

    pub fn safe_critic(&self) -> &C {
        &self.safe_critic
    }

    pub fn lagrange(&self) -> &NaiveLagrange<B> {
        &self.lagrange
    }

    pub fn r_estimator(&self) -> &E {
        &self.r_estimator
    }

    pub fn c_estimator(&self) -> &E {
        &self.c_estimator
    }

    pub fn config(&self) -> &PPOLagConfig {
        &self.config
    }
}

// ============================================================================
// Optimization
// ============================================================================

/// One optimizer per trained module.
pub struct PPOLagOptimizers<OA, OC, OL> {
    pub actor: OA,
    pub critic: OC,
    pub safe_critic: OC,
    pub lagrange: OL,
}

impl<B, A, C, E> PPOLagLoss<B, A, C, E>
where
    B: AutodiffBackend,
    A: StochasticActor<B> + AutodiffModule<B>,
    C: ValueCritic<B> + AutodiffModule<B>,
    E: ValueEstimator<B, C>,
{
    /// Backpropagate the summed loss once and step every module.
    ///
    /// The multiplier is stepped only when `output` carries a dual loss.
    pub fn apply_gradients<OA, OC, OL>(
        &mut self,
        output: PPOLagLossOutput<B>,
        optimizers: &mut PPOLagOptimizers<OA, OC, OL>,
        lr: f64,
        lagrangian_lr: f64,
    ) where
        OA: Optimizer<A, B>,
        OC: Optimizer<C, B>,
        OL: Optimizer<NaiveLagrange<B>, B>,
    {
        let update_dual = output.loss_lagrangian.is_some();
        let mut grads = output.total().backward();

        let actor_grads = GradientsParams::from_module(&mut grads, &self.actor);
        let critic_grads = GradientsParams::from_module(&mut grads, &self.critic);
        let safe_grads = GradientsParams::from_module(&mut grads, &self.safe_critic);

        self.actor = optimizers.actor.step(lr, self.actor.clone(), actor_grads);
        self.critic = optimizers.critic.step(lr, self.critic.clone(), critic_grads);
        self.safe_critic = optimizers
            .safe_critic
            .step(lr, self.safe_critic.clone(), safe_grads);

        if update_dual {
            let lag_grads = GradientsParams::from_module(&mut grads, &self.lagrange);
            self.lagrange = optimizers
                .lagrange
                .step(lagrangian_lr, self.lagrange.clone(), lag_grads);
        }
    }
}
