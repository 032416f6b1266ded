//! Learning rate schedules for the optimisation phase.
//!
//! - `ConstantLR`: fixed rate
//! - `CosineAnnealing`: cosine decay to a floor, then hold, restart or swing back up
//!
//! Schedules are indexed by the number of optimizer steps taken so far and
//! always return a finite, non-negative rate.

use serde::{Deserialize, Serialize};

use crate::core::error::{check_range, ConfigError};

/// Step-indexed learning rate.
pub trait LRScheduler: Send + Sync {
    fn get_lr(&self, step: usize) -> f64;
}

/// Replace NaN/Inf/negative rates by zero.
fn sanitize(lr: f64) -> f64 {
    if lr.is_finite() && lr >= 0.0 {
        lr
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConstantLR {
    lr: f64,
}

impl ConstantLR {
    pub fn new(lr: f64) -> Self {
        Self { lr: sanitize(lr) }
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }
}

impl LRScheduler for ConstantLR {
    fn get_lr(&self, _step: usize) -> f64 {
        self.lr
    }
}

/// What a cosine schedule does after its first `period` steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CosineCycle {
    /// Stay at `min_lr`.
    #[default]
    Hold,
    /// Jump back to `base_lr` and decay again.
    Restart,
    /// Follow the cosine back up to `base_lr` over the next `period` steps,
    /// the closed form of torch's `CosineAnnealingLR`.
    Continue,
}

/// Cosine curve from `base_lr` down to `min_lr` over `period` steps.
///
/// A zero period returns `base_lr` everywhere.
#[derive(Debug, Clone, Copy)]
pub struct CosineAnnealing {
    base_lr: f64,
    min_lr: f64,
    period: usize,
    cycle: CosineCycle,
}

impl CosineAnnealing {
    pub fn new(base_lr: f64, min_lr: f64, period: usize, cycle: CosineCycle) -> Self {
        if period == 0 {
            log::warn!("cosine schedule with zero period, rate stays at base_lr");
        }
        Self {
            base_lr: sanitize(base_lr),
            min_lr: sanitize(min_lr),
            period,
            cycle,
        }
    }

    pub fn base_lr(&self) -> f64 {
        self.base_lr
    }

    pub fn min_lr(&self) -> f64 {
        self.min_lr
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn cycle(&self) -> CosineCycle {
        self.cycle
    }
}

impl LRScheduler for CosineAnnealing {
    fn get_lr(&self, step: usize) -> f64 {
        if self.period == 0 {
            return self.base_lr;
        }
        let position = match self.cycle {
            CosineCycle::Hold => step.min(self.period),
            CosineCycle::Restart => step % self.period,
            CosineCycle::Continue => step % self.period.saturating_mul(2),
        };
        let progress = position as f64 / self.period as f64;
        let cosine = 0.5 * (1.0 + (std::f64::consts::PI * progress).cos());
        let lr = self.min_lr + (self.base_lr - self.min_lr) * cosine;
        if lr.is_finite() {
            lr
        } else {
            self.min_lr
        }
    }
}

/// Serializable schedule choice, built against a base learning rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LRSchedule {
    Constant,
    CosineAnnealing {
        period: usize,
        min_lr: f64,
        #[serde(default)]
        cycle: CosineCycle,
    },
}

impl Default for LRSchedule {
    fn default() -> Self {
        LRSchedule::Constant
    }
}

impl LRSchedule {
    /// Cosine decay to `1e-6` over 96 steps, then back up and down again.
    pub fn cosine() -> Self {
        LRSchedule::CosineAnnealing {
            period: 96,
            min_lr: 1e-6,
            cycle: CosineCycle::Continue,
        }
    }

    pub fn build(&self, base_lr: f64) -> Box<dyn LRScheduler> {
        match *self {
            LRSchedule::Constant => Box::new(ConstantLR::new(base_lr)),
            LRSchedule::CosineAnnealing {
                period,
                min_lr,
                cycle,
            } => Box::new(CosineAnnealing::new(base_lr, min_lr, period, cycle)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let LRSchedule::CosineAnnealing { period, min_lr, .. } = *self {
            if period == 0 {
                return Err(ConfigError::InvalidCount {
                    field: "period",
                    value: period,
                });
            }
            check_range("min_lr", min_lr, 0.0, f64::MAX)?;
        }
        Ok(())
    }
}
