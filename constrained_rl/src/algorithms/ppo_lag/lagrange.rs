//! Softplus-parameterized Lagrange multiplier.
//!
//! The multiplier is kept positive by training an unconstrained parameter
//! `raw` and exposing `λ = softplus(raw)`:
//!
//! ```text
//! L(raw) = -softplus(raw) * avg_violation * cost_scale
//! ```
//!
//! Descending this loss is dual ascent on λ: it grows while the constraint is
//! violated (`avg_violation > 0`) and shrinks otherwise.

use burn::module::{Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use std::collections::BTreeMap;

use super::config::LagrangeConfig;

/// Above this, `softplus(x) == x` in f32 and the inverse is the identity.
const SOFTPLUS_LINEAR_THRESHOLD: f64 = 20.0;

/// Learnable dual variable with a fixed cost budget.
#[derive(Module, Debug)]
pub struct NaiveLagrange<B: Backend> {
    /// Unconstrained parameter, shape [1].
    lag: Param<Tensor<B, 1>>,
    #[module(skip)]
    cost_limit: f32,
}

impl<B: Backend> NaiveLagrange<B> {
    /// Create a multiplier that starts exactly at `initial_value`.
    pub fn new(initial_value: f32, cost_limit: f32, device: &B::Device) -> Self {
        Self::from_raw(inv_softplus(initial_value as f64) as f32, cost_limit, device)
    }

    /// Create a multiplier from its unconstrained parameter.
    pub fn from_raw(raw: f32, cost_limit: f32, device: &B::Device) -> Self {
        Self {
            lag: Param::from_tensor(Tensor::from_floats([raw], device)),
            cost_limit,
        }
    }

    /// λ with gradient flow to `raw`: [1]
    pub fn multiplier(&self) -> Tensor<B, 1> {
        softplus(self.lag.val())
    }

    /// Dual loss for a batch violation; its mean is used.
    pub fn loss(&self, avg_violation: Tensor<B, 1>, cost_scale: f32) -> Tensor<B, 1> {
        let violation = avg_violation.mean().detach();
        -(self.multiplier() * violation).mul_scalar(cost_scale)
    }

    /// Detached λ.
    pub fn current_value(&self) -> f32 {
        self.multiplier().into_scalar().elem::<f32>()
    }

    /// Detached `raw`.
    pub fn raw(&self) -> f32 {
        self.lag.val().into_scalar().elem::<f32>()
    }

    pub fn cost_limit(&self) -> f32 {
        self.cost_limit
    }

    pub fn log_snapshot(&self) -> BTreeMap<&'static str, f32> {
        BTreeMap::from([("lagrangian", self.current_value())])
    }
}

impl LagrangeConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> NaiveLagrange<B> {
        NaiveLagrange::new(self.initial_value, self.cost_limit, device)
    }
}

/// `max(x, 0) + ln(1 + exp(-|x|))`.
fn softplus<B: Backend>(x: Tensor<B, 1>) -> Tensor<B, 1> {
    x.clone().clamp_min(0.0) + x.abs().neg().exp().log1p()
}

/// Scalar softplus, same formulation as the tensor version.
pub fn softplus_scalar(x: f64) -> f64 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

/// Inverse of softplus for `y > 0`: `ln(exp(y) - 1)`.
pub fn inv_softplus(y: f64) -> f64 {
    if y > SOFTPLUS_LINEAR_THRESHOLD {
        y
    } else {
        y.exp_m1().ln()
    }
}
