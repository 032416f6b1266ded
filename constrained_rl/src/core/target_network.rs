//! Target critic synchronization.
//!
//! Each value estimator bootstraps next-state values from its own snapshot
//! of the critic. The snapshot is moved towards the live critic by Polyak
//! averaging:
//!
//! ```text
//! θ_target = τ * θ_online + (1 - τ) * θ_target
//! ```
//!
//! `τ = 1` is a hard copy, `τ = 0` leaves the snapshot untouched. The
//! synchronized values are detached, so no gradient ever reaches the target
//! through the bootstrap path, and the target keeps its own parameter ids
//! so it is never confused with the live critic by an optimizer.

use burn::module::{Module, ModuleMapper, Param, ParamId};
use burn::prelude::*;

// ============================================================================
// Parameter traversal
// ============================================================================

/// Collects every float parameter of a module, flattened to 1D.
///
/// Parameters are visited in traversal order, which is deterministic for
/// modules of the same architecture.
struct ParamExtractor<B: Backend> {
    params: Vec<Tensor<B, 1>>,
}

impl<B: Backend> ModuleMapper<B> for ParamExtractor<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let val = param.val();
        let numel: usize = val.dims().iter().product();
        self.params.push(val.detach().reshape([numel]));
        param
    }
}

/// Interpolates each visited parameter with the online parameter at the same
/// traversal index.
struct PolyakMapper<B: Backend> {
    online: Vec<Tensor<B, 1>>,
    tau: f32,
    index: usize,
    mismatched: usize,
}

impl<B: Backend> ModuleMapper<B> for PolyakMapper<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let idx = self.index;
        self.index += 1;

        let target = param.val();
        let shape = target.dims();
        let numel: usize = shape.iter().product();

        match self.online.get(idx) {
            Some(online) if online.dims()[0] == numel => {
                let mixed = online.clone().mul_scalar(self.tau)
                    + target.detach().reshape([numel]).mul_scalar(1.0 - self.tau);
                Param::initialized(param.id.clone(), mixed.reshape(shape).detach())
            }
            _ => {
                self.mismatched += 1;
                param
            }
        }
    }
}

/// Move `target` towards `online` with coefficient `tau`.
///
/// Parameters are matched by traversal order. Parameters without a
/// counterpart of the same size are left unchanged and reported with a
/// warning.
pub fn soft_update<B, M>(online: &M, target: M, tau: f32) -> M
where
    B: Backend,
    M: Module<B>,
{
    let tau = tau.clamp(0.0, 1.0);
    if tau == 0.0 {
        return target;
    }

    let mut extractor = ParamExtractor { params: Vec::new() };
    let _ = online.clone().map(&mut extractor);

    let mut mapper = PolyakMapper {
        online: extractor.params,
        tau,
        index: 0,
        mismatched: 0,
    };
    let updated = target.map(&mut mapper);

    if mapper.mismatched > 0 || mapper.index != mapper.online.len() {
        log::warn!(
            "target sync skipped {} parameter(s): online has {}, target has {}",
            mapper.mismatched,
            mapper.online.len(),
            mapper.index
        );
    }
    updated
}

/// Re-registers every parameter under a fresh id with a detached value.
struct DetachedCopy;

impl<B: Backend> ModuleMapper<B> for DetachedCopy {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        Param::initialized(ParamId::new(), param.val().detach())
    }
}

/// Detached snapshot of `online` that does not share parameter ids with it.
pub fn detached_copy<B, M>(online: &M) -> M
where
    B: Backend,
    M: Module<B>,
{
    online.clone().map(&mut DetachedCopy)
}
