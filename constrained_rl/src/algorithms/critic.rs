//! State-value critic interface.
//!
//! Live and target critics are two instances of the same module type; the
//! target is an independent parameter snapshot owned by a value estimator.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Network mapping observations to state values.
pub trait ValueCritic<B: Backend>: Module<B> {
    /// Value predictions: [batch, 1]
    fn forward(&self, observations: Tensor<B, 2>) -> Tensor<B, 2>;

    /// Value predictions flattened to [batch].
    fn values(&self, observations: Tensor<B, 2>) -> Tensor<B, 1> {
        self.forward(observations).flatten(0, 1)
    }
}
