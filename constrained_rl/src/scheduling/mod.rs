//! Learning rate scheduling.
//!
//! ## Available Schedulers
//!
//! - [`ConstantLR`]: No scheduling
//! - [`CosineAnnealing`]: Cosine decay; see [`CosineCycle`] for what follows the first period
//!
//! [`LRSchedule`] is the serializable form stored in the learner
//! configuration.
//!
//! ```rust,ignore
//! let scheduler = LRSchedule::cosine().build(3e-4);
//! let lr = scheduler.get_lr(step);
//! ```

pub mod lr_scheduler;


pub use lr_scheduler::{ConstantLR, CosineAnnealing, CosineCycle, LRSchedule, LRScheduler};
