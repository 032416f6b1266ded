//! Metrics logging for constrained training.
//!
//! ## Loggers
//!
//! - [`ConsoleLogger`]: Aligned console table
//! - [`CSVLogger`]: CSV rows for analysis
//! - [`MultiLogger`]: Combine multiple loggers

pub mod logger;

pub use logger::{CSVLogger, ConsoleLogger, MetricsLogger, MultiLogger, TrainingSnapshot};
