//! High-level pipelines: training and binarization.

pub mod binarize;
pub mod train_projection;

pub use binarize::{binarize, Binarizer};
pub use train_projection::TrainingOrchestrator;
