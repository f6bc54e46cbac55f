//! Projection learning: the parameters (W, C) and their gradient updates.

pub mod projection;

pub use projection::{
    apply_decorrelation_gradient, apply_reconstruction_gradient, LearningRates,
    ProjectionModel, ProjectionTrainer,
};
