//! Training pipeline: epochs, mini-batches and learning-rate decay, followed
//! by binarization of the whole vocabulary.

use ndarray::{ArrayView2, Axis, Slice};

use crate::config::NlbConfig;
use crate::errors::{NlbError, Result};
use crate::pipeline::binarize::Binarizer;
use crate::search::{BinaryEmbedding, RealEmbedding};
use crate::train::{LearningRates, ProjectionModel, ProjectionTrainer};

/// Rows used to report the reconstruction error after each epoch.
const ERROR_PROBE_ROWS: usize = 1024;

/// Drives a [`ProjectionTrainer`] through the configured epochs.
#[derive(Debug, Clone)]
pub struct TrainingOrchestrator {
    config: NlbConfig,
}

impl TrainingOrchestrator {
    /// Create an orchestrator; the configuration is validated up front.
    pub fn new(config: NlbConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use.
    pub fn config(&self) -> &NlbConfig {
        &self.config
    }

    fn rates(&self) -> LearningRates {
        LearningRates {
            rec: self.config.lr_rec,
            reg: self.config.lr_reg,
        }
    }

    /// Learn (W, C) from randomly initialized parameters.
    pub fn train(&self, embedding: ArrayView2<'_, f32>) -> Result<ProjectionModel> {
        if embedding.nrows() == 0 {
            return Err(NlbError::Config("cannot train on an empty embedding".into()));
        }
        let trainer = ProjectionTrainer::new(
            self.config.n_bits,
            embedding.ncols(),
            self.rates(),
            self.config.seed,
        )?;
        self.run_epochs(trainer, embedding)
    }

    /// Continue training from existing parameters.
    pub fn resume(
        &self,
        model: ProjectionModel,
        embedding: ArrayView2<'_, f32>,
    ) -> Result<ProjectionModel> {
        let trainer = ProjectionTrainer::from_parts(model, self.rates())?;
        self.run_epochs(trainer, embedding)
    }

    fn run_epochs(
        &self,
        mut trainer: ProjectionTrainer,
        embedding: ArrayView2<'_, f32>,
    ) -> Result<ProjectionModel> {
        let probe_rows = embedding.nrows().min(ERROR_PROBE_ROWS);
        let probe = embedding.slice_axis(Axis(0), Slice::from(..probe_rows));

        tracing::info!(
            n_vecs = embedding.nrows(),
            n_dims = embedding.ncols(),
            n_bits = self.config.n_bits,
            epochs = self.config.epochs,
            batch_size = self.config.batch_size,
            "training projection"
        );

        for epoch in 1..=self.config.epochs {
            let batches =
                trainer.train_epoch(embedding, self.config.batch_size, self.config.lr_decay)?;
            let rates = trainer.rates();
            tracing::info!(
                epoch,
                batches,
                lr_rec = rates.rec,
                lr_reg = rates.reg,
                error = trainer.reconstruction_error(probe),
                "epoch complete"
            );
        }

        Ok(trainer.into_model())
    }

    /// Train on `embedding`, then binarize every vector with the learned W.
    pub fn run(&self, embedding: &RealEmbedding) -> Result<(ProjectionModel, BinaryEmbedding)> {
        let model = self.train(embedding.vectors().view())?;
        let codes = Binarizer::from_model(&model)?.binarize_embedding(embedding)?;
        Ok((model, codes))
    }
}
