//! Persistence of trained projections.
//! Saves/loads: Metadata (JSON), ProjectionModel W and C (bincode).

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::NlbConfig;
use crate::train::ProjectionModel;

const METADATA_FILE: &str = "metadata.json";
const MODEL_FILE: &str = "model.bin";

/// Metadata stored with the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Version of the nlb-core library.
    pub version: String,
    /// ISO 8601 timestamp of creation.
    pub created_at: String,
    /// Configuration used to train the model.
    pub config: NlbConfig,
    /// Rows of W.
    pub n_bits: usize,
    /// Columns of W, length of C.
    pub n_dims: usize,
}

impl ModelMetadata {
    /// Create new metadata with current version and timestamp.
    pub fn new(config: &NlbConfig, model: &ProjectionModel) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            config: config.clone(),
            n_bits: model.n_bits(),
            n_dims: model.n_dims(),
        }
    }
}

/// Save the model to the specified directory.
pub fn save_model(model_dir: &Path, metadata: &ModelMetadata, model: &ProjectionModel) -> Result<()> {
    std::fs::create_dir_all(model_dir)
        .with_context(|| format!("Failed to create model directory {}", model_dir.display()))?;

    // 1. Metadata (JSON)
    let meta_file =
        File::create(model_dir.join(METADATA_FILE)).context("Failed to create metadata file")?;
    serde_json::to_writer_pretty(meta_file, metadata)?;

    // 2. W and C (Bincode)
    let model_file = File::create(model_dir.join(MODEL_FILE)).context("Failed to create model file")?;
    let mut writer = BufWriter::new(model_file);
    bincode::serialize_into(&mut writer, model)?;

    tracing::info!(dir = %model_dir.display(), n_bits = metadata.n_bits, "saved model");
    Ok(())
}

/// Load a model saved by [`save_model`].
pub fn load_model(model_dir: &Path) -> Result<(ModelMetadata, ProjectionModel)> {
    let meta_file =
        File::open(model_dir.join(METADATA_FILE)).context("Failed to open metadata file")?;
    let metadata: ModelMetadata = serde_json::from_reader(BufReader::new(meta_file))
        .context("Failed to parse metadata")?;

    let model_file = File::open(model_dir.join(MODEL_FILE)).context("Failed to open model file")?;
    let model: ProjectionModel = bincode::deserialize_from(BufReader::new(model_file))
        .context("Failed to decode model")?;

    ensure!(
        model.n_bits() == metadata.n_bits && model.n_dims() == metadata.n_dims,
        "model shape {}x{} does not match metadata {}x{}",
        model.n_bits(),
        model.n_dims(),
        metadata.n_bits,
        metadata.n_dims
    );
    ensure!(
        model.c.len() == model.n_dims(),
        "bias length {} does not match {} dimensions",
        model.c.len(),
        model.n_dims()
    );

    Ok((metadata, model))
}
