//! Training configuration for projection learning and binarization.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bits::WORD_BITS;
use crate::errors::{NlbError, Result};

/// Hyper-parameters of the binarization training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NlbConfig {
    /// Length of the binary codes. Must be a multiple of 64.
    pub n_bits: usize,
    /// Learning rate of the reconstruction loss.
    pub lr_rec: f32,
    /// Learning rate of the decorrelation (regularization) loss.
    pub lr_reg: f32,
    /// Number of embedding rows per mini-batch.
    pub batch_size: usize,
    /// Number of passes over the embedding.
    pub epochs: usize,
    /// Multiplicative learning-rate decay applied after every epoch.
    pub lr_decay: f32,
    /// Seed of the projection initialization.
    pub seed: u64,
}

impl Default for NlbConfig {
    fn default() -> Self {
        Self {
            n_bits: 256,
            lr_rec: 0.001,
            lr_reg: 0.001,
            batch_size: 75,
            epochs: 5,
            lr_decay: 0.95,
            seed: 0,
        }
    }
}

impl NlbConfig {
    /// Read a (possibly partial) configuration from a JSON file.
    /// Missing fields take their default value.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&s)?)
    }

    /// Check the invariants every training run relies on.
    pub fn validate(&self) -> Result<()> {
        if self.n_bits == 0 || self.n_bits % WORD_BITS != 0 {
            return Err(NlbError::Config(format!(
                "n_bits must be a positive multiple of {WORD_BITS}, got {}",
                self.n_bits
            )));
        }
        if self.batch_size == 0 {
            return Err(NlbError::Config("batch_size must be at least 1".into()));
        }
        for (name, lr) in [("lr_rec", self.lr_rec), ("lr_reg", self.lr_reg)] {
            if !lr.is_finite() || lr < 0.0 {
                return Err(NlbError::Config(format!(
                    "{name} must be a finite non-negative number, got {lr}"
                )));
            }
        }
        if !(self.lr_decay > 0.0 && self.lr_decay <= 1.0) {
            return Err(NlbError::Config(format!(
                "lr_decay must be in (0, 1], got {}",
                self.lr_decay
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = NlbConfig::default();
        assert_eq!(config.n_bits, 256);
        assert_eq!(config.batch_size, 75);
        assert_eq!(config.epochs, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unaligned_bits() {
        let config = NlbConfig {
            n_bits: 100,
            ..NlbConfig::default()
        };
        assert!(matches!(config.validate(), Err(NlbError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_batch() {
        let config = NlbConfig {
            batch_size: 0,
            ..NlbConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: NlbConfig = serde_json::from_str(r#"{"n_bits": 128, "seed": 7}"#).unwrap();
        assert_eq!(config.n_bits, 128);
        assert_eq!(config.seed, 7);
        assert_eq!(config.lr_rec, 0.001);
    }
}
