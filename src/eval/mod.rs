//! Intrinsic evaluation against human word-similarity judgements.

pub mod datasets;
pub mod spearman;

pub use datasets::{evaluate_dataset, evaluate_dir, DatasetReport, ScoredPair, SimilarityDataset};
pub use spearman::spearman;
