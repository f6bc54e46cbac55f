#![forbid(unsafe_code)]
#![warn(missing_debug_implementations, rust_2018_idioms)]

//! # nlb-core
//!
//! Near-lossless binarization of word embeddings:
//! - learns a projection W whose sign pattern is a compact binary code
//!   (decorrelation + reconstruction losses, straight-through gradient)
//! - packs codes MSB-first into 64-bit words
//! - Sokal-Michener similarity and exact top-k retrieval over packed codes
//! - Spearman evaluation against word-similarity benchmarks
//!
//! Training is deterministic for a given seed and input.

pub mod bits;
pub mod config;
pub mod corpus;
pub mod errors;
/// Intrinsic evaluation.
pub mod eval;
/// Model persistence.
pub mod persistence;
/// High-level pipelines.
pub mod pipeline;
/// Search and retrieval.
pub mod search;
pub mod train;

pub use bits::{BitPacker, WORD_BITS};
pub use config::NlbConfig;
pub use corpus::VocabIndex;
pub use errors::{NlbError, Result};
pub use pipeline::{Binarizer, TrainingOrchestrator};
pub use search::{BinaryEmbedding, HammingSimilarityEngine, Neighbor, RealEmbedding};
pub use train::{ProjectionModel, ProjectionTrainer};
