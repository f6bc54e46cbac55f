//! Similarity and exact nearest-neighbor retrieval.

pub mod cosine;
pub mod hamming;
pub mod topk;

pub use cosine::{cosine_similarity, RealEmbedding};
pub use hamming::{hamming_similarity, BinaryEmbedding, HammingSimilarityEngine};
pub use topk::{Neighbor, TopK};
