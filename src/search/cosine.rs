//! Cosine similarity over real-valued vectors.
//!
//! Used as the reference the binary codes are compared against.

use ndarray::{Array2, ArrayView1, Axis};

use crate::errors::{NlbError, Result};
use crate::search::topk::{self, Neighbor};

/// Cosine similarity. Zero when either vector has zero norm.
pub fn cosine_similarity(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    let dot = a.dot(&b);
    let norm = (a.dot(&a) * b.dot(&b)).sqrt();
    if norm == 0.0 {
        0.0
    } else {
        dot / norm
    }
}

/// Real-valued embedding: one row of `vectors` per word.
#[derive(Debug, Clone, PartialEq)]
pub struct RealEmbedding {
    words: Vec<String>,
    vectors: Array2<f32>,
}

impl RealEmbedding {
    /// Pair `words` with the rows of `vectors`.
    pub fn new(words: Vec<String>, vectors: Array2<f32>) -> Result<Self> {
        if words.len() != vectors.nrows() {
            return Err(NlbError::Config(format!(
                "{} words for {} vectors",
                words.len(),
                vectors.nrows()
            )));
        }
        Ok(Self { words, vectors })
    }

    /// Number of vectors.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True when there are no vectors.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Vector dimension.
    pub fn n_dims(&self) -> usize {
        self.vectors.ncols()
    }

    /// The embedding matrix (n_vecs × n_dims).
    pub fn vectors(&self) -> &Array2<f32> {
        &self.vectors
    }

    /// Vocabulary words, in row order.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Word of row `index`.
    pub fn word(&self, index: usize) -> Option<&str> {
        self.words.get(index).map(String::as_str)
    }

    /// Cosine similarity between rows `a` and `b`.
    pub fn sim(&self, a: usize, b: usize) -> f32 {
        cosine_similarity(self.vectors.row(a), self.vectors.row(b))
    }

    /// The `k` rows closest to row `query` by cosine, excluding `query`.
    pub fn top_k(&self, query: usize, k: usize) -> Result<Vec<Neighbor>> {
        if query >= self.len() {
            return Err(NlbError::Lookup(format!(
                "row {query} out of range for {} vectors",
                self.len()
            )));
        }
        // Normalize once so each candidate costs a single dot product.
        let q = self.vectors.row(query);
        let q_norm = q.dot(&q).sqrt();
        let norms = self.vectors.map_axis(Axis(1), |row| row.dot(&row).sqrt());
        Ok(topk::select(self.len(), k, Some(query), |i| {
            let denom = q_norm * norms[i];
            if denom == 0.0 {
                0.0
            } else {
                q.dot(&self.vectors.row(i)) / denom
            }
        }))
    }
}
