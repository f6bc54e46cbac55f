//! Binarizer: inference-time forward pass from real vectors to packed codes.

use ndarray::{ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

use crate::bits::BitPacker;
use crate::errors::{try_zeroed, NlbError, Result};
use crate::search::{BinaryEmbedding, RealEmbedding};
use crate::train::ProjectionModel;

/// Rows projected per matrix multiply. Bounds the transient latent matrix to
/// `CHUNK_ROWS × n_bits` floats.
const CHUNK_ROWS: usize = 4096;

/// Applies a trained projection: bit `j` of a vector is 1 iff its dot product
/// with row `j` of W is strictly positive. The bias is not used.
#[derive(Debug, Clone)]
pub struct Binarizer<'a> {
    w: ArrayView2<'a, f32>,
    packer: BitPacker,
}

impl<'a> Binarizer<'a> {
    /// Binarizer for projection `w` (n_bits × n_dims).
    pub fn new(w: ArrayView2<'a, f32>) -> Result<Self> {
        let packer = BitPacker::new(w.nrows())?;
        Ok(Self { w, packer })
    }

    /// Binarizer for a trained model.
    pub fn from_model(model: &'a ProjectionModel) -> Result<Self> {
        Self::new(model.w.view())
    }

    /// Code length.
    pub fn n_bits(&self) -> usize {
        self.packer.n_bits()
    }

    fn check_dims(&self, n_dims: usize) -> Result<()> {
        if n_dims != self.w.ncols() {
            return Err(NlbError::Config(format!(
                "vectors have {n_dims} dimensions, projection expects {}",
                self.w.ncols()
            )));
        }
        Ok(())
    }

    /// Packed code of a single vector.
    pub fn binarize_vector(&self, v: ArrayView1<'_, f32>) -> Result<Vec<u64>> {
        self.check_dims(v.len())?;
        let latent = self.w.dot(&v);
        let mut out = vec![0u64; self.packer.words_per_code()];
        self.packer.pack_activations(latent.iter().copied(), &mut out);
        Ok(out)
    }

    /// Packed codes of every row of `embedding`, row-major.
    pub fn binarize(&self, embedding: ArrayView2<'_, f32>) -> Result<Vec<u64>> {
        self.check_dims(embedding.ncols())?;
        let wpc = self.packer.words_per_code();
        let mut codes: Vec<u64> = try_zeroed(embedding.nrows() * wpc, "binary codes")?;

        let packer = self.packer;
        for (chunk, out) in embedding
            .axis_chunks_iter(Axis(0), CHUNK_ROWS)
            .zip(codes.chunks_mut(CHUNK_ROWS * wpc))
        {
            let latent = chunk.dot(&self.w.t());
            out.par_chunks_mut(wpc)
                .enumerate()
                .for_each(|(r, dst)| packer.pack_activations(latent.row(r).iter().copied(), dst));
        }

        tracing::debug!(rows = embedding.nrows(), n_bits = self.n_bits(), "binarized");
        Ok(codes)
    }

    /// Binarize a whole vocabulary, keeping its words.
    pub fn binarize_embedding(&self, embedding: &RealEmbedding) -> Result<BinaryEmbedding> {
        let codes = self.binarize(embedding.vectors().view())?;
        BinaryEmbedding::new(embedding.words().to_vec(), self.n_bits(), codes)
    }
}

/// Binarize `embedding` with projection `w`.
pub fn binarize(embedding: ArrayView2<'_, f32>, w: ArrayView2<'_, f32>) -> Result<Vec<u64>> {
    Binarizer::new(w)?.binarize(embedding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::packer::bit;
    use ndarray::{array, Array2};

    #[test]
    fn test_sign_rule_and_zero_tie() {
        // Row j of W picks out coordinate j % 2 with sign +1 for even j, -1 for odd j.
        let w = Array2::from_shape_fn((64, 2), |(j, d)| {
            if d == j % 2 {
                if j % 4 < 2 {
                    1.0
                } else {
                    -1.0
                }
            } else {
                0.0
            }
        });
        let x = array![[1.0f32, 0.0]];
        let codes = binarize(x.view(), w.view()).unwrap();

        for j in 0..64 {
            // Odd rows look at coordinate 1, which is exactly zero: tie -> 0.
            let expected = j % 2 == 0 && j % 4 < 2;
            assert_eq!(bit(&codes, j), expected, "bit {j}");
        }
    }

    #[test]
    fn test_vector_matches_matrix_path() {
        let w = Array2::from_shape_fn((128, 5), |(i, j)| ((i * 7 + j * 3) % 11) as f32 - 5.0);
        let emb = Array2::from_shape_fn((9, 5), |(i, j)| ((i + 2 * j) % 5) as f32 - 2.0);
        let binarizer = Binarizer::new(w.view()).unwrap();

        let all = binarizer.binarize(emb.view()).unwrap();
        for (i, row) in emb.outer_iter().enumerate() {
            let single = binarizer.binarize_vector(row).unwrap();
            assert_eq!(&all[i * 2..(i + 1) * 2], single.as_slice());
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let w = Array2::<f32>::zeros((64, 3));
        let emb = Array2::<f32>::zeros((2, 4));
        assert!(binarize(emb.view(), w.view()).is_err());
        assert!(Binarizer::new(Array2::<f32>::zeros((63, 3)).view()).is_err());
    }
}
