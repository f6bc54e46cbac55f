//! Hamming similarity over packed binary codes.

use crate::bits::{BitPacker, WORD_BITS};
use crate::errors::{NlbError, Result};
use crate::search::topk::{self, Neighbor};

/// Candidates per rayon shard in [`HammingSimilarityEngine::par_top_k`].
const SHARD_SIZE: usize = 16 * 1024;

/// Sokal-Michener similarity: the fraction of bit positions on which the two
/// codes agree (1-1 and 0-0 matches both count).
///
/// Uses XNOR + POPCNT per word.
#[inline]
pub fn hamming_similarity(a: &[u64], b: &[u64]) -> f32 {
    assert_eq!(a.len(), b.len(), "Signature length mismatch");
    let agree: u32 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| (!(x ^ y)).count_ones())
        .sum();
    agree as f32 / (a.len() * WORD_BITS) as f32
}

/// Packed codes of a vocabulary, stored row-major in one flat buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryEmbedding {
    words: Vec<String>,
    packer: BitPacker,
    codes: Vec<u64>,
}

impl BinaryEmbedding {
    /// Wrap `codes` (`words.len()` rows of `n_bits / 64` words each).
    pub fn new(words: Vec<String>, n_bits: usize, codes: Vec<u64>) -> Result<Self> {
        let packer = BitPacker::new(n_bits)?;
        let expected = words.len() * packer.words_per_code();
        if codes.len() != expected {
            return Err(NlbError::Config(format!(
                "{} words of {} bits need {} packed words, got {}",
                words.len(),
                n_bits,
                expected,
                codes.len()
            )));
        }
        Ok(Self {
            words,
            packer,
            codes,
        })
    }

    /// Number of codes.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True when the collection holds no codes.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Code length in bits.
    pub fn n_bits(&self) -> usize {
        self.packer.n_bits()
    }

    /// Packed words per code.
    pub fn words_per_code(&self) -> usize {
        self.packer.words_per_code()
    }

    /// Packed code of row `index`.
    pub fn code(&self, index: usize) -> Option<&[u64]> {
        let w = self.words_per_code();
        self.codes.get(index * w..(index + 1) * w)
    }

    /// Code of row `index`; panics when out of range.
    fn row(&self, index: usize) -> &[u64] {
        let w = self.words_per_code();
        &self.codes[index * w..(index + 1) * w]
    }

    /// Vocabulary word of row `index`.
    pub fn word(&self, index: usize) -> Option<&str> {
        self.words.get(index).map(String::as_str)
    }

    /// All vocabulary words, in row order.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Iterate `(word, code)` pairs in row order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u64])> + '_ {
        self.words
            .iter()
            .map(String::as_str)
            .zip(self.codes.chunks_exact(self.words_per_code()))
    }

    /// Memory used by the packed codes, in bytes.
    pub fn memory_usage(&self) -> usize {
        self.codes.len() * std::mem::size_of::<u64>()
    }
}

/// Similarity queries and exact top-k retrieval over a [`BinaryEmbedding`].
#[derive(Debug, Clone, Copy)]
pub struct HammingSimilarityEngine<'a> {
    codes: &'a BinaryEmbedding,
}

impl<'a> HammingSimilarityEngine<'a> {
    /// Engine over a read-only collection.
    pub fn new(codes: &'a BinaryEmbedding) -> Self {
        Self { codes }
    }

    /// The searched collection.
    pub fn codes(&self) -> &'a BinaryEmbedding {
        self.codes
    }

    fn code(&self, index: usize) -> Result<&'a [u64]> {
        self.codes.code(index).ok_or_else(|| {
            NlbError::Lookup(format!(
                "row {index} out of range for {} codes",
                self.codes.len()
            ))
        })
    }

    /// Similarity between rows `a` and `b`.
    ///
    /// Panics if either index is out of range.
    pub fn sim(&self, a: usize, b: usize) -> f32 {
        hamming_similarity(self.codes.row(a), self.codes.row(b))
    }

    /// The `k` rows most similar to row `query`, excluding `query` itself.
    pub fn top_k(&self, query: usize, k: usize) -> Result<Vec<Neighbor>> {
        let q = self.code(query)?;
        self.top_k_for_code(q, k, Some(query))
    }

    /// Parallel version of [`Self::top_k`], identical results.
    pub fn par_top_k(&self, query: usize, k: usize) -> Result<Vec<Neighbor>> {
        let q = self.code(query)?;
        let codes = self.codes;
        Ok(topk::par_select(codes.len(), k, Some(query), SHARD_SIZE, |i| {
            hamming_similarity(q, codes.row(i))
        }))
    }

    /// The `k` rows most similar to an arbitrary code of the collection's
    /// width.
    pub fn top_k_for_code(
        &self,
        query: &[u64],
        k: usize,
        exclude: Option<usize>,
    ) -> Result<Vec<Neighbor>> {
        let codes = self.codes;
        if query.len() != codes.words_per_code() {
            return Err(NlbError::Config(format!(
                "query has {} words, collection codes have {}",
                query.len(),
                codes.words_per_code()
            )));
        }
        Ok(topk::select(codes.len(), k, exclude, |i| {
            hamming_similarity(query, codes.row(i))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::packer::flip;
    use approx::assert_relative_eq;

    fn collection() -> BinaryEmbedding {
        let words = ["king", "queen", "apple", "pear"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let codes = vec![
            0xFFFF_0000_FFFF_0000,
            0xFFFF_0000_FFFF_000F,
            0x0000_FFFF_0000_FFFF,
            0x0000_FFFF_0000_FF0F,
        ];
        BinaryEmbedding::new(words, 64, codes).unwrap()
    }

    #[test]
    fn test_self_similarity_is_one() {
        let code = vec![0x1234_5678_9ABC_DEF0u64, 0];
        assert_eq!(hamming_similarity(&code, &code), 1.0);
    }

    #[test]
    fn test_symmetric_and_zero_for_complement() {
        let a = vec![0b1010_1010u64];
        let b = vec![0b1100_1100u64];
        assert_eq!(hamming_similarity(&a, &b), hamming_similarity(&b, &a));
        assert_eq!(hamming_similarity(&a, &[!a[0]]), 0.0);
    }

    #[test]
    fn test_m_differing_bits() {
        let base = vec![0xAAAA_5555_0F0F_F0F0u64, 0x0123_4567_89AB_CDEF];
        for m in [0usize, 1, 5, 64, 100, 128] {
            let mut other = base.clone();
            for j in 0..m {
                flip(&mut other, j);
            }
            assert_relative_eq!(
                hamming_similarity(&base, &other),
                (128 - m) as f32 / 128.0
            );
        }
    }

    #[test]
    fn test_collection_rejects_bad_width() {
        assert!(BinaryEmbedding::new(vec!["a".into()], 128, vec![0]).is_err());
        assert!(BinaryEmbedding::new(vec!["a".into()], 60, vec![0]).is_err());
    }

    #[test]
    fn test_top_k_nearest() {
        let codes = collection();
        let engine = HammingSimilarityEngine::new(&codes);

        let result = engine.top_k(0, 2).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(codes.word(result[0].index), Some("queen"));
        assert!(result[0].similarity >= result[1].similarity);
        assert!(result.iter().all(|n| n.index != 0));
        assert_relative_eq!(result[0].similarity, 60.0 / 64.0);
    }

    #[test]
    fn test_top_k_unknown_row() {
        let codes = collection();
        let engine = HammingSimilarityEngine::new(&codes);
        assert!(matches!(engine.top_k(9, 2), Err(NlbError::Lookup(_))));
    }

    #[test]
    fn test_par_top_k_matches() {
        let codes = collection();
        let engine = HammingSimilarityEngine::new(&codes);
        for q in 0..codes.len() {
            assert_eq!(engine.top_k(q, 3).unwrap(), engine.par_top_k(q, 3).unwrap());
        }
    }

    #[test]
    fn test_top_k_for_code_checks_width() {
        let words = vec!["a".to_string(), "b".to_string()];
        let codes = BinaryEmbedding::new(words, 128, vec![0, u64::MAX, u64::MAX, 0]).unwrap();
        let engine = HammingSimilarityEngine::new(&codes);

        assert!(matches!(
            engine.top_k_for_code(&[0u64], 2, None),
            Err(NlbError::Config(_))
        ));
        assert!(engine.top_k_for_code(&[0u64, 0, 0], 2, None).is_err());

        // Each row is scored against its own two words.
        let result = engine.top_k_for_code(&[0u64, u64::MAX], 2, None).unwrap();
        assert_eq!(result[0].index, 0);
        assert_eq!(result[0].similarity, 1.0);
        assert_eq!(result[1].index, 1);
        assert_eq!(result[1].similarity, 0.0);
    }

    #[test]
    fn test_iter_and_memory() {
        let codes = collection();
        assert_eq!(codes.iter().count(), 4);
        assert_eq!(codes.memory_usage(), 32);
        assert_eq!(codes.code(3), Some(&[0x0000_FFFF_0000_FF0Fu64][..]));
        assert_eq!(codes.code(4), None);
    }
}
