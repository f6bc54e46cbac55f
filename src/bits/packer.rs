//! BitPacker: converts sign bits to fixed-width packed words and back.
//!
//! Bit `j` of a logical code lives in word `j / 64`, at bit position
//! `63 - j % 64` (most-significant-bit first), so the decimal form of each
//! word reads left to right in code order.

use crate::errors::{NlbError, Result};

/// Width of one packed word in bits.
pub const WORD_BITS: usize = u64::BITS as usize;

/// Where a logical bit lives inside a packed code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitLocation {
    /// Position of the bit in the logical code.
    pub bit_index: usize,
    /// Index of the word holding the bit.
    pub word_index: usize,
    /// Offset of the bit inside its word, counted from the most significant end.
    pub bit_in_word: usize,
}

impl BitLocation {
    /// Locate logical bit `bit_index`.
    #[inline]
    pub const fn of(bit_index: usize) -> Self {
        Self {
            bit_index,
            word_index: bit_index / WORD_BITS,
            bit_in_word: bit_index % WORD_BITS,
        }
    }

    /// Left shift that moves a `1` onto this bit.
    #[inline]
    pub const fn shift(&self) -> u32 {
        (WORD_BITS - 1 - self.bit_in_word) as u32
    }

    /// Single-bit mask for this location within its word.
    #[inline]
    pub const fn mask(&self) -> u64 {
        1u64 << self.shift()
    }
}

/// Packs codes of a fixed length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitPacker {
    n_bits: usize,
}

impl BitPacker {
    /// Create a packer for `n_bits`-bit codes.
    ///
    /// `n_bits` must be a positive multiple of [`WORD_BITS`].
    pub fn new(n_bits: usize) -> Result<Self> {
        if n_bits == 0 || n_bits % WORD_BITS != 0 {
            return Err(NlbError::Config(format!(
                "n_bits ({n_bits}) must be a positive multiple of {WORD_BITS}"
            )));
        }
        Ok(Self { n_bits })
    }

    /// Code length in bits.
    pub fn n_bits(&self) -> usize {
        self.n_bits
    }

    /// Number of `u64` words per packed code.
    pub fn words_per_code(&self) -> usize {
        self.n_bits / WORD_BITS
    }

    /// Locate logical bit `j`.
    pub fn locate(&self, j: usize) -> BitLocation {
        debug_assert!(j < self.n_bits);
        BitLocation::of(j)
    }

    /// Pack a sequence of exactly `n_bits` bits.
    pub fn pack(&self, bits: &[bool]) -> Result<Vec<u64>> {
        if bits.len() != self.n_bits {
            return Err(NlbError::Config(format!(
                "expected {} bits, got {}",
                self.n_bits,
                bits.len()
            )));
        }
        let mut out = vec![0u64; self.words_per_code()];
        pack_into(bits.iter().copied(), &mut out);
        Ok(out)
    }

    /// Threshold real activations (`> 0` is a 1 bit, anything else a 0) and
    /// pack them into `out`.
    ///
    /// Panics unless `activations` yields exactly `n_bits` values and `out`
    /// holds `words_per_code()` words.
    pub fn pack_activations<I>(&self, activations: I, out: &mut [u64])
    where
        I: IntoIterator<Item = f32>,
    {
        assert_eq!(out.len(), self.words_per_code(), "output width mismatch");
        let packed = pack_into(activations.into_iter().map(|v| v > 0.0), out);
        assert_eq!(packed, self.n_bits, "activation count mismatch");
    }

    /// Expand a packed code back into bits.
    pub fn unpack(&self, code: &[u64]) -> Result<Vec<bool>> {
        if code.len() != self.words_per_code() {
            return Err(NlbError::Config(format!(
                "expected {} words, got {}",
                self.words_per_code(),
                code.len()
            )));
        }
        Ok((0..self.n_bits)
            .map(|j| {
                let loc = self.locate(j);
                code[loc.word_index] & loc.mask() != 0
            })
            .collect())
    }
}

/// Read logical bit `j` of a packed code.
#[inline]
pub fn bit(code: &[u64], j: usize) -> bool {
    let loc = BitLocation::of(j);
    code[loc.word_index] & loc.mask() != 0
}

/// Flip logical bit `j` of a packed code.
#[inline]
pub fn flip(code: &mut [u64], j: usize) {
    let loc = BitLocation::of(j);
    code[loc.word_index] ^= loc.mask();
}

/// Shift-and-or accumulation: each new bit enters at the low end, so the
/// first bit of a word ends up most significant once the word is full.
///
/// Returns the number of bits consumed. Stops once `out` is full, so a longer
/// input reports at least one bit more than `out` can hold.
fn pack_into<I: Iterator<Item = bool>>(bits: I, out: &mut [u64]) -> usize {
    let capacity = out.len() * WORD_BITS;
    let mut acc = 0u64;
    let mut count = 0usize;
    for b in bits {
        if count == capacity {
            return count + 1;
        }
        acc = (acc << 1) | u64::from(b);
        count += 1;
        if count % WORD_BITS == 0 {
            out[count / WORD_BITS - 1] = acc;
            acc = 0;
        }
    }
    count
}
