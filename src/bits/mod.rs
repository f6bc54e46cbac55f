//! Bit packing of binary codes into `u64` words.

pub mod packer;

pub use packer::{BitLocation, BitPacker, WORD_BITS};
