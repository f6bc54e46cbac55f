//! Embedding file formats and vocabulary lookup.

pub mod loader;
pub mod vocab;

pub use loader::{read_binary, read_embedding, write_binary, write_embedding};
pub use vocab::VocabIndex;
