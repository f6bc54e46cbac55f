//! Error types for nlb-core.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for binarization, search and evaluation.
#[derive(Debug, Error)]
pub enum NlbError {
    /// Invalid or missing configuration (bad `n_bits`, missing input path, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed embedding, binary or dataset file.
    #[error("parse error in {}: {message}", path.display())]
    Parse {
        /// File being read.
        path: PathBuf,
        /// What went wrong, including the record number when known.
        message: String,
    },

    /// A buffer the run depends on could not be allocated.
    #[error("allocation error: cannot reserve {bytes} bytes for {what}")]
    Allocation {
        /// Name of the buffer.
        what: &'static str,
        /// Requested size in bytes.
        bytes: usize,
    },

    /// A required word or row index is absent.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// Matrix shape mismatch.
    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// I/O error wrapper.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (metadata / config) error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl NlbError {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        NlbError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for nlb-core operations.
pub type Result<T> = std::result::Result<T, NlbError>;

/// Reserve room for `len` elements, reporting failure instead of aborting.
pub(crate) fn try_with_capacity<T>(len: usize, what: &'static str) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| NlbError::Allocation {
        what,
        bytes: len.saturating_mul(std::mem::size_of::<T>()),
    })?;
    Ok(buf)
}

/// Allocate a zeroed vector up front, reporting failure instead of aborting.
pub(crate) fn try_zeroed<T: Clone + Default>(len: usize, what: &'static str) -> Result<Vec<T>> {
    let mut buf = try_with_capacity(len, what)?;
    buf.resize(len, T::default());
    Ok(buf)
}
