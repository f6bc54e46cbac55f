//! Text formats for real-valued and packed binary embeddings.
//!
//! Real: header line `<n_vecs> <n_dims>`, then one `<word> <f32>×n_dims`
//! record per line.
//! Binary: header line `<n_vecs> <n_bits>`, then one `<word> <u64>×(n_bits/64)`
//! record per line.
//! Fields are whitespace-separated; blank lines are ignored.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::iter::Enumerate;
use std::path::Path;
use std::str::{FromStr, Lines};

use ndarray::Array2;

use crate::bits::BitPacker;
use crate::errors::{try_with_capacity, NlbError, Result};
use crate::search::{BinaryEmbedding, RealEmbedding};

/// Line-by-line record reader over one file, reporting errors against its
/// path and line number.
struct Records<'a> {
    path: &'a Path,
    lines: Enumerate<Lines<'a>>,
}

impl<'a> Records<'a> {
    fn new(path: &'a Path, text: &'a str) -> Self {
        Self {
            path,
            lines: text.lines().enumerate(),
        }
    }

    fn err(&self, lineno: usize, message: impl Display) -> NlbError {
        NlbError::parse(self.path, format!("line {lineno}: {message}"))
    }

    /// Next non-blank line: its 1-based number and its fields.
    fn next_line(&mut self) -> Option<(usize, Vec<&'a str>)> {
        for (i, line) in self.lines.by_ref() {
            let fields: Vec<&'a str> = line.split_whitespace().collect();
            if !fields.is_empty() {
                return Some((i + 1, fields));
            }
        }
        None
    }

    fn parse_field<T>(&self, lineno: usize, field: &str, what: impl Display) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        field
            .parse()
            .map_err(|e| self.err(lineno, format!("invalid {what} {field:?}: {e}")))
    }

    /// The header line: exactly two integers.
    fn header(&mut self, second: &str) -> Result<(usize, usize)> {
        let (lineno, fields) = self
            .next_line()
            .ok_or_else(|| NlbError::parse(self.path, "empty file, expected a header"))?;
        let &[count, size] = fields.as_slice() else {
            return Err(self.err(
                lineno,
                format!(
                    "header must be `<n_vecs> <{second}>`, found {} fields",
                    fields.len()
                ),
            ));
        };
        Ok((
            self.parse_field(lineno, count, "vector count")?,
            self.parse_field(lineno, size, second)?,
        ))
    }

    /// Record number `record` (1-based): a word followed by exactly `n`
    /// values, which are appended to `values`.
    fn record<T>(&mut self, record: usize, n: usize, values: &mut Vec<T>) -> Result<&'a str>
    where
        T: FromStr,
        T::Err: Display,
    {
        let (lineno, fields) = self.next_line().ok_or_else(|| {
            NlbError::parse(
                self.path,
                format!("unexpected end of file, expected record {record}"),
            )
        })?;
        let word = fields[0];
        if fields.len() != n + 1 {
            return Err(self.err(
                lineno,
                format!(
                    "record {record} ({word}) has {} values, expected {n}",
                    fields.len() - 1
                ),
            ));
        }
        for (i, field) in fields[1..].iter().enumerate() {
            let what = format!("value {} of record {record} ({word})", i + 1);
            values.push(self.parse_field(lineno, field, what)?);
        }
        Ok(word)
    }

    /// Fail unless only blank lines remain.
    fn finish(mut self, n_vecs: usize) -> Result<()> {
        match self.next_line() {
            None => Ok(()),
            Some((lineno, fields)) => Err(self.err(
                lineno,
                format!("trailing data after {n_vecs} records, starting at {:?}", fields[0]),
            )),
        }
    }
}

/// Room to reserve for `wanted` values: every value takes at least two bytes
/// of text, so a header larger than the file cannot force a huge allocation.
fn capacity_hint(wanted: usize, text: &str) -> usize {
    wanted.min(text.len() / 2)
}

/// Read a real-valued embedding. Exactly `n_vecs` records must follow the
/// header.
pub fn read_embedding(path: impl AsRef<Path>) -> Result<RealEmbedding> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let mut records = Records::new(path, &text);

    let (n_vecs, n_dims) = records.header("n_dims")?;
    if n_dims == 0 {
        return Err(NlbError::parse(path, "dimension must be positive"));
    }

    let mut values: Vec<f32> = try_with_capacity(
        capacity_hint(n_vecs.saturating_mul(n_dims), &text),
        "embedding matrix",
    )?;
    let mut words = Vec::with_capacity(capacity_hint(n_vecs, &text));
    for record in 1..=n_vecs {
        words.push(records.record(record, n_dims, &mut values)?.to_string());
    }
    records.finish(n_vecs)?;

    tracing::debug!(path = %path.display(), n_vecs, n_dims, "loaded embedding");
    let vectors = Array2::from_shape_vec((n_vecs, n_dims), values)?;
    RealEmbedding::new(words, vectors)
}

/// Read packed binary codes. `n_bits` must be a multiple of 64.
pub fn read_binary(path: impl AsRef<Path>) -> Result<BinaryEmbedding> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let mut records = Records::new(path, &text);

    let (n_vecs, n_bits) = records.header("n_bits")?;
    let wpc = BitPacker::new(n_bits)?.words_per_code();

    let mut codes: Vec<u64> = try_with_capacity(
        capacity_hint(n_vecs.saturating_mul(wpc), &text),
        "binary codes",
    )?;
    let mut words = Vec::with_capacity(capacity_hint(n_vecs, &text));
    for record in 1..=n_vecs {
        words.push(records.record(record, wpc, &mut codes)?.to_string());
    }
    records.finish(n_vecs)?;

    tracing::debug!(path = %path.display(), n_vecs, n_bits, "loaded binary codes");
    BinaryEmbedding::new(words, n_bits, codes)
}

/// Write packed codes in the binary text format.
pub fn write_binary(path: impl AsRef<Path>, codes: &BinaryEmbedding) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{} {}", codes.len(), codes.n_bits())?;
    for (word, code) in codes.iter() {
        write!(out, "{word}")?;
        for w in code {
            write!(out, " {w}")?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

/// Write a real-valued embedding in the text format read by
/// [`read_embedding`].
pub fn write_embedding(path: impl AsRef<Path>, embedding: &RealEmbedding) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{} {}", embedding.len(), embedding.n_dims())?;
    for (word, row) in embedding.words().iter().zip(embedding.vectors().outer_iter()) {
        write!(out, "{word}")?;
        for v in row {
            write!(out, " {v}")?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
