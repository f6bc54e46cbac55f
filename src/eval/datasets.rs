//! Word-similarity benchmarks: `<word1> <word2> <score>` per line.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::corpus::VocabIndex;
use crate::errors::{NlbError, Result};
use crate::eval::spearman::spearman;

/// One human-scored word pair. Words are stored lower-cased.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPair {
    pub first: String,
    pub second: String,
    pub score: f32,
}

/// A named list of scored pairs, usually one benchmark file.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityDataset {
    pub name: String,
    pub pairs: Vec<ScoredPair>,
}

impl SimilarityDataset {
    /// Parse dataset text. Blank lines are skipped; any other line must hold
    /// exactly two words and a score.
    pub fn parse(name: impl Into<String>, path: &Path, text: &str) -> Result<Self> {
        let mut pairs = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [] => continue,
                [first, second, score] => {
                    let score = score.parse::<f32>().map_err(|e| {
                        NlbError::parse(path, format!("line {}: bad score {score:?}: {e}", lineno + 1))
                    })?;
                    pairs.push(ScoredPair {
                        first: first.to_lowercase(),
                        second: second.to_lowercase(),
                        score,
                    });
                }
                _ => {
                    return Err(NlbError::parse(
                        path,
                        format!("line {}: expected `word word score`", lineno + 1),
                    ))
                }
            }
        }
        Ok(Self {
            name: name.into(),
            pairs,
        })
    }

    /// Load a dataset file; its name is the file name.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::parse(name, path, &text)
    }
}

/// Outcome of scoring one dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetReport {
    pub name: String,
    /// Pairs in the dataset.
    pub pairs_total: usize,
    /// Pairs whose two words are both in the vocabulary.
    pub pairs_found: usize,
    /// `None` when fewer than two usable pairs remain or the scores are constant.
    pub spearman: Option<f32>,
}

impl DatasetReport {
    /// Share of pairs skipped because a word was out of vocabulary.
    pub fn oov_ratio(&self) -> f32 {
        if self.pairs_total == 0 {
            0.0
        } else {
            (self.pairs_total - self.pairs_found) as f32 / self.pairs_total as f32
        }
    }
}

/// Correlate human scores with `sim` over the in-vocabulary pairs.
pub fn evaluate_dataset<F>(dataset: &SimilarityDataset, vocab: &VocabIndex, sim: F) -> DatasetReport
where
    F: Fn(usize, usize) -> f32,
{
    let mut expected = Vec::with_capacity(dataset.pairs.len());
    let mut actual = Vec::with_capacity(dataset.pairs.len());
    for pair in &dataset.pairs {
        let (Some(a), Some(b)) = (vocab.get_index(&pair.first), vocab.get_index(&pair.second))
        else {
            continue;
        };
        expected.push(pair.score);
        actual.push(sim(a, b));
    }

    let report = DatasetReport {
        name: dataset.name.clone(),
        pairs_total: dataset.pairs.len(),
        pairs_found: expected.len(),
        spearman: spearman(&expected, &actual),
    };
    tracing::debug!(
        dataset = %report.name,
        found = report.pairs_found,
        total = report.pairs_total,
        "evaluated dataset"
    );
    report
}

/// Evaluate every file in `dir`, in file-name order.
///
/// An unreadable directory is an error; a dataset that cannot be read or
/// parsed is logged and skipped.
pub fn evaluate_dir<F>(dir: &Path, vocab: &VocabIndex, sim: F) -> Result<Vec<DatasetReport>>
where
    F: Fn(usize, usize) -> f32,
{
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut reports = Vec::with_capacity(paths.len());
    for path in paths {
        match SimilarityDataset::from_file(&path) {
            Ok(dataset) => reports.push(evaluate_dataset(&dataset, vocab, &sim)),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping dataset"),
        }
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dataset(text: &str) -> SimilarityDataset {
        SimilarityDataset::parse("test.txt", Path::new("test.txt"), text).unwrap()
    }

    #[test]
    fn test_parse_lowercases_and_skips_blank_lines() {
        let ds = dataset("Tiger Cat 7.35\n\n  book paper 7.46\n");
        assert_eq!(ds.pairs.len(), 2);
        assert_eq!(ds.pairs[0].first, "tiger");
        assert_eq!(ds.pairs[0].second, "cat");
        assert_relative_eq!(ds.pairs[1].score, 7.46);
    }

    #[test]
    fn test_malformed_line() {
        let path = Path::new("bad.txt");
        assert!(SimilarityDataset::parse("bad", path, "a b\n").is_err());
        assert!(SimilarityDataset::parse("bad", path, "a b high\n").is_err());
    }

    #[test]
    fn test_oov_pairs_are_counted_not_fatal() {
        let vocab = VocabIndex::from_words(["a", "b", "c"], true);
        let ds = dataset("a b 1\nb c 2\na c 3\na zzz 4\n");
        // Similarity grows with the index sum, matching the scores.
        let report = evaluate_dataset(&ds, &vocab, |i, j| (i + j) as f32);

        assert_eq!(report.pairs_total, 4);
        assert_eq!(report.pairs_found, 3);
        assert_relative_eq!(report.oov_ratio(), 0.25);
        // Index sums 1, 3, 2 against scores 1, 2, 3.
        assert_relative_eq!(report.spearman.unwrap(), 0.5);
    }

    #[test]
    fn test_empty_report() {
        let vocab = VocabIndex::new();
        let report = evaluate_dataset(&dataset(""), &vocab, |_, _| 0.0);
        assert_eq!(report.oov_ratio(), 0.0);
        assert_eq!(report.spearman, None);
    }

    #[test]
    fn test_evaluate_dir_skips_bad_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "x y 1\ny z 2\nx z 3\n").unwrap();
        std::fs::write(dir.path().join("a.txt"), "x y 1\nx z 2\n").unwrap();
        std::fs::write(dir.path().join("c.txt"), "broken line here extra\n").unwrap();

        let vocab = VocabIndex::from_words(["x", "y", "z"], true);
        let reports = evaluate_dir(dir.path(), &vocab, |i, j| (i + j) as f32).unwrap();

        let names: Vec<&str> = reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
        assert_relative_eq!(reports[0].spearman.unwrap(), 1.0);
    }

    #[test]
    fn test_missing_dir_is_error() {
        let vocab = VocabIndex::new();
        assert!(evaluate_dir(Path::new("/nonexistent/datasets"), &vocab, |_, _| 0.0).is_err());
    }
}
