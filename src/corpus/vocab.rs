//! Word ↔ row-index mapping.

use ahash::AHashMap;

/// Vocabulary owned by the caller. Indices are dense and follow insertion
/// order, so they line up with embedding rows when built from a loader's
/// word list.
#[derive(Debug, Clone, Default)]
pub struct VocabIndex {
    forward: AHashMap<String, usize>,
    reverse: Vec<Option<String>>,
}

impl VocabIndex {
    /// Empty vocabulary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from words in row order. Repeated words keep their first index.
    pub fn from_words<I, S>(words: I, keep_reverse: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self::new();
        for word in words {
            vocab.add_word(word.as_ref(), keep_reverse);
        }
        vocab
    }

    /// Insert `word` if absent and return its index.
    ///
    /// With `keep_reverse == false` no string is stored for the reverse
    /// lookup; a later call with `true` fills it in.
    pub fn add_word(&mut self, word: &str, keep_reverse: bool) -> usize {
        if let Some(&index) = self.forward.get(word) {
            if keep_reverse && self.reverse[index].is_none() {
                self.reverse[index] = Some(word.to_string());
            }
            return index;
        }
        let index = self.reverse.len();
        self.forward.insert(word.to_string(), index);
        self.reverse.push(keep_reverse.then(|| word.to_string()));
        index
    }

    /// Index of `word`, if present.
    pub fn get_index(&self, word: &str) -> Option<usize> {
        self.forward.get(word).copied()
    }

    /// Word stored for `index` in the reverse map.
    pub fn word(&self, index: usize) -> Option<&str> {
        self.reverse.get(index)?.as_deref()
    }

    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }
}
