//! Bounded top-k selection.
//!
//! A `k + 1` slot buffer kept sorted by descending similarity. New candidates
//! go into the spare last slot and bubble up while strictly greater than
//! their predecessor, so among equal scores the earlier candidate stays ahead.

use rayon::prelude::*;
use serde::Serialize;

/// A candidate and its similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    /// Row index in the searched collection.
    pub index: usize,
    /// Similarity to the query (higher is closer).
    pub similarity: f32,
}

/// Fixed-capacity buffer of the best candidates seen so far.
#[derive(Debug, Clone)]
pub struct TopK {
    k: usize,
    slots: Vec<Neighbor>,
}

impl TopK {
    /// Buffer retaining the `k` best candidates.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            slots: Vec::with_capacity(k + 1),
        }
    }

    /// Number of candidates currently retained (at most `k`).
    pub fn len(&self) -> usize {
        self.slots.len().min(self.k)
    }

    /// True when nothing has been retained yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offer a candidate.
    pub fn offer(&mut self, candidate: Neighbor) {
        if self.k == 0 {
            return;
        }
        if self.slots.len() > self.k {
            // Full: a candidate that cannot beat the k-th entry would stay
            // in the spare slot.
            if candidate.similarity <= self.slots[self.k - 1].similarity {
                return;
            }
            self.slots[self.k] = candidate;
        } else {
            self.slots.push(candidate);
        }

        let mut j = self.slots.len() - 1;
        while j > 0 && self.slots[j].similarity > self.slots[j - 1].similarity {
            self.slots.swap(j, j - 1);
            j -= 1;
        }
    }

    /// The retained candidates, best first.
    pub fn into_sorted_vec(mut self) -> Vec<Neighbor> {
        self.slots.truncate(self.k);
        self.slots
    }
}

/// Sequential scan of candidates `0..n`, skipping `exclude`.
pub fn select<F>(n: usize, k: usize, exclude: Option<usize>, score: F) -> Vec<Neighbor>
where
    F: Fn(usize) -> f32,
{
    let mut topk = TopK::new(k);
    for index in (0..n).filter(|&i| Some(i) != exclude) {
        topk.offer(Neighbor {
            index,
            similarity: score(index),
        });
    }
    topk.into_sorted_vec()
}

/// Sharded parallel scan with the same result as [`select`].
///
/// Every shard keeps a local top-k; the shard results are then offered, in
/// shard order, to a final buffer, which preserves the tie order of the
/// sequential scan.
pub fn par_select<F>(
    n: usize,
    k: usize,
    exclude: Option<usize>,
    shard_size: usize,
    score: F,
) -> Vec<Neighbor>
where
    F: Fn(usize) -> f32 + Sync,
{
    if k == 0 || n == 0 {
        return Vec::new();
    }
    let shard_size = shard_size.max(1);
    let n_shards = (n + shard_size - 1) / shard_size;

    let locals: Vec<Vec<Neighbor>> = (0..n_shards)
        .into_par_iter()
        .map(|s| {
            let start = s * shard_size;
            let end = (start + shard_size).min(n);
            let mut topk = TopK::new(k);
            for index in (start..end).filter(|&i| Some(i) != exclude) {
                topk.offer(Neighbor {
                    index,
                    similarity: score(index),
                });
            }
            topk.into_sorted_vec()
        })
        .collect();

    let mut merged = TopK::new(k);
    for candidate in locals.into_iter().flatten() {
        merged.offer(candidate);
    }
    merged.into_sorted_vec()
}
