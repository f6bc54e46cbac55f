//! Spearman rank correlation.

/// 1-based ranks; tied values share the average of the ranks they span.
/// Returns the ranks and whether any ties were found.
fn average_ranks(values: &[f32]) -> (Vec<f64>, bool) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut tied = false;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        tied |= end - start > 1;
        // Positions start..end hold ranks start+1..=end.
        let rank = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    (ranks, tied)
}

fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some(cov / (var_a * var_b).sqrt())
}

/// Spearman's ρ between two paired score sequences.
///
/// `None` when the lengths differ, fewer than two pairs are given, or one
/// side is constant.
pub fn spearman(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let (rank_a, tied_a) = average_ranks(a);
    let (rank_b, tied_b) = average_ranks(b);

    let rho = if tied_a || tied_b {
        pearson(&rank_a, &rank_b)?
    } else {
        let n = a.len() as f64;
        let d2: f64 = rank_a
            .iter()
            .zip(&rank_b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum();
        1.0 - 6.0 * d2 / (n * (n * n - 1.0))
    };
    Some(rho as f32)
}
