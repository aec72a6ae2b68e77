//! Numeric helper functions for the Nimbus forecasting engine.

/// Arithmetic mean of a slice. Returns 0.0 if empty.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let sum: f64 = data.iter().sum();
    sum / data.len() as f64
}

/// L1 distance `sum(|a[i] - b[i]|)` between two equal-length vectors.
///
/// # Panics
///
/// Panics if the slices differ in length.
pub fn l1_distance(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "l1_distance: length mismatch");
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

/// Divides every element by the slice sum so it sums to 1.0.
///
/// Returns `false` and leaves the slice untouched if the sum is not a
/// positive finite number.
#[must_use]
pub fn normalize(probs: &mut [f64]) -> bool {
    let s: f64 = probs.iter().sum();
    if !s.is_finite() || s <= 0.0 {
        return false;
    }
    for p in probs.iter_mut() {
        *p /= s;
    }
    true
}

/// Relative frequency of each index `0..n_states` in `seq`.
///
/// Returns all zeros for an empty sequence. Indices `>= n_states` are ignored.
pub fn frequencies(seq: &[usize], n_states: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_states];
    for &s in seq {
        if s < n_states {
            counts[s] += 1;
        }
    }
    if seq.is_empty() {
        return vec![0.0; n_states];
    }
    let total = seq.len() as f64;
    counts.into_iter().map(|c| c as f64 / total).collect()
}

/// Splits a sequence into maximal runs of identical values.
///
/// Returns `(value, run_length)` pairs in sequence order.
pub fn runs(seq: &[usize]) -> Vec<(usize, usize)> {
    let mut out: Vec<(usize, usize)> = Vec::new();
    for &s in seq {
        match out.last_mut() {
            Some((v, len)) if *v == s => *len += 1,
            _ => out.push((s, 1)),
        }
    }
    out
}

/// Mean run length of each index `0..n_states` in `seq`.
///
/// `None` for states that never occur. A run truncated by the end of the
/// sequence still counts with its observed length.
pub fn mean_run_lengths(seq: &[usize], n_states: usize) -> Vec<Option<f64>> {
    let mut lengths: Vec<Vec<f64>> = vec![Vec::new(); n_states];
    for (s, len) in runs(seq) {
        if s < n_states {
            lengths[s].push(len as f64);
        }
    }
    lengths
        .iter()
        .map(|l| (!l.is_empty()).then(|| mean(l)))
        .collect()
}
