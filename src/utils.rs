//! Common utilities used across the crate.
//!
//! Small numeric helpers shared by the vote decoder and the importance
//! reporting path.

// =============================================================================
// Ranking
// =============================================================================

/// Index of the maximum value, first index winning on ties.
///
/// A later value must be strictly greater to replace the current best, so
/// exact ties prefer the lower index.
///
/// # Panics
///
/// Panics if `values` is empty.
#[inline]
pub fn argmax_first<T: PartialOrd>(values: &[T]) -> usize {
    assert!(!values.is_empty(), "argmax over an empty slice");
    let mut best = 0;
    for (index, value) in values.iter().enumerate().skip(1) {
        if *value > values[best] {
            best = index;
        }
    }
    best
}

/// Indices of `values` ordered by descending value.
///
/// Ties are broken by ascending index, so rankings are deterministic.
pub fn argsort_desc(values: &[f32]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));
    indices
}

// =============================================================================
// Normalization
// =============================================================================

/// Scale `values` in place so they sum to 1.
///
/// Returns `false` and leaves the slice untouched when the sum is zero;
/// callers decide whether that is an error or a benign empty aggregate.
#[inline]
pub fn normalize_in_place(values: &mut [f32]) -> bool {
    let sum: f32 = values.iter().sum();
    if sum == 0.0 {
        return false;
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
    true
}
