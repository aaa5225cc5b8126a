//! Encoding and decoding of aggregated vote rows.

use thiserror::Error;

use crate::utils::{argmax_first, normalize_in_place};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum VoteError {
    /// The per-row total must equal the number of trees that voted. Anything
    /// else means a worker dropped out or voted twice.
    #[error("vote row {row}: total {got} does not match the {expected} contributing trees")]
    TotalMismatch { row: usize, expected: u64, got: u64 },

    #[error("vote row {row}: no votes accumulated")]
    EmptyRow { row: usize },
}

// =============================================================================
// Encoding and decoding
// =============================================================================

/// Convert per-label vote counts into one dense delta row for
/// [`SharedTable::batch_increment`].
///
/// [`SharedTable::batch_increment`]: crate::training::SharedTable::batch_increment
#[inline]
pub fn encode_votes(votes: &[u32]) -> Vec<f64> {
    votes.iter().map(|&v| f64::from(v)).collect()
}

/// One decoded vote row: the winning label and the normalized distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedVotes {
    pub label: u32,
    /// Vote shares per label, summing to one.
    pub proba: Vec<f32>,
}

/// Decode one accumulated vote row.
///
/// The winner is the label with the most votes; on a tie the lowest label
/// index wins. `expected_trees` enforces the aggregation invariant that
/// every contributing tree voted exactly once.
pub fn decode_row(
    row_index: usize,
    row: &[f64],
    expected_trees: u64,
) -> Result<DecodedVotes, VoteError> {
    // Cells hold exact integer-valued sums, so rounding only strips
    // representation noise.
    let counts: Vec<u64> = row.iter().map(|&v| v.round() as u64).collect();
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return Err(VoteError::EmptyRow { row: row_index });
    }
    if total != expected_trees {
        return Err(VoteError::TotalMismatch {
            row: row_index,
            expected: expected_trees,
            got: total,
        });
    }

    let label = argmax_first(&counts) as u32;
    let mut proba: Vec<f32> = row.iter().map(|&v| v as f32).collect();
    let normalized = normalize_in_place(&mut proba);
    debug_assert!(normalized);
    Ok(DecodedVotes { label, proba })
}

// =============================================================================
// Tests
// =============================================================================
