//! Randomized gain-ratio split finding for one tree node.
//!
//! A [`SplitFinder`] accumulates the weighted `(feature value, label)`
//! observations of a single node for a single feature, then searches for the
//! threshold with the best gain ratio. Candidate thresholds are drawn
//! uniformly at random strictly inside each interval between adjacent
//! distinct feature values; this randomization is the primary source of
//! inter-tree diversity together with feature and instance subsampling.
//!
//! The search keeps left/right class-weight distributions incrementally: the
//! entries are sorted once and a single cursor moves weight from right to
//! left as candidate thresholds increase, never re-scanning from the start.

use rand::Rng;

// =============================================================================
// Types
// =============================================================================

/// One weighted observation at a tree node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureEntry {
    pub feature_val: f32,
    pub label: u32,
    pub weight: f32,
}

/// Outcome of a split search over one node's entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitSearch {
    /// Fewer than two distinct feature values: no internal threshold exists.
    Degenerate { value: f32 },
    /// Best randomized threshold and its gain ratio.
    Found { threshold: f32, gain_ratio: f64 },
}

impl SplitSearch {
    /// Gain ratio of the outcome; a degenerate search scores 0.
    #[inline]
    pub fn gain_ratio(&self) -> f64 {
        match self {
            Self::Degenerate { .. } => 0.0,
            Self::Found { gain_ratio, .. } => *gain_ratio,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::Degenerate { .. })
    }
}

/// Split search scratch state, cleared and reused across nodes.
#[derive(Debug)]
pub struct SplitFinder {
    entries: Vec<FeatureEntry>,
    num_labels: usize,
    pre_split_entropy: f64,
}

// =============================================================================
// Entropy
// =============================================================================

/// Shannon entropy of a normalized distribution, in nats.
///
/// Zero-probability outcomes contribute nothing (`0·ln 0 = 0`).
#[inline]
pub fn entropy(dist: &[f64]) -> f64 {
    let mut h = 0.0;
    for &p in dist {
        if p > 0.0 {
            h -= p * p.ln();
        }
    }
    h
}

/// Entropy of an unnormalized count vector with the given total.
#[inline]
fn entropy_of_counts(counts: &[f64], total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    let mut h = 0.0;
    for &c in counts {
        if c > 0.0 {
            let p = c / total;
            h -= p * p.ln();
        }
    }
    h
}

// =============================================================================
// SplitFinder
// =============================================================================

impl SplitFinder {
    pub fn new(num_labels: usize) -> Self {
        Self {
            entries: Vec::new(),
            num_labels,
            pre_split_entropy: 0.0,
        }
    }

    /// Clear accumulated entries and the entropy baseline for a new node.
    pub fn reset(&mut self, num_labels: usize) {
        self.entries.clear();
        self.num_labels = num_labels;
        self.pre_split_entropy = 0.0;
    }

    /// Append one weighted observation without deduplication.
    #[inline]
    pub fn add_instance(&mut self, feature_val: f32, label: u32, weight: f32) {
        self.entries.push(FeatureEntry {
            feature_val,
            label,
            weight,
        });
    }

    /// Merge an observation into an existing entry with identical
    /// `(feature_val, label)`, or append a new one.
    ///
    /// Equality on the feature value is bit-exact: near-equal floats stay
    /// separate entries. The scan is O(n) per call.
    pub fn add_instance_dedup(&mut self, feature_val: f32, label: u32, weight: f32) {
        for entry in self.entries.iter_mut() {
            if entry.feature_val == feature_val && entry.label == label {
                entry.weight += weight;
                return;
            }
        }
        self.add_instance(feature_val, label, weight);
    }

    /// Number of accumulated entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Search the accumulated entries for the best split threshold.
    ///
    /// Sorts the entries in place by `(feature_val, label)`; insertion order
    /// does not survive. Ties on gain ratio keep the first (lowest-valued)
    /// threshold.
    ///
    /// # Panics
    ///
    /// Panics if no entries were added since the last reset.
    pub fn find_split<R: Rng>(&mut self, rng: &mut R) -> SplitSearch {
        assert!(
            !self.entries.is_empty(),
            "split search over a node with no entries"
        );

        self.entries.sort_by(|a, b| {
            a.feature_val
                .total_cmp(&b.feature_val)
                .then(a.label.cmp(&b.label))
        });
        self.pre_split_entropy = self.compute_pre_split_entropy();

        let mut distinct: Vec<f32> = Vec::new();
        for entry in &self.entries {
            if distinct.last() != Some(&entry.feature_val) {
                distinct.push(entry.feature_val);
            }
        }
        if distinct.len() < 2 {
            return SplitSearch::Degenerate { value: distinct[0] };
        }

        // All weight starts on the right; the cursor moves entries left as
        // candidate thresholds increase.
        let mut left = vec![0.0f64; self.num_labels];
        let mut right = vec![0.0f64; self.num_labels];
        for entry in &self.entries {
            right[entry.label as usize] += f64::from(entry.weight);
        }

        let mut cursor = 0;
        let mut best: Option<(f32, f64)> = None;

        for pair in distinct.windows(2) {
            let Some(threshold) = draw_threshold(rng, pair[0], pair[1]) else {
                // No representable float strictly between the two values.
                continue;
            };
            while cursor < self.entries.len() && self.entries[cursor].feature_val <= threshold {
                let entry = &self.entries[cursor];
                left[entry.label as usize] += f64::from(entry.weight);
                right[entry.label as usize] -= f64::from(entry.weight);
                cursor += 1;
            }
            let gain_ratio = self.gain_ratio(&left, &right);
            if best.map_or(true, |(_, current)| gain_ratio > current) {
                best = Some((threshold, gain_ratio));
            }
        }

        match best {
            Some((threshold, gain_ratio)) => SplitSearch::Found {
                threshold,
                gain_ratio,
            },
            None => SplitSearch::Degenerate { value: distinct[0] },
        }
    }

    /// Unweighted label distribution entropy over all entries.
    fn compute_pre_split_entropy(&self) -> f64 {
        let mut counts = vec![0.0f64; self.num_labels];
        for entry in &self.entries {
            counts[entry.label as usize] += 1.0;
        }
        let total = self.entries.len() as f64;
        for c in counts.iter_mut() {
            *c /= total;
        }
        entropy(&counts)
    }

    /// Gain ratio of one candidate split given left/right class weights.
    ///
    /// Defined as exactly 0 when the split information is 0, which covers
    /// every candidate that leaves one side without weight.
    fn gain_ratio(&self, left: &[f64], right: &[f64]) -> f64 {
        let w_left: f64 = left.iter().sum();
        let w_right: f64 = right.iter().sum();
        let total = w_left + w_right;
        if total == 0.0 {
            return 0.0;
        }

        let cond = w_left / total * entropy_of_counts(left, w_left)
            + w_right / total * entropy_of_counts(right, w_right);
        let info_gain = self.pre_split_entropy - cond;

        let split_info = entropy(&[w_left / total, w_right / total]);
        if split_info == 0.0 {
            return 0.0;
        }
        info_gain / split_info
    }
}

/// Draw a threshold uniformly from the open interval `(lo, hi)`.
///
/// Falls back to the midpoint when the draw lands on an endpoint, and to
/// `None` when the interval has no interior float at all.
fn draw_threshold<R: Rng>(rng: &mut R, lo: f32, hi: f32) -> Option<f32> {
    let t = lo + rng.gen::<f32>() * (hi - lo);
    if t > lo && t < hi {
        return Some(t);
    }
    let mid = 0.5 * lo + 0.5 * hi;
    (mid > lo && mid < hi).then_some(mid)
}
