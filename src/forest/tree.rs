//! Single decision trees grown with randomized gain-ratio splits.
//!
//! Trees are stored as a flat `Vec` of nodes linked by indices, with the
//! root at index 0. Growth is recursive over instance-index subsets: each
//! node feeds a random subset of features through the [`SplitFinder`] and
//! keeps the candidate with the best gain ratio, or becomes a majority-label
//! leaf when no candidate improves purity.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::forest::sampling::sample_features;
use crate::forest::split::{SplitFinder, SplitSearch};
use crate::utils::argmax_first;

// =============================================================================
// Parameters
// =============================================================================

/// Growth parameters for a single tree.
#[derive(Debug, Clone)]
pub struct TreeParams {
    /// Maximum node depth, the root being depth 0. 0 disables the limit.
    pub max_depth: usize,
    /// Bootstrap draws per tree, with replacement. 0 uses every instance once.
    pub num_data_subsample: usize,
    /// Candidate features per node. 0 uses ⌊√feature_dim⌋, at least 1.
    pub num_features_subsample: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 16,
            num_data_subsample: 0,
            num_features_subsample: 0,
        }
    }
}

impl TreeParams {
    /// Candidate features per node for a given dimensionality.
    pub(crate) fn features_per_node(&self, feature_dim: usize) -> usize {
        if self.num_features_subsample == 0 {
            ((feature_dim as f64).sqrt() as usize).max(1)
        } else {
            self.num_features_subsample.min(feature_dim)
        }
    }
}

// =============================================================================
// Tree
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Branch {
        feature: u32,
        threshold: f32,
        gain_ratio: f64,
        left: u32,
        right: u32,
    },
    Leaf {
        label: u32,
    },
}

/// A grown decision tree. Immutable after growth; cheap to serialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Grow a tree over `indices` of the dataset (duplicates allowed, as
    /// produced by bootstrap sampling).
    ///
    /// # Panics
    ///
    /// Panics if `indices` is empty.
    pub fn grow<R: Rng>(
        dataset: &Dataset,
        params: &TreeParams,
        indices: &[u32],
        rng: &mut R,
    ) -> Self {
        assert!(!indices.is_empty(), "cannot grow a tree over no instances");
        let mut tree = Self { nodes: Vec::new() };
        let mut finder = SplitFinder::new(dataset.num_labels());
        tree.grow_node(dataset, params, &mut finder, indices, 0, rng);
        tree
    }

    fn grow_node<R: Rng>(
        &mut self,
        dataset: &Dataset,
        params: &TreeParams,
        finder: &mut SplitFinder,
        indices: &[u32],
        depth: usize,
        rng: &mut R,
    ) -> u32 {
        let node_id = self.nodes.len() as u32;
        // Reserve the slot; children are appended during recursion below.
        self.nodes.push(Node::Leaf { label: 0 });

        let depth_exhausted = params.max_depth > 0 && depth >= params.max_depth;
        if depth_exhausted || Self::is_pure(dataset, indices) {
            self.nodes[node_id as usize] = Node::Leaf {
                label: Self::majority_label(dataset, indices),
            };
            return node_id;
        }

        let candidates = sample_features(
            rng,
            dataset.feature_dim(),
            params.features_per_node(dataset.feature_dim()),
        );

        let mut best: Option<(u32, f32, f64)> = None;
        for &feature in &candidates {
            finder.reset(dataset.num_labels());
            for &index in indices {
                let x = dataset.feature(index as usize);
                finder.add_instance_dedup(x[feature as usize], dataset.label(index as usize), 1.0);
            }
            if let SplitSearch::Found {
                threshold,
                gain_ratio,
            } = finder.find_split(rng)
            {
                if gain_ratio > 0.0
                    && best.map_or(true, |(_, _, current)| gain_ratio > current)
                {
                    best = Some((feature, threshold, gain_ratio));
                }
            }
        }

        let Some((feature, threshold, gain_ratio)) = best else {
            // Every candidate was degenerate or gained nothing.
            self.nodes[node_id as usize] = Node::Leaf {
                label: Self::majority_label(dataset, indices),
            };
            return node_id;
        };

        let (left_indices, right_indices): (Vec<u32>, Vec<u32>) = indices
            .iter()
            .partition(|&&i| dataset.feature(i as usize)[feature as usize] <= threshold);
        debug_assert!(!left_indices.is_empty() && !right_indices.is_empty());

        let left = self.grow_node(dataset, params, finder, &left_indices, depth + 1, rng);
        let right = self.grow_node(dataset, params, finder, &right_indices, depth + 1, rng);
        self.nodes[node_id as usize] = Node::Branch {
            feature,
            threshold,
            gain_ratio,
            left,
            right,
        };
        node_id
    }

    fn is_pure(dataset: &Dataset, indices: &[u32]) -> bool {
        let first = dataset.label(indices[0] as usize);
        indices
            .iter()
            .all(|&i| dataset.label(i as usize) == first)
    }

    fn majority_label(dataset: &Dataset, indices: &[u32]) -> u32 {
        let mut counts = vec![0u32; dataset.num_labels()];
        for &index in indices {
            counts[dataset.label(index as usize) as usize] += 1;
        }
        argmax_first(&counts) as u32
    }

    /// Predicted label: descend `x[feature] <= threshold` left until a leaf.
    #[inline]
    pub fn predict(&self, x: &[f32]) -> u32 {
        let mut node = 0usize;
        loop {
            match &self.nodes[node] {
                Node::Leaf { label } => return *label,
                Node::Branch {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if x[*feature as usize] <= *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
            }
        }
    }

    /// Add every branch's gain ratio to its feature's importance slot.
    pub fn accumulate_importance(&self, importance: &mut [f32]) {
        for node in &self.nodes {
            if let Node::Branch {
                feature,
                gain_ratio,
                ..
            } = node
            {
                importance[*feature as usize] += *gain_ratio as f32;
            }
        }
    }

    /// Total node count, branches and leaves.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Longest root-to-leaf path, in edges. A lone leaf has depth 0.
    pub fn depth(&self) -> usize {
        self.depth_below(0)
    }

    fn depth_below(&self, node: usize) -> usize {
        match &self.nodes[node] {
            Node::Leaf { .. } => 0,
            Node::Branch { left, right, .. } => {
                1 + self
                    .depth_below(*left as usize)
                    .max(self.depth_below(*right as usize))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    use crate::forest::sampling::bootstrap_indices;

    fn rng(seed: u64) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(seed)
    }

    /// Two clusters separable on feature 0; feature 1 is constant noise.
    fn separable_dataset() -> Dataset {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..10 {
            let offset = i as f32 * 0.01;
            features.push(vec![0.1 + offset, 1.0]);
            labels.push(0);
            features.push(vec![0.9 + offset, 1.0]);
            labels.push(1);
        }
        Dataset::new(features, labels, 2, 2).unwrap()
    }

    fn all_indices(dataset: &Dataset) -> Vec<u32> {
        (0..dataset.len() as u32).collect()
    }

    #[test]
    fn test_grow_separates_clusters() {
        let dataset = separable_dataset();
        let params = TreeParams {
            num_features_subsample: 2,
            ..Default::default()
        };
        let tree = DecisionTree::grow(&dataset, &params, &all_indices(&dataset), &mut rng(1));

        for i in 0..dataset.len() {
            assert_eq!(tree.predict(dataset.feature(i)), dataset.label(i));
        }
    }

    #[test]
    fn test_pure_subset_becomes_single_leaf() {
        let dataset = Dataset::new(
            vec![vec![0.1], vec![0.5], vec![0.9]],
            vec![1, 1, 1],
            1,
            2,
        )
        .unwrap();
        let tree = DecisionTree::grow(
            &dataset,
            &TreeParams::default(),
            &all_indices(&dataset),
            &mut rng(2),
        );
        assert_eq!(tree.num_nodes(), 1);
        assert_eq!(tree.predict(&[0.42]), 1);
    }

    #[test]
    fn test_max_depth_bounds_growth() {
        let dataset = separable_dataset();
        let params = TreeParams {
            max_depth: 1,
            num_features_subsample: 2,
            ..Default::default()
        };
        let tree = DecisionTree::grow(&dataset, &params, &all_indices(&dataset), &mut rng(3));
        assert!(tree.depth() <= 1);
        assert!(tree.num_nodes() <= 3);
    }

    #[test]
    fn test_conflicting_labels_fall_back_to_majority() {
        // Identical feature values with mixed labels: nothing to split on.
        let dataset = Dataset::new(
            vec![vec![0.5], vec![0.5], vec![0.5]],
            vec![1, 0, 1],
            1,
            2,
        )
        .unwrap();
        let tree = DecisionTree::grow(
            &dataset,
            &TreeParams::default(),
            &all_indices(&dataset),
            &mut rng(4),
        );
        assert_eq!(tree.num_nodes(), 1);
        assert_eq!(tree.predict(&[0.5]), 1);
    }

    #[test]
    fn test_majority_ties_prefer_lower_label() {
        let dataset = Dataset::new(
            vec![vec![0.5], vec![0.5]],
            vec![1, 0],
            1,
            2,
        )
        .unwrap();
        let tree = DecisionTree::grow(
            &dataset,
            &TreeParams::default(),
            &all_indices(&dataset),
            &mut rng(5),
        );
        assert_eq!(tree.predict(&[0.5]), 0);
    }

    #[test]
    fn test_importance_flows_to_informative_feature() {
        let dataset = separable_dataset();
        let params = TreeParams {
            num_features_subsample: 2,
            ..Default::default()
        };
        let tree = DecisionTree::grow(&dataset, &params, &all_indices(&dataset), &mut rng(6));

        let mut importance = vec![0.0f32; 2];
        tree.accumulate_importance(&mut importance);
        assert!(importance[0] > 0.0);
        // Feature 1 is constant and can never split.
        assert_eq!(importance[1], 0.0);
    }

    #[test]
    fn test_growth_is_deterministic_for_fixed_seed() {
        let dataset = separable_dataset();
        let params = TreeParams::default();
        let indices = bootstrap_indices(&mut rng(10), dataset.len(), 16);

        let a = DecisionTree::grow(&dataset, &params, &indices, &mut rng(11));
        let b = DecisionTree::grow(&dataset, &params, &indices, &mut rng(11));
        assert_eq!(a, b);
    }

    #[test]
    fn test_bootstrap_duplicates_are_handled() {
        let dataset = separable_dataset();
        let params = TreeParams {
            num_data_subsample: 40,
            ..Default::default()
        };
        let indices = bootstrap_indices(&mut rng(12), dataset.len(), params.num_data_subsample);
        let tree = DecisionTree::grow(&dataset, &params, &indices, &mut rng(13));
        assert!(tree.num_nodes() >= 1);
    }

    #[test]
    fn test_serde_round_trip_preserves_structure() {
        let dataset = separable_dataset();
        let tree = DecisionTree::grow(
            &dataset,
            &TreeParams::default(),
            &all_indices(&dataset),
            &mut rng(14),
        );
        let json = serde_json::to_string(&tree).unwrap();
        let back: DecisionTree = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, back);
    }
}
