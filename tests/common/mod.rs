//! Shared fixtures for integration tests.
//!
//! For assertion helpers, use `foresters::testing`.

#![allow(dead_code)]

use foresters::data::Dataset;
use foresters::training::{EngineParams, StoreLayout, Verbosity};

#[allow(unused_imports)]
pub use foresters::testing::{assert_slice_approx_eq, assert_slice_approx_eq_f64, DEFAULT_TOLERANCE};
#[allow(unused_imports)]
pub use foresters::{assert_approx_eq, assert_approx_eq_f64};

// =============================================================================
// Synthetic datasets
// =============================================================================

/// Two well-separated clusters, `per_cluster` instances each.
///
/// Both features separate the clusters on their own, so trees stay
/// informative under any per-node feature sampling.
pub fn two_cluster_dataset(per_cluster: usize) -> Dataset {
    let mut features = Vec::with_capacity(per_cluster * 2);
    let mut labels = Vec::with_capacity(per_cluster * 2);
    for i in 0..per_cluster {
        let jitter = i as f32 * 0.01;
        features.push(vec![jitter, 1.0 + jitter]);
        labels.push(0);
        features.push(vec![5.0 + jitter, 9.0 + jitter]);
        labels.push(1);
    }
    Dataset::new(features, labels, 2, 2).expect("fixture dataset is well formed")
}

/// Three clusters over three labels, `per_cluster` instances each.
pub fn three_label_dataset(per_cluster: usize) -> Dataset {
    let mut features = Vec::with_capacity(per_cluster * 3);
    let mut labels = Vec::with_capacity(per_cluster * 3);
    for cluster in 0..3u32 {
        let center = cluster as f32 * 10.0;
        for i in 0..per_cluster {
            let jitter = i as f32 * 0.01;
            features.push(vec![center + jitter, center * 2.0 + jitter]);
            labels.push(cluster);
        }
    }
    Dataset::new(features, labels, 2, 3).expect("fixture dataset is well formed")
}

// =============================================================================
// Run plumbing
// =============================================================================

/// Store layout sized for `params` over the given data.
pub fn layout_for(params: &EngineParams, train: &Dataset, test: &Dataset) -> StoreLayout {
    StoreLayout {
        num_labels: train.num_labels().max(test.num_labels()),
        feature_dim: train.feature_dim().max(test.feature_dim()),
        num_trees: params.num_trees,
        num_train: train.len(),
        num_test: test.len(),
        num_layers: params.num_layers,
    }
}

/// Silent single-client parameters for integration runs.
pub fn quiet_params(num_trees: usize, num_threads: usize) -> EngineParams {
    EngineParams {
        num_trees,
        num_threads,
        perform_test: true,
        seed: 0xF0EE57,
        verbosity: Verbosity::Silent,
        ..EngineParams::default()
    }
}
