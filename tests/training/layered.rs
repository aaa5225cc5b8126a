//! Layer cascade behavior: outcome publication and feature replacement.

use std::sync::Arc;

use foresters::training::{
    AggregationStore, EngineParams, ForestEngine, MemStore, TableId, Verbosity,
};
use tempfile::TempDir;

use crate::common;

fn layered_params(num_layers: usize) -> EngineParams {
    EngineParams {
        num_trees: 6,
        num_threads: 2,
        num_layers,
        perform_test: true,
        seed: 44,
        verbosity: Verbosity::Silent,
        ..EngineParams::default()
    }
}

#[test]
fn layered_run_trains_on_outcome_codes_and_still_separates() {
    let train = common::two_cluster_dataset(12);
    let test = common::two_cluster_dataset(4);
    let params = layered_params(2);
    let layout = common::layout_for(&params, &train, &test);
    let store = Arc::new(MemStore::new(&layout, params.num_threads));

    let report = ForestEngine::new(
        params,
        Arc::clone(&store) as Arc<dyn AggregationStore>,
        train,
        test,
    )
    .unwrap()
    .run()
    .unwrap()
    .expect("designated thread reports");

    // The second layer trains on the first layer's leaf labels and must
    // still separate the clusters.
    assert_eq!(report.train_error(), 0.0);
    assert_eq!(report.test_error(), 0.0);

    // Only the final layer votes.
    let votes = store.table(TableId::TrainVotes);
    for row in 0..24 {
        let total: f64 = votes.snapshot(row).iter().sum();
        assert_eq!(total, 6.0);
    }
}

#[test]
fn outcome_rows_hold_one_leaf_label_per_tree() {
    let train = common::two_cluster_dataset(12);
    let test = common::two_cluster_dataset(4);
    let params = layered_params(2);
    let layout = common::layout_for(&params, &train, &test);
    let store = Arc::new(MemStore::new(&layout, params.num_threads));

    ForestEngine::new(
        params,
        Arc::clone(&store) as Arc<dyn AggregationStore>,
        train.clone(),
        test,
    )
    .unwrap()
    .run()
    .unwrap();

    let outcomes = store.table(TableId::TrainOutcomes);
    let num_train = train.len();
    let mut saw_nonzero = false;
    for i in 0..num_train {
        // Layer 0 rows hold one label-valued outcome per tree.
        for &cell in &outcomes.snapshot(i) {
            assert!(cell == 0.0 || cell == 1.0);
            saw_nonzero |= cell == 1.0;
        }
        // The final layer has no next layer to feed, so its rows stay empty.
        let last_layer_row = outcomes.snapshot(num_train + i);
        assert!(last_layer_row.iter().all(|&cell| cell == 0.0));
    }
    assert!(saw_nonzero);
}

#[test]
fn labels_survive_layer_transitions() {
    let train = common::two_cluster_dataset(10);
    let test = common::two_cluster_dataset(3);
    let train_labels = train.labels().to_vec();
    let test_labels = test.labels().to_vec();

    let params = layered_params(3);
    let layout = common::layout_for(&params, &train, &test);
    let store = Arc::new(MemStore::new(&layout, params.num_threads));

    let report = ForestEngine::new(
        params,
        Arc::clone(&store) as Arc<dyn AggregationStore>,
        train,
        test,
    )
    .unwrap()
    .run()
    .unwrap()
    .expect("designated thread reports");

    assert_eq!(report.train_labels, train_labels);
    assert_eq!(report.test_labels, test_labels);
}

#[test]
fn importance_is_skipped_on_layered_runs() {
    let train = common::two_cluster_dataset(8);
    let test = common::two_cluster_dataset(2);
    let params = EngineParams {
        compute_importance: true,
        ..layered_params(2)
    };
    let layout = common::layout_for(&params, &train, &test);
    let store = Arc::new(MemStore::new(&layout, params.num_threads));

    ForestEngine::new(
        params,
        Arc::clone(&store) as Arc<dyn AggregationStore>,
        train,
        test,
    )
    .unwrap()
    .run()
    .unwrap();

    let gain = store.table(TableId::GainRatio).snapshot(0);
    assert!(gain.iter().all(|&g| g == 0.0));
}

#[test]
fn layered_saves_write_one_part_per_layer() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("cascade");

    let train = common::two_cluster_dataset(8);
    let test = common::two_cluster_dataset(2);
    let params = EngineParams {
        num_threads: 1,
        save_trees: Some(base.clone()),
        ..layered_params(2)
    };
    let layout = common::layout_for(&params, &train, &test);
    let store = Arc::new(MemStore::new(&layout, 1));

    ForestEngine::new(
        params,
        Arc::clone(&store) as Arc<dyn AggregationStore>,
        train,
        test,
    )
    .unwrap()
    .run()
    .unwrap();

    assert!(dir.path().join("cascade.layer0.part0.0").exists());
    assert!(dir.path().join("cascade.layer1.part0.0").exists());
}
