//! End-to-end runs over an in-process aggregation store.

use std::sync::Arc;
use std::thread;

use foresters::training::{
    AggregationStore, EngineParams, ForestEngine, MemStore, TableId, Verbosity,
};
use tempfile::TempDir;

use crate::common;

#[test]
fn multi_thread_run_gives_every_tree_exactly_one_vote() {
    let train = common::two_cluster_dataset(12);
    let test = common::two_cluster_dataset(4);
    // 10 trees over 3 threads: assignments of 4, 3 and 3 trees.
    let params = common::quiet_params(10, 3);
    let layout = common::layout_for(&params, &train, &test);
    let store = Arc::new(MemStore::new(&layout, params.num_threads));

    let engine = ForestEngine::new(params, Arc::clone(&store) as Arc<dyn AggregationStore>, train, test)
        .unwrap();
    let report = engine.run().unwrap().expect("designated thread reports");

    for table in [TableId::TrainVotes, TableId::TestVotes] {
        let handle = store.table(table);
        let rows = if table == TableId::TrainVotes { 24 } else { 8 };
        for row in 0..rows {
            let total: f64 = handle.snapshot(row).iter().sum();
            assert_eq!(total, 10.0, "row {row} of {table:?}");
        }
    }
    assert_eq!(report.train_error(), 0.0);
    assert_eq!(report.test_error(), 0.0);
}

#[test]
fn two_clients_split_the_forest_and_share_votes() {
    let train = common::three_label_dataset(8);
    let test = common::three_label_dataset(2);
    let num_clients = 2;
    let num_threads = 2;
    let base = EngineParams {
        num_clients,
        num_trees: 9,
        num_threads,
        perform_test: true,
        seed: 31,
        verbosity: Verbosity::Silent,
        ..EngineParams::default()
    };
    let layout = common::layout_for(&base, &train, &test);
    let store = Arc::new(MemStore::new(&layout, num_clients * num_threads));

    let mut handles = Vec::new();
    for client_id in 0..num_clients {
        let params = EngineParams { client_id, ..base.clone() };
        let store = Arc::clone(&store) as Arc<dyn AggregationStore>;
        let train = train.clone();
        let test = test.clone();
        handles.push(thread::spawn(move || {
            let engine = ForestEngine::new(params, store, train, test).unwrap();
            engine.run().unwrap()
        }));
    }
    let reports: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Only client 0 carries the designated thread.
    assert!(reports[0].is_some());
    assert!(reports[1].is_none());

    let report = reports[0].as_ref().unwrap();
    assert_eq!(report.num_trees, 9);
    assert_eq!(report.train_error(), 0.0);

    // Votes from both clients land in the same rows.
    let votes = store.table(TableId::TrainVotes);
    for row in 0..24 {
        let total: f64 = votes.snapshot(row).iter().sum();
        assert_eq!(total, 9.0);
    }
}

#[test]
fn prediction_and_report_files_hold_decoded_results() {
    let dir = TempDir::new().unwrap();
    let pred_path = dir.path().join("pred.tsv");
    let report_path = dir.path().join("report.tsv");

    let train = common::two_cluster_dataset(10);
    let test = common::two_cluster_dataset(3);
    let params = EngineParams {
        save_predictions: Some(pred_path.clone()),
        save_report: Some(report_path.clone()),
        ..common::quiet_params(6, 2)
    };
    let layout = common::layout_for(&params, &train, &test);
    let store = Arc::new(MemStore::new(&layout, params.num_threads));
    ForestEngine::new(params, Arc::clone(&store) as Arc<dyn AggregationStore>, train, test)
        .unwrap()
        .run()
        .unwrap();

    let pred = std::fs::read_to_string(&pred_path).unwrap();
    assert_eq!(pred, "0\n1\n0\n1\n0\n1\n");

    let summary = std::fs::read_to_string(&report_path).unwrap();
    assert!(summary.contains("num_trees\t6"));
    assert!(summary.contains("test_error\t0.000000"));
}

#[test]
fn proba_predictions_carry_vote_shares() {
    let dir = TempDir::new().unwrap();
    let pred_path = dir.path().join("pred.tsv");

    let train = common::two_cluster_dataset(10);
    let test = common::two_cluster_dataset(2);
    let params = EngineParams {
        save_predictions: Some(pred_path.clone()),
        output_proba: true,
        ..common::quiet_params(5, 1)
    };
    let layout = common::layout_for(&params, &train, &test);
    let store = Arc::new(MemStore::new(&layout, 1));
    ForestEngine::new(params, Arc::clone(&store) as Arc<dyn AggregationStore>, train, test)
        .unwrap()
        .run()
        .unwrap();

    let pred = std::fs::read_to_string(&pred_path).unwrap();
    // Unanimous forests on separable data: every line is a one-hot share.
    assert_eq!(pred, "1.000\t0.000\n0.000\t1.000\n1.000\t0.000\n0.000\t1.000\n");
}

#[test]
fn saved_forest_round_trips_through_the_load_path() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("model");

    let train = common::three_label_dataset(6);
    let test = common::three_label_dataset(3);

    let save_params = EngineParams {
        save_trees: Some(base.clone()),
        ..common::quiet_params(7, 1)
    };
    let layout = common::layout_for(&save_params, &train, &test);
    let store = Arc::new(MemStore::new(&layout, 1));
    let trained = ForestEngine::new(
        save_params,
        Arc::clone(&store) as Arc<dyn AggregationStore>,
        train.clone(),
        test.clone(),
    )
    .unwrap()
    .run()
    .unwrap()
    .expect("training run reports");

    // A fresh store, seeded only by the saved part file.
    let load_params = EngineParams {
        load_trees: Some(dir.path().join("model.part0.0")),
        ..common::quiet_params(7, 1)
    };
    let load_store = Arc::new(MemStore::new(&layout, 1));
    let loaded = ForestEngine::new(
        load_params,
        Arc::clone(&load_store) as Arc<dyn AggregationStore>,
        train,
        test,
    )
    .unwrap()
    .run()
    .unwrap()
    .expect("load path reports");

    assert_eq!(loaded.num_trees, trained.num_trees);
    assert_eq!(loaded.test_pred, trained.test_pred);
    assert_eq!(loaded.train_pred, trained.train_pred);
}
