//! The layered training orchestrator.
//!
//! One [`ForestEngine`] runs per client process. It spawns `num_threads`
//! worker threads, each of which trains its assigned slice of trees and
//! publishes votes, outcomes and importance through the shared
//! [`AggregationStore`]. Workers synchronize phase boundaries exclusively
//! with the store's global barrier, so every client must walk the same
//! sequence of phases with the same run parameters.
//!
//! Per layer the phases are: train local forests, optionally save them,
//! accumulate feature importance, then either derive the next layer's
//! features from tree outcomes or, on the final layer, aggregate votes and
//! have the designated thread (thread 0 of client 0) decode them into a
//! [`PerformanceReport`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier, OnceLock, RwLock};

use thiserror::Error;

use crate::data::{Dataset, DatasetError};
use crate::forest::{ForestIoError, ForestParams, RandForest, TreeParams};
use crate::training::logger::{TrainingLogger, Verbosity};
use crate::training::partition;
use crate::training::report::PerformanceReport;
use crate::training::store::{AggregationStore, SharedTable, TableId};
use crate::training::votes::{encode_votes, VoteError};
use crate::utils::{argsort_desc, normalize_in_place};

const POISONED: &str = "layer data lock poisoned";

// =============================================================================
// Parameters
// =============================================================================

/// Everything a client needs to take part in one training run.
///
/// All clients of a run must agree on every field except `client_id`;
/// the store gives them no way to negotiate a mismatch.
#[derive(Debug, Clone)]
pub struct EngineParams {
    /// Participating client processes.
    pub num_clients: usize,
    /// Worker threads per client.
    pub num_threads: usize,
    /// This client's id in `0..num_clients`.
    pub client_id: usize,
    /// Total trees per layer across all workers.
    pub num_trees: usize,
    /// Layers in the cascade. Layer `l + 1` trains on the outcome codes of
    /// layer `l`.
    pub num_layers: usize,
    /// Per-tree growth parameters.
    pub tree: TreeParams,
    /// Base seed shared by all workers. Per-tree streams derive from it and
    /// the global tree index, so a run is reproducible for any thread count.
    pub seed: u64,
    /// Vote on train and test data after the final layer and produce a
    /// [`PerformanceReport`].
    pub perform_test: bool,
    /// Accumulate and log per-feature gain ratio (single-layer runs only).
    pub compute_importance: bool,
    /// Save each worker's forest under this base path.
    pub save_trees: Option<PathBuf>,
    /// Skip training and evaluate a previously saved forest instead.
    pub load_trees: Option<PathBuf>,
    /// Write per-test-instance predictions here.
    pub save_predictions: Option<PathBuf>,
    /// Prediction lines carry vote shares instead of a bare label.
    pub output_proba: bool,
    /// Write the run summary here.
    pub save_report: Option<PathBuf>,

    pub verbosity: Verbosity,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            num_clients: 1,
            num_threads: 1,
            client_id: 0,
            num_trees: 10,
            num_layers: 1,
            tree: TreeParams::default(),
            seed: 0,
            perform_test: false,
            compute_importance: false,
            save_trees: None,
            load_trees: None,
            save_predictions: None,
            output_proba: false,
            save_report: None,
            verbosity: Verbosity::default(),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("num_clients must be nonzero")]
    NoClients,

    #[error("num_threads must be nonzero")]
    NoThreads,

    #[error("num_layers must be nonzero")]
    NoLayers,

    #[error("num_trees must be nonzero")]
    NoTrees,

    #[error("client_id {client_id} is outside 0..{num_clients}")]
    ClientOutOfRange { client_id: usize, num_clients: usize },

    #[error("training requires a nonempty training set")]
    EmptyTrainSet,

    #[error("perform_test requires a nonempty test set")]
    EmptyTestSet,

    #[error("{what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    ForestIo(#[from] ForestIoError),

    #[error(transparent)]
    Votes(#[from] VoteError),

    #[error("failed to write {what}: {source}")]
    Output {
        what: &'static str,
        source: std::io::Error,
    },
}

// =============================================================================
// ForestEngine
// =============================================================================

/// Train and test data as seen by the current layer.
///
/// Labels never change; features are replaced wholesale at each layer
/// transition by the designated thread while every reader is parked at a
/// barrier.
struct LayerData {
    train: Dataset,
    test: Dataset,
}

/// Handles to the five shared tables, opened once by thread 0.
#[derive(Clone)]
struct Tables {
    train_votes: Arc<dyn SharedTable>,
    test_votes: Arc<dyn SharedTable>,
    gain_ratio: Arc<dyn SharedTable>,
    train_outcomes: Arc<dyn SharedTable>,
    test_outcomes: Arc<dyn SharedTable>,
}

impl Tables {
    fn open(store: &dyn AggregationStore) -> Self {
        Self {
            train_votes: store.table(TableId::TrainVotes),
            test_votes: store.table(TableId::TestVotes),
            gain_ratio: store.table(TableId::GainRatio),
            train_outcomes: store.table(TableId::TrainOutcomes),
            test_outcomes: store.table(TableId::TestOutcomes),
        }
    }
}

/// One client's share of a layered random forest run.
pub struct ForestEngine {
    params: EngineParams,
    store: Arc<dyn AggregationStore>,
    data: RwLock<LayerData>,
    logger: TrainingLogger,
}

impl ForestEngine {
    /// Validate the run parameters against the data this client holds.
    ///
    /// Both datasets are the full replicated data of the run; workers
    /// partition trees, never instances. `test` may be empty when
    /// `perform_test` is off, and `train` may be empty on the load path.
    pub fn new(
        params: EngineParams,
        store: Arc<dyn AggregationStore>,
        train: Dataset,
        test: Dataset,
    ) -> Result<Self, EngineError> {
        if params.num_clients == 0 {
            return Err(EngineError::NoClients);
        }
        if params.num_threads == 0 {
            return Err(EngineError::NoThreads);
        }
        if params.num_layers == 0 {
            return Err(EngineError::NoLayers);
        }
        if params.num_trees == 0 {
            return Err(EngineError::NoTrees);
        }
        if params.client_id >= params.num_clients {
            return Err(EngineError::ClientOutOfRange {
                client_id: params.client_id,
                num_clients: params.num_clients,
            });
        }
        if params.load_trees.is_none() && train.is_empty() {
            return Err(EngineError::EmptyTrainSet);
        }
        if params.perform_test && test.is_empty() {
            return Err(EngineError::EmptyTestSet);
        }
        if !train.is_empty() && !test.is_empty() {
            if test.feature_dim() != train.feature_dim() {
                return Err(EngineError::ShapeMismatch {
                    what: "test feature dimension",
                    expected: train.feature_dim(),
                    got: test.feature_dim(),
                });
            }
            if test.num_labels() != train.num_labels() {
                return Err(EngineError::ShapeMismatch {
                    what: "test label count",
                    expected: train.num_labels(),
                    got: test.num_labels(),
                });
            }
        }

        let logger = TrainingLogger::new(params.verbosity);
        Ok(Self {
            params,
            store,
            data: RwLock::new(LayerData { train, test }),
            logger,
        })
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Run this client's share of the protocol to completion.
    ///
    /// Returns the performance report on the designated thread's client when
    /// `perform_test` is set (or on the load path), `None` elsewhere. The
    /// first worker error wins; a worker panic propagates as a panic.
    pub fn run(&self) -> Result<Option<PerformanceReport>, EngineError> {
        let p = &self.params;
        if p.client_id == 0 {
            self.logger.info(&format!(
                "training {} trees x {} layer(s) over {} client(s) x {} thread(s)",
                p.num_trees, p.num_layers, p.num_clients, p.num_threads
            ));
        }

        let local_barrier = Barrier::new(p.num_threads);
        let tables: OnceLock<Tables> = OnceLock::new();

        let results: Vec<Result<Option<PerformanceReport>, EngineError>> =
            std::thread::scope(|scope| {
                let barrier = &local_barrier;
                let tables = &tables;
                let handles: Vec<_> = (0..p.num_threads)
                    .map(|thread_id| {
                        scope.spawn(move || self.run_thread(thread_id, barrier, tables))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| match handle.join() {
                        Ok(result) => result,
                        Err(payload) => std::panic::resume_unwind(payload),
                    })
                    .collect()
            });

        let mut report = None;
        for result in results {
            if let Some(r) = result? {
                report = Some(r);
            }
        }
        Ok(report)
    }

    // =========================================================================
    // Worker protocol
    // =========================================================================

    fn run_thread(
        &self,
        thread_id: usize,
        local_barrier: &Barrier,
        tables_slot: &OnceLock<Tables>,
    ) -> Result<Option<PerformanceReport>, EngineError> {
        self.store.register_thread();
        let result = self.run_layers(thread_id, local_barrier, tables_slot);
        self.store.deregister_thread();
        result
    }

    /// The full per-thread protocol.
    ///
    /// Fallible work in the middle of the barrier sequence (saving forests,
    /// rebuilding features) defers its error and keeps walking the phases,
    /// so no sibling is left stranded at a barrier. Deferred errors surface
    /// once the protocol has run its course.
    fn run_layers(
        &self,
        thread_id: usize,
        local_barrier: &Barrier,
        tables_slot: &OnceLock<Tables>,
    ) -> Result<Option<PerformanceReport>, EngineError> {
        let p = &self.params;
        let is_lead = thread_id == 0;
        let is_designated = p.client_id == 0 && is_lead;
        let mut deferred: Option<EngineError> = None;
        let mut report = None;

        // Thread 0 opens the table handles; nobody proceeds until they exist.
        if is_lead {
            tables_slot.set(Tables::open(self.store.as_ref())).ok();
        }
        local_barrier.wait();
        let tables = tables_slot
            .get()
            .expect("shared tables opened before the local barrier")
            .clone();

        // Load path: the designated thread evaluates the saved forest and
        // everyone else is already done. No barriers are crossed.
        if let Some(path) = &p.load_trees {
            if is_designated {
                report = Some(self.evaluate_loaded(path, &tables)?);
            }
            return Ok(report);
        }

        let assignment = partition::plan(
            p.num_trees,
            p.num_clients,
            p.num_threads,
            p.client_id,
            thread_id,
        );
        self.logger.debug(&format!(
            "client {} thread {} owns trees {}..{}",
            p.client_id,
            thread_id,
            assignment.start,
            assignment.end()
        ));

        for layer in 0..p.num_layers {
            if is_designated && p.num_layers > 1 {
                self.logger.info(&format!("layer {layer}: training"));
            }

            let forest = {
                let data = self.data.read().expect(POISONED);
                let mut forest = RandForest::new(ForestParams {
                    num_trees: assignment.count,
                    tree_idx_start: assignment.start,
                    client_id: p.client_id,
                    thread_id,
                    seed: p.seed.wrapping_add((layer * p.num_trees) as u64),
                    tree: p.tree.clone(),
                });
                forest.train(&data.train);
                forest
            };

            if let Some(base) = &p.save_trees {
                match forest.save_trees(&layer_base(base, layer, p.num_layers)) {
                    Ok(path) => {
                        self.logger.debug(&format!("saved forest part {}", path.display()));
                    }
                    Err(err) => {
                        deferred.get_or_insert(err.into());
                    }
                }
            }

            if p.compute_importance && p.num_layers == 1 {
                let importance = forest.compute_feature_importance();
                for (feature, &value) in importance.iter().enumerate() {
                    tables.gain_ratio.increment(0, feature, f64::from(value));
                }
                self.store.global_barrier();
                if is_designated {
                    self.log_importance(tables.gain_ratio.as_ref());
                }
            }

            if layer + 1 < p.num_layers {
                // Publish this layer's outcome codes, then let the designated
                // thread turn them into the next layer's features.
                {
                    let data = self.data.read().expect(POISONED);
                    publish_outcomes(
                        &forest,
                        &data.train,
                        tables.train_outcomes.as_ref(),
                        layer,
                        assignment.start,
                    );
                }
                self.store.global_barrier();
                if p.perform_test {
                    let data = self.data.read().expect(POISONED);
                    publish_outcomes(
                        &forest,
                        &data.test,
                        tables.test_outcomes.as_ref(),
                        layer,
                        assignment.start,
                    );
                }
                self.store.global_barrier();
                if is_designated {
                    if let Err(err) = self.rebuild_features(&tables, layer) {
                        deferred.get_or_insert(err.into());
                    }
                }
                self.store.global_barrier();
            } else if p.perform_test {
                {
                    let data = self.data.read().expect(POISONED);
                    vote_on(&forest, &data.test, tables.test_votes.as_ref());
                }
                self.store.global_barrier();
                {
                    let data = self.data.read().expect(POISONED);
                    vote_on(&forest, &data.train, tables.train_votes.as_ref());
                }
                self.store.global_barrier();
                if is_designated {
                    match self.decode_and_report(&tables, p.num_trees as u64) {
                        Ok(r) => report = Some(r),
                        Err(err) => {
                            deferred.get_or_insert(err);
                        }
                    }
                }
            }
        }

        match deferred {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    // =========================================================================
    // Designated-thread phases
    // =========================================================================

    /// Replace the datasets' features with layer `layer`'s outcome codes.
    ///
    /// Runs on the designated thread between barriers, so the write lock is
    /// uncontended.
    fn rebuild_features(&self, tables: &Tables, layer: usize) -> Result<(), DatasetError> {
        let next_dim = self.params.num_trees;
        let mut data = self.data.write().expect(POISONED);
        let train_rows =
            read_layer_outcomes(tables.train_outcomes.as_ref(), layer, data.train.len(), next_dim);
        data.train.replace_features(train_rows, next_dim)?;
        if self.params.perform_test {
            let test_rows =
                read_layer_outcomes(tables.test_outcomes.as_ref(), layer, data.test.len(), next_dim);
            data.test.replace_features(test_rows, next_dim)?;
        }
        Ok(())
    }

    /// Log the strongest features by accumulated gain ratio.
    fn log_importance(&self, gain_ratio: &dyn SharedTable) {
        let row = gain_ratio.snapshot(0);
        let mut importance: Vec<f32> = row.iter().map(|&v| v as f32).collect();
        if !normalize_in_place(&mut importance) {
            self.logger.warn("no split gain accumulated; skipping feature importance");
            return;
        }
        let order = argsort_desc(&importance);
        self.logger.info("feature importance (top features by share of total gain ratio):");
        self.logger.info("order\tfeature\timportance");
        for (rank, &feature) in order.iter().take(10.min(order.len())).enumerate() {
            self.logger.info(&format!(
                "{}.\t#{}\t{:.4}",
                rank + 1,
                feature,
                importance[feature]
            ));
        }
    }

    /// Decode the aggregated votes and write the configured outputs.
    fn decode_and_report(
        &self,
        tables: &Tables,
        expected_trees: u64,
    ) -> Result<PerformanceReport, EngineError> {
        let report = {
            let data = self.data.read().expect(POISONED);
            PerformanceReport::assemble(
                tables.train_votes.as_ref(),
                data.train.labels(),
                tables.test_votes.as_ref(),
                data.test.labels(),
                data.train.num_labels().max(data.test.num_labels()),
                expected_trees,
            )?
        };
        self.logger.info(&format!(
            "train error {:.4} over {} instances",
            report.train_error(),
            report.train_labels.len()
        ));
        self.logger.info(&format!(
            "test error {:.4} over {} instances",
            report.test_error(),
            report.test_labels.len()
        ));
        self.write_outputs(&report)?;
        Ok(report)
    }

    fn write_outputs(&self, report: &PerformanceReport) -> Result<(), EngineError> {
        if let Some(path) = &self.params.save_predictions {
            report
                .write_predictions(path, self.params.output_proba)
                .map_err(|source| EngineError::Output {
                    what: "prediction file",
                    source,
                })?;
            self.logger.info(&format!("wrote predictions to {}", path.display()));
        }
        if let Some(path) = &self.params.save_report {
            report
                .write_report(path)
                .map_err(|source| EngineError::Output {
                    what: "performance report",
                    source,
                })?;
            self.logger.info(&format!("wrote performance report to {}", path.display()));
        }
        Ok(())
    }

    /// Load path: restore a saved forest, vote with it, decode and report.
    fn evaluate_loaded(
        &self,
        path: &Path,
        tables: &Tables,
    ) -> Result<PerformanceReport, EngineError> {
        let forest = RandForest::load_trees(path)?;
        self.logger.info(&format!(
            "loaded {} trees from {}",
            forest.num_trees(),
            path.display()
        ));
        {
            let data = self.data.read().expect(POISONED);
            let expected_dim = if data.train.is_empty() {
                data.test.feature_dim()
            } else {
                data.train.feature_dim()
            };
            if forest.feature_dim() != expected_dim {
                return Err(EngineError::ShapeMismatch {
                    what: "loaded forest feature dimension",
                    expected: expected_dim,
                    got: forest.feature_dim(),
                });
            }
            vote_on(&forest, &data.train, tables.train_votes.as_ref());
            vote_on(&forest, &data.test, tables.test_votes.as_ref());
        }
        self.decode_and_report(tables, forest.num_trees() as u64)
    }
}

// =============================================================================
// Phase helpers
// =============================================================================

/// Per-layer base path for saved forests.
fn layer_base(base: &Path, layer: usize, num_layers: usize) -> PathBuf {
    if num_layers > 1 {
        let mut os = base.as_os_str().to_os_string();
        os.push(format!(".layer{layer}"));
        PathBuf::from(os)
    } else {
        base.to_path_buf()
    }
}

/// Cast one tree's vote per instance into the shared vote table.
fn vote_on(forest: &RandForest, dataset: &Dataset, table: &dyn SharedTable) {
    for i in 0..dataset.len() {
        let votes = forest.predict_votes(dataset.feature(i));
        table.batch_increment(i, &encode_votes(&votes));
    }
}

/// Publish each local tree's outcome code for every instance.
///
/// Rows are `layer * num_instances + instance`; columns are global tree
/// indices, so workers never write the same cell.
fn publish_outcomes(
    forest: &RandForest,
    dataset: &Dataset,
    table: &dyn SharedTable,
    layer: usize,
    tree_idx_start: usize,
) {
    let num_instances = dataset.len();
    for i in 0..num_instances {
        let outcomes = forest.go_down_trees(dataset.feature(i));
        for (j, &outcome) in outcomes.iter().enumerate() {
            table.increment(layer * num_instances + i, tree_idx_start + j, f64::from(outcome));
        }
    }
}

/// Read back one layer's outcome rows as feature vectors.
fn read_layer_outcomes(
    table: &dyn SharedTable,
    layer: usize,
    num_instances: usize,
    row_width: usize,
) -> Vec<Vec<f32>> {
    (0..num_instances)
        .map(|i| {
            let row = table.snapshot(layer * num_instances + i);
            debug_assert_eq!(row.len(), row_width);
            row.iter().map(|&v| v as f32).collect()
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
