//! Shared aggregation tables.
//!
//! Workers never exchange messages directly. Everything that crosses a worker
//! boundary goes through a small set of row-addressed tables of `f64`
//! counters, combined with a global barrier: increments issued before a
//! barrier are visible to every participant after it. Cells only ever hold
//! sums of integer-valued deltas, which `f64` represents exactly well past
//! any realistic tree count.
//!
//! [`MemStore`] backs single-process runs and tests. A networked parameter
//! server would implement the same two traits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

// =============================================================================
// Table identifiers and layout
// =============================================================================

/// Identifies one shared table of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableId {
    /// Per-training-instance vote counts, one column per label.
    TrainVotes,
    /// Per-test-instance vote counts, one column per label.
    TestVotes,
    /// Accumulated gain ratio per feature, a single row.
    GainRatio,
    /// Per-layer tree outcomes on training data, one column per global tree.
    TrainOutcomes,
    /// Per-layer tree outcomes on test data, one column per global tree.
    TestOutcomes,
}

impl TableId {
    pub const ALL: [TableId; 5] = [
        TableId::TrainVotes,
        TableId::TestVotes,
        TableId::GainRatio,
        TableId::TrainOutcomes,
        TableId::TestOutcomes,
    ];
}

/// Row counts and row widths for every table of a run.
///
/// All participants must derive the layout from the same run parameters;
/// the store has no schema negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLayout {
    pub num_labels: usize,
    pub feature_dim: usize,
    pub num_trees: usize,
    pub num_train: usize,
    pub num_test: usize,
    pub num_layers: usize,
}

impl StoreLayout {
    /// Number of rows in `table`.
    pub fn rows(&self, table: TableId) -> usize {
        match table {
            TableId::TrainVotes => self.num_train,
            TableId::TestVotes => self.num_test,
            TableId::GainRatio => 1,
            TableId::TrainOutcomes => self.num_train * self.num_layers,
            TableId::TestOutcomes => self.num_test * self.num_layers,
        }
    }

    /// Number of columns in each row of `table`.
    pub fn row_width(&self, table: TableId) -> usize {
        match table {
            TableId::TrainVotes | TableId::TestVotes => self.num_labels,
            TableId::GainRatio => self.feature_dim,
            TableId::TrainOutcomes | TableId::TestOutcomes => self.num_trees,
        }
    }
}

// =============================================================================
// Store traits
// =============================================================================

/// One row-addressed table of `f64` counters.
pub trait SharedTable: Send + Sync {
    /// Add `delta` to a single cell.
    fn increment(&self, row: usize, col: usize, delta: f64);

    /// Add a dense delta vector to one row. `deltas` must span the full row.
    fn batch_increment(&self, row: usize, deltas: &[f64]);

    /// Copy of one row. Only reads synchronized by a barrier see a
    /// consistent aggregate.
    fn snapshot(&self, row: usize) -> Vec<f64>;
}

/// Contract the orchestrator requires from an aggregation backend.
///
/// Implementations must guarantee that every increment issued by any
/// registered participant before it calls [`global_barrier`] is visible to
/// every participant once its own [`global_barrier`] call returns.
///
/// [`global_barrier`]: AggregationStore::global_barrier
pub trait AggregationStore: Send + Sync {
    /// Open a handle to one table.
    fn table(&self, id: TableId) -> Arc<dyn SharedTable>;

    /// Join the coordination group. Called once per worker thread before its
    /// first barrier.
    fn register_thread(&self);

    /// Leave the coordination group. Called once per worker thread after its
    /// last barrier.
    fn deregister_thread(&self);

    /// Block until every participant has arrived.
    fn global_barrier(&self);
}

// =============================================================================
// MemStore
// =============================================================================

/// In-process store backing single-machine runs and tests.
///
/// Rows are mutex-guarded vectors, and the barrier spans every worker thread
/// of every simulated client in the process. `participants` passed to
/// [`MemStore::new`] must equal the total number of worker threads that will
/// call [`AggregationStore::global_barrier`].
pub struct MemStore {
    tables: [Arc<MemTable>; 5],
    barrier: Barrier,
    registered: AtomicUsize,
}

impl MemStore {
    pub fn new(layout: &StoreLayout, participants: usize) -> Self {
        let tables = TableId::ALL
            .map(|id| Arc::new(MemTable::new(layout.rows(id), layout.row_width(id))));
        Self {
            tables,
            barrier: Barrier::new(participants),
            registered: AtomicUsize::new(0),
        }
    }

    /// Number of currently registered worker threads.
    pub fn registered_threads(&self) -> usize {
        self.registered.load(Ordering::SeqCst)
    }
}

fn table_index(id: TableId) -> usize {
    match id {
        TableId::TrainVotes => 0,
        TableId::TestVotes => 1,
        TableId::GainRatio => 2,
        TableId::TrainOutcomes => 3,
        TableId::TestOutcomes => 4,
    }
}

impl AggregationStore for MemStore {
    fn table(&self, id: TableId) -> Arc<dyn SharedTable> {
        Arc::clone(&self.tables[table_index(id)]) as Arc<dyn SharedTable>
    }

    fn register_thread(&self) {
        self.registered.fetch_add(1, Ordering::SeqCst);
    }

    fn deregister_thread(&self) {
        self.registered.fetch_sub(1, Ordering::SeqCst);
    }

    fn global_barrier(&self) {
        self.barrier.wait();
    }
}

struct MemTable {
    rows: Vec<Mutex<Vec<f64>>>,
}

impl MemTable {
    fn new(num_rows: usize, row_width: usize) -> Self {
        let rows = (0..num_rows).map(|_| Mutex::new(vec![0.0; row_width])).collect();
        Self { rows }
    }
}

impl SharedTable for MemTable {
    fn increment(&self, row: usize, col: usize, delta: f64) {
        let mut cells = self.rows[row].lock().expect("table row lock poisoned");
        cells[col] += delta;
    }

    fn batch_increment(&self, row: usize, deltas: &[f64]) {
        let mut cells = self.rows[row].lock().expect("table row lock poisoned");
        debug_assert_eq!(deltas.len(), cells.len());
        for (cell, delta) in cells.iter_mut().zip(deltas) {
            *cell += *delta;
        }
    }

    fn snapshot(&self, row: usize) -> Vec<f64> {
        self.rows[row].lock().expect("table row lock poisoned").clone()
    }
}

// =============================================================================
// Tests
// =============================================================================
