//! Per-thread tree ensembles: training, voting, traversal outcomes and
//! persistence.
//!
//! A [`RandForest`] owns the contiguous range of global trees assigned to
//! one worker thread. Each tree draws its own deterministic RNG stream from
//! the run seed and its global tree index, so a run is reproducible for a
//! fixed configuration regardless of thread interleaving.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::Dataset;
use crate::forest::sampling::bootstrap_indices;
use crate::forest::tree::{DecisionTree, TreeParams};
use crate::utils::argmax_first;

// =============================================================================
// Parameters
// =============================================================================

/// Configuration of one worker thread's forest.
#[derive(Debug, Clone)]
pub struct ForestParams {
    /// Trees owned by this forest (the partition count for this thread).
    pub num_trees: usize,
    /// Global index of this forest's first tree; per-tree RNG streams are
    /// derived from it.
    pub tree_idx_start: usize,
    /// Owning client, used for part-file naming.
    pub client_id: usize,
    /// Owning thread, used for part-file naming.
    pub thread_id: usize,
    /// Run seed shared by all workers.
    pub seed: u64,
    /// Per-tree growth parameters.
    pub tree: TreeParams,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            num_trees: 1,
            tree_idx_start: 0,
            client_id: 0,
            thread_id: 0,
            seed: 0,
            tree: TreeParams::default(),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while persisting or restoring forests.
#[derive(Debug, Error)]
pub enum ForestIoError {
    #[error("failed to access forest file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed forest file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("part {path}: num_labels {got} does not match {expected}")]
    NumLabelsMismatch {
        path: PathBuf,
        expected: usize,
        got: usize,
    },

    #[error("part {path}: feature_dim {got} does not match {expected}")]
    FeatureDimMismatch {
        path: PathBuf,
        expected: usize,
        got: usize,
    },
}

/// On-disk payload of one saved forest part.
#[derive(Debug, Serialize, Deserialize)]
struct SavedForest {
    num_labels: usize,
    feature_dim: usize,
    trees: Vec<DecisionTree>,
}

// =============================================================================
// RandForest
// =============================================================================

/// The ensemble grown and owned by a single worker thread.
#[derive(Debug, Clone)]
pub struct RandForest {
    params: ForestParams,
    trees: Vec<DecisionTree>,
    num_labels: usize,
    feature_dim: usize,
}

impl RandForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            num_labels: 0,
            feature_dim: 0,
        }
    }

    /// Grow `num_trees` trees over the worker's training instances.
    ///
    /// Each tree seeds its own RNG stream from `(seed, global tree index)`
    /// and draws its own bootstrap sample.
    ///
    /// # Panics
    ///
    /// Panics if the dataset is empty.
    pub fn train(&mut self, dataset: &Dataset) {
        assert!(!dataset.is_empty(), "cannot train a forest on no instances");
        self.num_labels = dataset.num_labels();
        self.feature_dim = dataset.feature_dim();
        self.trees.clear();
        self.trees.reserve(self.params.num_trees);

        for t in 0..self.params.num_trees {
            let global_index = self.params.tree_idx_start + t;
            let mut rng =
                Xoshiro256PlusPlus::seed_from_u64(self.params.seed.wrapping_add(global_index as u64));
            let indices =
                bootstrap_indices(&mut rng, dataset.len(), self.params.tree.num_data_subsample);
            self.trees
                .push(DecisionTree::grow(dataset, &self.params.tree, &indices, &mut rng));
        }
    }

    /// Trees currently held (0 before training or loading).
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Label count captured at train or load time.
    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    /// Feature dimension captured at train or load time.
    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// Per-label vote counts for one instance, one vote per tree.
    pub fn predict_votes(&self, x: &[f32]) -> Vec<u32> {
        let mut votes = vec![0u32; self.num_labels];
        for tree in &self.trees {
            votes[tree.predict(x) as usize] += 1;
        }
        votes
    }

    /// Majority-vote label for one instance, first label winning ties.
    pub fn predict_label(&self, x: &[f32]) -> u32 {
        argmax_first(&self.predict_votes(x)) as u32
    }

    /// Per-tree traversal outcomes for one instance, in local tree order.
    ///
    /// Outcome `j` belongs to global tree `tree_idx_start + j`.
    pub fn go_down_trees(&self, x: &[f32]) -> Vec<u32> {
        self.trees.iter().map(|tree| tree.predict(x)).collect()
    }

    /// Summed branch gain ratios per feature across all trees.
    pub fn compute_feature_importance(&self) -> Vec<f32> {
        let mut importance = vec![0.0f32; self.feature_dim];
        for tree in &self.trees {
            tree.accumulate_importance(&mut importance);
        }
        importance
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Part-file path for one (client, thread) forest.
    pub fn part_path(base: &Path, client_id: usize, thread_id: usize) -> PathBuf {
        let mut os = base.as_os_str().to_os_string();
        os.push(format!(".part{client_id}.{thread_id}"));
        PathBuf::from(os)
    }

    /// Write this forest to its part file under `base`. Returns the path.
    pub fn save_trees(&self, base: &Path) -> Result<PathBuf, ForestIoError> {
        let path = Self::part_path(base, self.params.client_id, self.params.thread_id);
        let file = File::create(&path)?;
        let payload = SavedForest {
            num_labels: self.num_labels,
            feature_dim: self.feature_dim,
            trees: self.trees.clone(),
        };
        serde_json::to_writer(BufWriter::new(file), &payload)?;
        Ok(path)
    }

    /// Restore a forest from a single saved file.
    pub fn load_trees(path: &Path) -> Result<Self, ForestIoError> {
        let file = File::open(path)?;
        let payload: SavedForest = serde_json::from_reader(BufReader::new(file))?;
        Ok(Self::from_saved(payload))
    }

    /// Restore and merge every part file of a full run.
    ///
    /// Parts are read in logical worker order, so merged tree order equals
    /// global tree order. Shape divergence between parts is an error.
    pub fn load_parts(
        base: &Path,
        num_clients: usize,
        num_threads: usize,
    ) -> Result<Self, ForestIoError> {
        let mut merged: Option<SavedForest> = None;
        for client_id in 0..num_clients {
            for thread_id in 0..num_threads {
                let path = Self::part_path(base, client_id, thread_id);
                let file = File::open(&path)?;
                let part: SavedForest = serde_json::from_reader(BufReader::new(file))?;
                match merged.as_mut() {
                    None => merged = Some(part),
                    Some(all) => {
                        if part.num_labels != all.num_labels {
                            return Err(ForestIoError::NumLabelsMismatch {
                                path,
                                expected: all.num_labels,
                                got: part.num_labels,
                            });
                        }
                        if part.feature_dim != all.feature_dim {
                            return Err(ForestIoError::FeatureDimMismatch {
                                path,
                                expected: all.feature_dim,
                                got: part.feature_dim,
                            });
                        }
                        all.trees.extend(part.trees);
                    }
                }
            }
        }
        // num_clients and num_threads are validated nonzero upstream.
        let payload = merged.unwrap_or(SavedForest {
            num_labels: 0,
            feature_dim: 0,
            trees: Vec::new(),
        });
        Ok(Self::from_saved(payload))
    }

    fn from_saved(payload: SavedForest) -> Self {
        let params = ForestParams {
            num_trees: payload.trees.len(),
            ..Default::default()
        };
        Self {
            params,
            trees: payload.trees,
            num_labels: payload.num_labels,
            feature_dim: payload.feature_dim,
        }
    }
}
