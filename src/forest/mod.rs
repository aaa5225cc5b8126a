//! Tree growth and per-thread ensembles.
//!
//! The split finder is the algorithmic core: every node of every tree runs
//! the same randomized gain-ratio search. Trees and forests wrap it with
//! subsampling, traversal and persistence; the distributed protocol in
//! [`crate::training`] consumes forests as an opaque capability.

mod forest;
mod sampling;
mod split;
mod tree;

pub use forest::{ForestIoError, ForestParams, RandForest};
pub use sampling::{bootstrap_indices, sample_features};
pub use split::{entropy, FeatureEntry, SplitFinder, SplitSearch};
pub use tree::{DecisionTree, TreeParams};
