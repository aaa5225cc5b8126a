//! Distributed training orchestration.
//!
//! The [`ForestEngine`] drives one client's worker threads through the
//! layered protocol; the [`AggregationStore`] traits carry everything that
//! crosses worker boundaries; [`partition`] fixes which trees each worker
//! owns; and [`PerformanceReport`] holds the decoded result.

mod engine;
mod logger;
pub mod partition;
mod report;
mod store;
mod votes;

pub use engine::{EngineError, EngineParams, ForestEngine};
pub use logger::{TrainingLogger, Verbosity};
pub use partition::TreeAssignment;
pub use report::PerformanceReport;
pub use store::{AggregationStore, MemStore, SharedTable, StoreLayout, TableId};
pub use votes::{decode_row, encode_votes, DecodedVotes, VoteError};
