//! foresters: distributed layered random forests for Rust.
//!
//! This crate trains an ensemble of decision trees across cooperating worker
//! processes and threads, optionally stacking several forests in layers where
//! each layer consumes the previous layer's per-tree traversal outcomes as new
//! features. Split selection is randomized and entropy/gain-ratio driven;
//! votes, feature importance and traversal outcomes are combined through a
//! shared counter store synchronized by coarse barriers.

pub mod data;
pub mod forest;
pub mod testing;
pub mod training;
pub mod utils;
