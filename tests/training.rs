//! Integration tests for the training protocol, grouped by scenario.

mod common;

#[path = "training/engine.rs"]
mod engine;

#[path = "training/layered.rs"]
mod layered;
