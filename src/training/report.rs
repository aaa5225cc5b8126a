//! Run evaluation: decoded predictions, zero-one errors, output files.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use rayon::prelude::*;

use crate::training::store::SharedTable;
use crate::training::votes::{decode_row, VoteError};

// =============================================================================
// PerformanceReport
// =============================================================================

/// Decoded predictions for a finished run.
///
/// Assembled once by the designated thread after the final barrier, when
/// every vote row holds the contribution of every tree.
#[derive(Debug, Clone)]
pub struct PerformanceReport {
    pub num_labels: usize,
    /// Trees that contributed to every vote row.
    pub num_trees: u64,
    pub train_pred: Vec<u32>,
    pub train_proba: Vec<Vec<f32>>,
    pub train_labels: Vec<u32>,
    pub test_pred: Vec<u32>,
    pub test_proba: Vec<Vec<f32>>,
    pub test_labels: Vec<u32>,
}

impl PerformanceReport {
    /// Decode both vote tables into predictions and vote-share matrices.
    ///
    /// Label slices give the row counts; a dataset that was never voted on
    /// passes an empty slice.
    pub fn assemble(
        train_votes: &dyn SharedTable,
        train_labels: &[u32],
        test_votes: &dyn SharedTable,
        test_labels: &[u32],
        num_labels: usize,
        num_trees: u64,
    ) -> Result<Self, VoteError> {
        let (train_pred, train_proba) = decode_table(train_votes, train_labels.len(), num_trees)?;
        let (test_pred, test_proba) = decode_table(test_votes, test_labels.len(), num_trees)?;
        Ok(Self {
            num_labels,
            num_trees,
            train_pred,
            train_proba,
            train_labels: train_labels.to_vec(),
            test_pred,
            test_proba,
            test_labels: test_labels.to_vec(),
        })
    }

    /// Fraction of training instances whose majority vote misses the label.
    pub fn train_error(&self) -> f64 {
        zero_one_error(&self.train_pred, &self.train_labels)
    }

    /// Fraction of test instances whose majority vote misses the label.
    pub fn test_error(&self) -> f64 {
        zero_one_error(&self.test_pred, &self.test_labels)
    }

    /// Write per-test-instance predictions, one line per instance.
    ///
    /// With `output_proba` each line is the tab-separated vote share per
    /// label to three decimals; otherwise it is the predicted label.
    pub fn write_predictions(&self, path: &Path, output_proba: bool) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        if output_proba {
            for proba in &self.test_proba {
                let fields: Vec<String> = proba.iter().map(|p| format!("{p:.3}")).collect();
                writeln!(out, "{}", fields.join("\t"))?;
            }
        } else {
            for &label in &self.test_pred {
                writeln!(out, "{label}")?;
            }
        }
        out.flush()
    }

    /// Write the run summary as tab-separated key/value lines.
    pub fn write_report(&self, path: &Path) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "num_trees\t{}", self.num_trees)?;
        writeln!(out, "num_labels\t{}", self.num_labels)?;
        writeln!(out, "num_train\t{}", self.train_labels.len())?;
        writeln!(out, "train_error\t{:.6}", self.train_error())?;
        writeln!(out, "num_test\t{}", self.test_labels.len())?;
        writeln!(out, "test_error\t{:.6}", self.test_error())?;
        out.flush()
    }
}

fn decode_table(
    table: &dyn SharedTable,
    num_rows: usize,
    num_trees: u64,
) -> Result<(Vec<u32>, Vec<Vec<f32>>), VoteError> {
    let decoded: Vec<_> = (0..num_rows)
        .into_par_iter()
        .map(|row| decode_row(row, &table.snapshot(row), num_trees))
        .collect::<Result<_, _>>()?;
    Ok(decoded.into_iter().map(|d| (d.label, d.proba)).unzip())
}

fn zero_one_error(pred: &[u32], labels: &[u32]) -> f64 {
    debug_assert_eq!(pred.len(), labels.len());
    if labels.is_empty() {
        return 0.0;
    }
    let misses = pred.iter().zip(labels).filter(|(p, l)| p != l).count();
    misses as f64 / labels.len() as f64
}

// =============================================================================
// Tests
// =============================================================================
