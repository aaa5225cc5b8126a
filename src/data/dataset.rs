//! Dense instance storage shared by training and evaluation.

use thiserror::Error;

/// Errors raised when assembling or reshaping a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("instance {index} has {got} features, expected {expected}")]
    InconsistentFeatures {
        index: usize,
        expected: usize,
        got: usize,
    },

    #[error("labels length {got} does not match instance count {expected}")]
    LabelLenMismatch { expected: usize, got: usize },

    #[error("label {label} at instance {index} is outside 0..{num_labels}")]
    LabelOutOfRange {
        index: usize,
        label: u32,
        num_labels: usize,
    },

    #[error("replacement features have {got} instances, expected {expected}")]
    ReplaceLenMismatch { expected: usize, got: usize },
}

/// A dense set of instances: one value-owned feature vector and one label each.
///
/// Labels are immutable for the life of the dataset. Feature vectors are
/// replaced wholesale at layer transitions via [`Dataset::replace_features`],
/// which also switches the dataset's dimensionality.
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Vec<Vec<f32>>,
    labels: Vec<u32>,
    feature_dim: usize,
    num_labels: usize,
}

impl Dataset {
    /// Build a dataset, validating shape and label range.
    pub fn new(
        features: Vec<Vec<f32>>,
        labels: Vec<u32>,
        feature_dim: usize,
        num_labels: usize,
    ) -> Result<Self, DatasetError> {
        if labels.len() != features.len() {
            return Err(DatasetError::LabelLenMismatch {
                expected: features.len(),
                got: labels.len(),
            });
        }
        for (index, vector) in features.iter().enumerate() {
            if vector.len() != feature_dim {
                return Err(DatasetError::InconsistentFeatures {
                    index,
                    expected: feature_dim,
                    got: vector.len(),
                });
            }
        }
        for (index, &label) in labels.iter().enumerate() {
            if label as usize >= num_labels {
                return Err(DatasetError::LabelOutOfRange {
                    index,
                    label,
                    num_labels,
                });
            }
        }
        Ok(Self {
            features,
            labels,
            feature_dim,
            num_labels,
        })
    }

    /// An empty dataset with the given shape, for workers without a split.
    pub fn empty(feature_dim: usize, num_labels: usize) -> Self {
        Self {
            features: Vec::new(),
            labels: Vec::new(),
            feature_dim,
            num_labels,
        }
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Current feature dimensionality (changes at layer transitions).
    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// Number of distinct class labels.
    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    /// Feature vector of instance `index`.
    #[inline]
    pub fn feature(&self, index: usize) -> &[f32] {
        &self.features[index]
    }

    /// Label of instance `index`.
    #[inline]
    pub fn label(&self, index: usize) -> u32 {
        self.labels[index]
    }

    /// All labels, in instance order.
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Replace every feature vector and switch dimensionality.
    ///
    /// This is the layer transition: old vectors are dropped by assignment,
    /// labels are untouched. The replacement must carry exactly one vector
    /// per instance; per-vector lengths are validated against `feature_dim`.
    pub fn replace_features(
        &mut self,
        features: Vec<Vec<f32>>,
        feature_dim: usize,
    ) -> Result<(), DatasetError> {
        if features.len() != self.labels.len() {
            return Err(DatasetError::ReplaceLenMismatch {
                expected: self.labels.len(),
                got: features.len(),
            });
        }
        for (index, vector) in features.iter().enumerate() {
            if vector.len() != feature_dim {
                return Err(DatasetError::InconsistentFeatures {
                    index,
                    expected: feature_dim,
                    got: vector.len(),
                });
            }
        }
        self.features = features;
        self.feature_dim = feature_dim;
        Ok(())
    }
}
