//! Dataset metadata sidecar files and cross-worker validation.

use std::path::Path;

use thiserror::Error;

// =============================================================================
// Types
// =============================================================================

/// On-disk encoding of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// Sparse `label idx:val ...` text lines.
    LibSvm,
    /// Raw little-endian records: an i32 label followed by `feature_dim` f32.
    Binary,
}

impl DataFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "libsvm" => Some(Self::LibSvm),
            "bin" | "binary" => Some(Self::Binary),
            _ => None,
        }
    }
}

/// Shape and encoding of a dataset, parsed from its `.meta` sidecar.
///
/// Every worker participating in a run must declare identical metadata;
/// [`DataMeta::ensure_matches`] is the gate that enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataMeta {
    /// Number of features per instance.
    pub feature_dim: usize,
    /// Number of distinct class labels.
    pub num_labels: usize,
    /// On-disk encoding.
    pub format: DataFormat,
    /// Feature indices in the file start at 1 instead of 0.
    pub feature_one_based: bool,
    /// Labels in the file start at 1 instead of 0.
    pub label_one_based: bool,
}

/// Errors raised while reading or reconciling dataset metadata.
#[derive(Debug, Error)]
pub enum MetaError {
    #[error("failed to read metadata file: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata line {line} is not a `key: value` pair: `{text}`")]
    Malformed { line: usize, text: String },

    #[error("metadata value for `{key}` is invalid: `{value}`")]
    InvalidValue { key: String, value: String },

    #[error("metadata is missing required key `{0}`")]
    MissingKey(&'static str),

    #[error("unknown data format `{0}` (expected `libsvm` or `bin`)")]
    UnknownFormat(String),

    #[error("feature_dim mismatch across workers: expected {expected}, got {got}")]
    FeatureDimMismatch { expected: usize, got: usize },

    #[error("num_labels mismatch across workers: expected {expected}, got {got}")]
    NumLabelsMismatch { expected: usize, got: usize },

    #[error("data format mismatch across workers: expected {expected:?}, got {got:?}")]
    FormatMismatch {
        expected: DataFormat,
        got: DataFormat,
    },

    #[error("feature_one_based mismatch across workers: expected {expected}, got {got}")]
    FeatureBaseMismatch { expected: bool, got: bool },

    #[error("label_one_based mismatch across workers: expected {expected}, got {got}")]
    LabelBaseMismatch { expected: bool, got: bool },
}

// =============================================================================
// Parsing
// =============================================================================

impl DataMeta {
    /// Read metadata from a `.meta` sidecar file.
    pub fn from_file(path: &Path) -> Result<Self, MetaError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse metadata from `key: value` lines.
    ///
    /// Unknown keys are ignored so sidecars may carry extra bookkeeping
    /// (instance counts, partition info) without breaking older readers.
    pub fn parse(text: &str) -> Result<Self, MetaError> {
        let mut feature_dim = None;
        let mut num_labels = None;
        let mut format = None;
        let mut feature_one_based = false;
        let mut label_one_based = false;

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once(':').ok_or_else(|| MetaError::Malformed {
                line: line_no + 1,
                text: line.to_string(),
            })?;
            let key = key.trim();
            let value = value.trim();
            match key {
                "feature_dim" => feature_dim = Some(parse_usize(key, value)?),
                "num_labels" => num_labels = Some(parse_usize(key, value)?),
                "format" => {
                    format = Some(
                        DataFormat::parse(value)
                            .ok_or_else(|| MetaError::UnknownFormat(value.to_string()))?,
                    )
                }
                "feature_one_based" => feature_one_based = parse_bool(key, value)?,
                "label_one_based" => label_one_based = parse_bool(key, value)?,
                _ => {}
            }
        }

        Ok(Self {
            feature_dim: feature_dim.ok_or(MetaError::MissingKey("feature_dim"))?,
            num_labels: num_labels.ok_or(MetaError::MissingKey("num_labels"))?,
            format: format.ok_or(MetaError::MissingKey("format"))?,
            feature_one_based,
            label_one_based,
        })
    }

    /// Check that another worker's metadata is identical to this one.
    ///
    /// Any divergence is fatal for the run: forests grown over differently
    /// shaped data would aggregate meaningless counters.
    pub fn ensure_matches(&self, other: &DataMeta) -> Result<(), MetaError> {
        if self.feature_dim != other.feature_dim {
            return Err(MetaError::FeatureDimMismatch {
                expected: self.feature_dim,
                got: other.feature_dim,
            });
        }
        if self.num_labels != other.num_labels {
            return Err(MetaError::NumLabelsMismatch {
                expected: self.num_labels,
                got: other.num_labels,
            });
        }
        if self.format != other.format {
            return Err(MetaError::FormatMismatch {
                expected: self.format,
                got: other.format,
            });
        }
        if self.feature_one_based != other.feature_one_based {
            return Err(MetaError::FeatureBaseMismatch {
                expected: self.feature_one_based,
                got: other.feature_one_based,
            });
        }
        if self.label_one_based != other.label_one_based {
            return Err(MetaError::LabelBaseMismatch {
                expected: self.label_one_based,
                got: other.label_one_based,
            });
        }
        Ok(())
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize, MetaError> {
    value.parse().map_err(|_| MetaError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, MetaError> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(MetaError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> DataMeta {
        DataMeta {
            feature_dim: 54,
            num_labels: 7,
            format: DataFormat::LibSvm,
            feature_one_based: true,
            label_one_based: false,
        }
    }

    #[test]
    fn test_parse_full_sidecar() {
        let text = "num_data: 581012\n\
                    feature_dim: 54\n\
                    num_labels: 7\n\
                    format: libsvm\n\
                    feature_one_based: 1\n\
                    label_one_based: 0\n";
        let meta = DataMeta::parse(text).unwrap();
        assert_eq!(meta, sample_meta());
    }

    #[test]
    fn test_parse_ignores_comments_and_unknown_keys() {
        let text = "# covtype shard 3\n\
                    feature_dim: 54\n\
                    num_labels: 7\n\
                    format: bin\n\
                    snappy_compressed: 0\n";
        let meta = DataMeta::parse(text).unwrap();
        assert_eq!(meta.format, DataFormat::Binary);
        assert!(!meta.feature_one_based);
    }

    #[test]
    fn test_parse_missing_required_key() {
        let text = "feature_dim: 54\nformat: libsvm\n";
        let err = DataMeta::parse(text).unwrap_err();
        assert!(matches!(err, MetaError::MissingKey("num_labels")));
    }

    #[test]
    fn test_parse_rejects_unknown_format() {
        let text = "feature_dim: 4\nnum_labels: 2\nformat: csv\n";
        let err = DataMeta::parse(text).unwrap_err();
        assert!(matches!(err, MetaError::UnknownFormat(_)));
    }

    #[test]
    fn test_parse_rejects_bad_pair() {
        let err = DataMeta::parse("feature_dim = 4\n").unwrap_err();
        assert!(matches!(err, MetaError::Malformed { line: 1, .. }));
    }

    #[test]
    fn test_ensure_matches_accepts_identical() {
        let meta = sample_meta();
        assert!(meta.ensure_matches(&meta.clone()).is_ok());
    }

    #[test]
    fn test_ensure_matches_rejects_dim_divergence() {
        let meta = sample_meta();
        let mut other = meta;
        other.feature_dim = 53;
        let err = meta.ensure_matches(&other).unwrap_err();
        assert!(matches!(
            err,
            MetaError::FeatureDimMismatch {
                expected: 54,
                got: 53
            }
        ));
    }

    #[test]
    fn test_ensure_matches_rejects_label_base_divergence() {
        let meta = sample_meta();
        let mut other = meta;
        other.label_one_based = true;
        let err = meta.ensure_matches(&other).unwrap_err();
        assert!(matches!(err, MetaError::LabelBaseMismatch { .. }));
    }
}
