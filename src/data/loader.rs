//! Dataset loaders for the libsvm and dense binary formats.
//!
//! Both formats are described by a `.meta` sidecar next to the data file
//! (see [`DataMeta`]); [`load_dataset`] reads the sidecar first and then
//! dispatches on the declared format.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use thiserror::Error;

use crate::data::{DataFormat, DataMeta, Dataset, DatasetError, MetaError};

/// Errors raised while loading a dataset from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Meta(#[from] MetaError),

    #[error("line {line}: malformed libsvm entry `{text}`")]
    MalformedLine { line: usize, text: String },

    #[error("line {line}: feature index {index} is outside dimension {feature_dim}")]
    FeatureIndexOutOfRange {
        line: usize,
        index: i64,
        feature_dim: usize,
    },

    #[error("record {record}: label {label} is outside 0..{num_labels}")]
    LabelOutOfRange {
        record: usize,
        label: i64,
        num_labels: usize,
    },

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Path of the metadata sidecar for a data file: the file path plus `.meta`.
pub fn meta_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".meta");
    PathBuf::from(os)
}

/// Load a dataset and its metadata, dispatching on the declared format.
pub fn load_dataset(path: &Path) -> Result<(DataMeta, Dataset), LoadError> {
    let meta = DataMeta::from_file(&meta_path(path))?;
    let dataset = match meta.format {
        DataFormat::LibSvm => load_libsvm(path, &meta)?,
        DataFormat::Binary => load_binary(path, &meta)?,
    };
    Ok((meta, dataset))
}

/// Parse sparse `label idx:val ...` lines into dense vectors.
///
/// Indices absent from a line stay 0. One-based indices and labels are
/// shifted down according to the metadata flags.
pub fn load_libsvm(path: &Path, meta: &DataMeta) -> Result<Dataset, LoadError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut features = Vec::new();
    let mut labels = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = line_no + 1;
        let mut tokens = line.split_whitespace();
        let label_token = tokens.next().ok_or_else(|| LoadError::MalformedLine {
            line: record,
            text: line.to_string(),
        })?;
        let raw_label: i64 = label_token.parse().map_err(|_| LoadError::MalformedLine {
            line: record,
            text: line.to_string(),
        })?;
        labels.push(decode_label(raw_label, meta, record)?);

        let mut vector = vec![0.0f32; meta.feature_dim];
        for token in tokens {
            let (index, value) = token.split_once(':').ok_or_else(|| {
                LoadError::MalformedLine {
                    line: record,
                    text: line.to_string(),
                }
            })?;
            let raw_index: i64 = index.parse().map_err(|_| LoadError::MalformedLine {
                line: record,
                text: line.to_string(),
            })?;
            let value: f32 = value.parse().map_err(|_| LoadError::MalformedLine {
                line: record,
                text: line.to_string(),
            })?;
            let index = decode_feature_index(raw_index, meta, record)?;
            vector[index] = value;
        }
        features.push(vector);
    }

    Ok(Dataset::new(
        features,
        labels,
        meta.feature_dim,
        meta.num_labels,
    )?)
}

/// Read fixed-size records: an i32 label then `feature_dim` f32, little-endian.
pub fn load_binary(path: &Path, meta: &DataMeta) -> Result<Dataset, LoadError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut features = Vec::new();
    let mut labels = Vec::new();

    loop {
        let raw_label = match reader.read_i32::<LittleEndian>() {
            Ok(v) => v,
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        };
        let record = labels.len() + 1;
        labels.push(decode_label(i64::from(raw_label), meta, record)?);

        let mut vector = vec![0.0f32; meta.feature_dim];
        reader.read_f32_into::<LittleEndian>(&mut vector)?;
        features.push(vector);
    }

    Ok(Dataset::new(
        features,
        labels,
        meta.feature_dim,
        meta.num_labels,
    )?)
}

fn decode_label(raw: i64, meta: &DataMeta, record: usize) -> Result<u32, LoadError> {
    let label = if meta.label_one_based { raw - 1 } else { raw };
    if label < 0 || label as usize >= meta.num_labels {
        return Err(LoadError::LabelOutOfRange {
            record,
            label: raw,
            num_labels: meta.num_labels,
        });
    }
    Ok(label as u32)
}

fn decode_feature_index(raw: i64, meta: &DataMeta, line: usize) -> Result<usize, LoadError> {
    let index = if meta.feature_one_based { raw - 1 } else { raw };
    if index < 0 || index as usize >= meta.feature_dim {
        return Err(LoadError::FeatureIndexOutOfRange {
            line,
            index: raw,
            feature_dim: meta.feature_dim,
        });
    }
    Ok(index as usize)
}
