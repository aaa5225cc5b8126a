//! Dataset metadata, storage and loaders.
//!
//! Workers exchange nothing but counters at run time, so the dataset layer is
//! deliberately plain: a [`DataMeta`] sidecar describing shape and encoding,
//! a dense [`Dataset`] of value-owned feature vectors, and loaders for the
//! libsvm and raw little-endian binary formats.
//!
//! [`DataMeta::ensure_matches`] is the compatibility gate between
//! collaborating workers: any divergence in dimensionality, label count,
//! encoding or index base is a fatal configuration error.

mod dataset;
mod loader;
mod meta;

pub use dataset::{Dataset, DatasetError};
pub use loader::{load_dataset, meta_path, LoadError};
pub use meta::{DataFormat, DataMeta, MetaError};
