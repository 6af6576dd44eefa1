// Layer Storage Abstraction
//
// Defines the contract every physical backend fulfils for the
// gateway: put, list and get opaque dataset bytes addressed by
// `(layer, filename)`.

pub mod adls;
pub mod local;
pub mod memory;

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::BackendKind;
use crate::layer::{DatasetAddress, Layer};

pub use adls::AdlsStore;
pub use local::LocalStore;
pub use memory::InMemoryStore;

/// Physical location of a written dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", content = "path", rename_all = "lowercase")]
pub enum StoragePath {
    Local(PathBuf),
    Remote(String),
}

impl StoragePath {
    pub fn is_local(&self) -> bool {
        matches!(self, StoragePath::Local(_))
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoragePath::Local(path) => write!(f, "{}", path.display()),
            StoragePath::Remote(uri) => f.write_str(uri),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("dataset not found: {0}")]
    NotFound(String),

    #[error("dataset already exists: {0}")]
    AlreadyExists(String),

    #[error("local storage error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("remote storage error: {0}")]
    Remote(String),
}

/// Storage backend for dataset files.
///
/// Properties required from implementations:
/// - Datasets are immutable: `put` never overwrites an existing name
/// - `list` returns plain filenames of one layer, never other layers
/// - A missing layer lists as empty
pub trait LayerStore: Send + Sync {
    /// Which backend kind this store represents.
    fn backend(&self) -> BackendKind;

    /// Persist a dataset and return where it landed.
    fn put(&self, address: &DatasetAddress, data: Bytes) -> Result<StoragePath, StoreError>;

    /// Filenames currently present in `layer`.
    fn list(&self, layer: Layer) -> Result<Vec<String>, StoreError>;

    /// Load a dataset.
    fn get(&self, address: &DatasetAddress) -> Result<Bytes, StoreError>;
}
