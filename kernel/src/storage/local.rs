// Local Filesystem Store
//
// Datasets live at `{root}/{layer}/{filename}`.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use log::{debug, info};

use super::{LayerStore, StoragePath, StoreError};
use crate::config::BackendKind;
use crate::layer::{DatasetAddress, Layer};

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layer_dir(&self, layer: Layer) -> PathBuf {
        self.root.join(layer.as_str())
    }

    pub fn path_of(&self, address: &DatasetAddress) -> PathBuf {
        self.layer_dir(address.layer).join(&address.filename)
    }

    fn staging_path_of(&self, address: &DatasetAddress) -> PathBuf {
        self.layer_dir(address.layer)
            .join(format!(".{}.tmp", address.filename))
    }
}

fn write_staged(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl LayerStore for LocalStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Local
    }

    fn put(&self, address: &DatasetAddress, data: Bytes) -> Result<StoragePath, StoreError> {
        let dir = self.layer_dir(address.layer);
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;

        let path = self.path_of(address);
        if path.exists() {
            return Err(StoreError::AlreadyExists(path.display().to_string()));
        }
        debug!("writing to local path: {}", path.display());

        // Bytes land under a hidden staging name first; the dataset name
        // only appears once the content is complete.
        let staging = self.staging_path_of(address);
        if let Err(e) = write_staged(&staging, &data) {
            let _ = fs::remove_file(&staging);
            return Err(io_error(&staging, e));
        }

        let linked = fs::hard_link(&staging, &path);
        let _ = fs::remove_file(&staging);
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(path.display().to_string()))
            }
            Err(e) => return Err(io_error(&path, e)),
        }

        info!("wrote {} bytes to local storage: {}", data.len(), path.display());
        Ok(StoragePath::Local(path))
    }

    fn list(&self, layer: Layer) -> Result<Vec<String>, StoreError> {
        let dir = self.layer_dir(layer);
        debug!("scanning local directory: {}", dir.display());

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&dir, e))?;
            let file_type = entry.file_type().map_err(|e| io_error(&entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }
            match entry.file_name().to_str() {
                Some(name) if !name.starts_with('.') => names.push(name.to_string()),
                _ => {}
            }
        }
        Ok(names)
    }

    fn get(&self, address: &DatasetAddress) -> Result<Bytes, StoreError> {
        let path = self.path_of(address);
        match fs::read(&path) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn address(layer: Layer, name: &str) -> DatasetAddress {
        DatasetAddress::new(layer, name).unwrap()
    }

    #[test]
    fn put_creates_layer_directory() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        let path = store
            .put(&address(Layer::Bronze, "a.parquet"), Bytes::from_static(b"abc"))
            .unwrap();

        assert_eq!(path, StoragePath::Local(dir.path().join("bronze").join("a.parquet")));
        assert!(dir.path().join("bronze/a.parquet").is_file());
    }

    #[test]
    fn existing_dataset_is_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        let addr = address(Layer::Silver, "a.parquet");

        store.put(&addr, Bytes::from_static(b"first")).unwrap();
        let err = store.put(&addr, Bytes::from_static(b"second")).unwrap_err();

        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert_eq!(store.get(&addr).unwrap(), Bytes::from_static(b"first"));
    }

    #[test]
    fn list_is_scoped_to_one_layer() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        store.put(&address(Layer::Bronze, "a.parquet"), Bytes::new()).unwrap();
        store.put(&address(Layer::Gold, "b.parquet"), Bytes::new()).unwrap();
        fs::create_dir_all(dir.path().join("bronze/nested")).unwrap();

        assert_eq!(store.list(Layer::Bronze).unwrap(), vec!["a.parquet".to_string()]);
        assert!(store.list(Layer::Silver).unwrap().is_empty());
    }

    #[test]
    fn failed_write_leaves_no_dataset_behind() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        let addr = address(Layer::Bronze, "orders_1.parquet");

        // Block the staging file so the write itself fails.
        let staging = dir.path().join("bronze/.orders_1.parquet.tmp");
        fs::create_dir_all(staging.join("blocker")).unwrap();

        let err = store.put(&addr, Bytes::from_static(b"data")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(!store.path_of(&addr).exists());
        assert!(store.list(Layer::Bronze).unwrap().is_empty());

        // Retrying under the same name succeeds once the fault is gone.
        fs::remove_dir_all(&staging).unwrap();
        store.put(&addr, Bytes::from_static(b"data")).unwrap();
        assert_eq!(store.get(&addr).unwrap(), Bytes::from_static(b"data"));
        assert_eq!(store.list(Layer::Bronze).unwrap(), vec!["orders_1.parquet".to_string()]);
    }

    #[test]
    fn stale_staging_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        fs::create_dir_all(dir.path().join("silver")).unwrap();
        fs::write(dir.path().join("silver/.s_1.parquet.tmp"), b"partial").unwrap();

        assert!(store.list(Layer::Silver).unwrap().is_empty());

        let addr = address(Layer::Silver, "s_1.parquet");
        store.put(&addr, Bytes::from_static(b"full")).unwrap();
        assert_eq!(store.get(&addr).unwrap(), Bytes::from_static(b"full"));
        assert!(!dir.path().join("silver/.s_1.parquet.tmp").exists());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        let err = store.get(&address(Layer::Gold, "nope.parquet")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
