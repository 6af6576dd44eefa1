// In-Memory Store
//
// Process-local store used for dry runs and tests. Can be switched
// into an unavailable mode to simulate a remote outage.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;

use super::{LayerStore, StoragePath, StoreError};
use crate::config::BackendKind;
use crate::layer::{DatasetAddress, Layer};

#[derive(Debug)]
pub struct InMemoryStore {
    backend: BackendKind,
    objects: Mutex<BTreeMap<(Layer, String), Bytes>>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            objects: Mutex::new(BTreeMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Store standing in for the remote backend.
    pub fn remote() -> Self {
        Self::new(BackendKind::Adls)
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn contains(&self, address: &DatasetAddress) -> bool {
        self.objects()
            .contains_key(&(address.layer, address.filename.clone()))
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<(Layer, String), Bytes>> {
        // A poisoned map is still consistent: every mutation is a single insert.
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Remote("in-memory store is unavailable".into()))
        } else {
            Ok(())
        }
    }

    fn path_of(&self, address: &DatasetAddress) -> StoragePath {
        match self.backend {
            BackendKind::Local => StoragePath::Local(address.key().into()),
            BackendKind::Adls => StoragePath::Remote(format!("memory://{}", address.key())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::remote()
    }
}

impl LayerStore for InMemoryStore {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    fn put(&self, address: &DatasetAddress, data: Bytes) -> Result<StoragePath, StoreError> {
        self.check_available()?;
        let mut objects = self.objects();
        let key = (address.layer, address.filename.clone());
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(address.key()));
        }
        objects.insert(key, data);
        Ok(self.path_of(address))
    }

    fn list(&self, layer: Layer) -> Result<Vec<String>, StoreError> {
        self.check_available()?;
        Ok(self
            .objects()
            .keys()
            .filter(|(l, _)| *l == layer)
            .map(|(_, name)| name.clone())
            .collect())
    }

    fn get(&self, address: &DatasetAddress) -> Result<Bytes, StoreError> {
        self.check_available()?;
        self.objects()
            .get(&(address.layer, address.filename.clone()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(address.key()))
    }
}
