// Azure Data Lake Storage Gen2 Store
//
// Datasets live at `{base_path}/{layer}/{filename}` inside the
// configured container. The async object store client is driven by
// a private current-thread runtime so the gateway stays synchronous.
// Must not be called from inside another tokio runtime.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info};
use object_store::azure::MicrosoftAzureBuilder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutMode, PutPayload};
use tokio::runtime::{Builder, Runtime};

use super::{LayerStore, StoragePath, StoreError};
use crate::config::{join_key, AdlsCredentials, BackendKind};
use crate::layer::{DatasetAddress, Layer};

pub struct AdlsStore {
    store: Arc<dyn ObjectStore>,
    base_path: String,
    uri_root: String,
    runtime: Runtime,
}

impl fmt::Debug for AdlsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdlsStore")
            .field("base_path", &self.base_path)
            .field("uri_root", &self.uri_root)
            .finish_non_exhaustive()
    }
}

fn remote_error(e: impl fmt::Display) -> StoreError {
    StoreError::Remote(e.to_string())
}

impl AdlsStore {
    /// Connect to the container described by `credentials`.
    pub fn connect(credentials: &AdlsCredentials, base_path: &str) -> Result<Self, StoreError> {
        let store = MicrosoftAzureBuilder::new()
            .with_account(&credentials.account_name)
            .with_access_key(&credentials.account_key)
            .with_container_name(&credentials.container)
            .build()
            .map_err(remote_error)?;

        let uri_root = format!(
            "abfss://{}@{}.dfs.core.windows.net",
            credentials.container, credentials.account_name
        );
        Self::with_object_store(Arc::new(store), base_path, uri_root)
    }

    /// Wrap an already constructed object store.
    pub fn with_object_store(
        store: Arc<dyn ObjectStore>,
        base_path: &str,
        uri_root: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(remote_error)?;

        Ok(Self {
            store,
            base_path: base_path.trim_matches('/').to_string(),
            uri_root: uri_root.into().trim_end_matches('/').to_string(),
            runtime,
        })
    }

    fn object_key(&self, address: &DatasetAddress) -> String {
        join_key(&self.base_path, address.layer, &address.filename)
    }

    fn layer_prefix(&self, layer: Layer) -> ObjectPath {
        if self.base_path.is_empty() {
            ObjectPath::from(layer.as_str())
        } else {
            ObjectPath::from(format!("{}/{}", self.base_path, layer))
        }
    }

    fn uri_of(&self, key: &str) -> String {
        format!("{}/{}", self.uri_root, key)
    }
}

impl LayerStore for AdlsStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Adls
    }

    fn put(&self, address: &DatasetAddress, data: Bytes) -> Result<StoragePath, StoreError> {
        let key = self.object_key(address);
        let location = ObjectPath::from(key.as_str());
        let size = data.len();
        debug!("uploading {size} bytes to ADLS: {key}");

        let result = self.runtime.block_on(self.store.put_opts(
            &location,
            PutPayload::from(data),
            PutMode::Create.into(),
        ));

        match result {
            Ok(_) => {
                let uri = self.uri_of(&key);
                info!("uploaded {size} bytes to ADLS: {uri}");
                Ok(StoragePath::Remote(uri))
            }
            Err(object_store::Error::AlreadyExists { .. }) => {
                Err(StoreError::AlreadyExists(self.uri_of(&key)))
            }
            Err(e) => Err(remote_error(e)),
        }
    }

    fn list(&self, layer: Layer) -> Result<Vec<String>, StoreError> {
        let prefix = self.layer_prefix(layer);
        debug!("scanning ADLS directory: {prefix}");

        let listing = match self
            .runtime
            .block_on(self.store.list_with_delimiter(Some(&prefix)))
        {
            Ok(listing) => listing,
            Err(object_store::Error::NotFound { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(remote_error(e)),
        };

        Ok(listing
            .objects
            .iter()
            .filter_map(|meta| meta.location.filename().map(str::to_string))
            .collect())
    }

    fn get(&self, address: &DatasetAddress) -> Result<Bytes, StoreError> {
        let key = self.object_key(address);
        let location = ObjectPath::from(key.as_str());

        let result = self.runtime.block_on(async {
            let response = self.store.get(&location).await?;
            response.bytes().await
        });

        match result {
            Ok(data) => Ok(data),
            Err(object_store::Error::NotFound { .. }) => Err(StoreError::NotFound(self.uri_of(&key))),
            Err(e) => Err(remote_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn store() -> AdlsStore {
        AdlsStore::with_object_store(
            Arc::new(InMemory::new()),
            "/dna-platform/data/",
            "abfss://lake@acct.dfs.core.windows.net",
        )
        .unwrap()
    }

    #[test]
    fn put_returns_abfss_uri() {
        let store = store();
        let addr = DatasetAddress::new(Layer::Bronze, "orders.parquet").unwrap();

        let path = store.put(&addr, Bytes::from_static(b"data")).unwrap();

        assert_eq!(
            path,
            StoragePath::Remote(
                "abfss://lake@acct.dfs.core.windows.net/dna-platform/data/bronze/orders.parquet"
                    .into()
            )
        );
        assert_eq!(store.get(&addr).unwrap(), Bytes::from_static(b"data"));
    }

    #[test]
    fn put_refuses_to_overwrite() {
        let store = store();
        let addr = DatasetAddress::new(Layer::Gold, "x.parquet").unwrap();

        store.put(&addr, Bytes::from_static(b"1")).unwrap();
        let err = store.put(&addr, Bytes::from_static(b"2")).unwrap_err();

        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn list_returns_direct_children_of_layer() {
        let store = store();
        store
            .put(&DatasetAddress::new(Layer::Silver, "a.parquet").unwrap(), Bytes::new())
            .unwrap();
        store
            .put(&DatasetAddress::new(Layer::Gold, "b.parquet").unwrap(), Bytes::new())
            .unwrap();

        assert_eq!(store.list(Layer::Silver).unwrap(), vec!["a.parquet".to_string()]);
        assert!(store.list(Layer::Bronze).unwrap().is_empty());
    }

    #[test]
    fn missing_object_is_not_found() {
        let store = store();
        let addr = DatasetAddress::new(Layer::Gold, "missing.parquet").unwrap();
        assert!(matches!(store.get(&addr), Err(StoreError::NotFound(_))));
    }
}
