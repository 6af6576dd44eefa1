// Storage Gateway
//
// Routes dataset writes and "latest" reads to the configured
// backend and applies the dual-write and fallback policy:
//
//   local: full dataset -> local store
//   adls:  full dataset -> remote store
//          + first N rows -> local store as `sample_{filename}` (best effort)
//          remote failure -> local store if fallback is enabled, else error

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use crate::codec::{decode_parquet, encode_parquet, CodecError};
use crate::config::{AdlsCredentials, BackendKind, ConfigError, StorageConfig};
use crate::layer::{
    latest_matching, timestamped_filename, validate_prefix, AddressError, DatasetAddress, Layer,
};
use crate::metadata::{DatasetMetadata, WriteOutcome};
use crate::storage::{
    AdlsStore, InMemoryStore, LayerStore, LocalStore, StoragePath, StoreError,
};

/// Errors surfaced by the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid dataset address: {0}")]
    Address(#[from] AddressError),

    #[error("no dataset in layer `{layer}` matches prefix `{prefix}`")]
    NotFound { layer: Layer, prefix: String },

    #[error("dataset {0} already exists")]
    AlreadyExists(DatasetAddress),

    #[error("remote storage failed: {0}")]
    Remote(#[source] StoreError),

    #[error("local storage failed: {0}")]
    Local(#[source] StoreError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }
}

/// Map a store failure to a gateway error according to which store raised it.
fn store_error(store: &dyn LayerStore, address: &DatasetAddress, error: StoreError) -> GatewayError {
    match error {
        StoreError::AlreadyExists(_) => GatewayError::AlreadyExists(address.clone()),
        StoreError::NotFound(_) => GatewayError::NotFound {
            layer: address.layer,
            prefix: address.filename.clone(),
        },
        other => match store.backend() {
            BackendKind::Adls => GatewayError::Remote(other),
            BackendKind::Local => GatewayError::Local(other),
        },
    }
}

/// Dataset returned by a "latest" read.
#[derive(Debug, Clone)]
pub struct LatestDataset {
    pub filename: String,
    pub backend: BackendKind,
    pub batch: RecordBatch,
}

/// Resolves `(layer, filename)` addresses against the configured backends.
pub struct StorageGateway {
    config: StorageConfig,
    local: Arc<dyn LayerStore>,
    remote: Option<Arc<dyn LayerStore>>,
}

impl StorageGateway {
    /// Build a gateway from configuration, connecting to ADLS when selected.
    pub fn new(config: StorageConfig) -> Result<Self, GatewayError> {
        config.validate()?;

        let local: Arc<dyn LayerStore> = Arc::new(LocalStore::new(&config.local_root));
        let remote: Option<Arc<dyn LayerStore>> = match (config.backend, config.adls.as_ref()) {
            (BackendKind::Adls, Some(credentials)) => {
                let store = Self::connect(credentials, config.base_path())?;
                Some(Arc::new(store) as Arc<dyn LayerStore>)
            }
            _ => None,
        };

        info!("storage gateway ready: backend={}", config.backend);
        Self::with_stores(config, local, remote)
    }

    /// Build a gateway over explicitly provided stores.
    pub fn with_stores(
        config: StorageConfig,
        local: Arc<dyn LayerStore>,
        remote: Option<Arc<dyn LayerStore>>,
    ) -> Result<Self, GatewayError> {
        if config.backend == BackendKind::Adls && remote.is_none() {
            return Err(ConfigError::NoRemoteStore.into());
        }
        Ok(Self {
            config,
            local,
            remote,
        })
    }

    /// Build a gateway whose stores live in memory; nothing touches disk
    /// or the network. Credentials are not required.
    pub fn in_memory(config: StorageConfig) -> Result<Self, GatewayError> {
        let local: Arc<dyn LayerStore> = Arc::new(InMemoryStore::new(BackendKind::Local));
        let remote: Option<Arc<dyn LayerStore>> = match config.backend {
            BackendKind::Adls => Some(Arc::new(InMemoryStore::remote()) as Arc<dyn LayerStore>),
            BackendKind::Local => None,
        };
        Self::with_stores(config, local, remote)
    }

    fn connect(credentials: &AdlsCredentials, base_path: &str) -> Result<AdlsStore, GatewayError> {
        AdlsStore::connect(credentials, base_path).map_err(GatewayError::Remote)
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn backend(&self) -> BackendKind {
        self.config.backend
    }

    fn primary(&self) -> Result<&dyn LayerStore, GatewayError> {
        match self.config.backend {
            BackendKind::Local => Ok(self.local.as_ref()),
            BackendKind::Adls => self
                .remote
                .as_deref()
                .ok_or(GatewayError::Config(ConfigError::NoRemoteStore)),
        }
    }

    /// Write `batch` to `{layer}/{filename}` and return its canonical path.
    pub fn write(
        &self,
        batch: &RecordBatch,
        layer: Layer,
        filename: &str,
    ) -> Result<StoragePath, GatewayError> {
        let address = DatasetAddress::new(layer, filename)?;
        info!(
            "writing {} rows to {address} using {} backend",
            batch.num_rows(),
            self.config.backend
        );
        if batch.num_rows() == 0 {
            warn!("writing empty dataset to {address}");
        }

        let data = Bytes::from(encode_parquet(batch)?);
        let primary = self.primary()?;

        match primary.put(&address, data.clone()) {
            Ok(path) => {
                if primary.backend() == BackendKind::Adls {
                    self.after_remote_write(batch, &address, data);
                }
                Ok(path)
            }
            Err(e) => {
                let e = store_error(primary, &address, e);
                match e {
                    GatewayError::Remote(cause) if self.config.fallback_to_local => {
                        warn!("remote write failed, falling back to local storage: {cause}");
                        self.local
                            .put(&address, data)
                            .map_err(|e| store_error(self.local.as_ref(), &address, e))
                    }
                    GatewayError::Remote(cause) => {
                        error!("remote write failed and fallback is disabled: {cause}");
                        Err(GatewayError::Remote(cause))
                    }
                    other => Err(other),
                }
            }
        }
    }

    /// Best-effort local side effects of a successful remote write.
    fn after_remote_write(&self, batch: &RecordBatch, address: &DatasetAddress, data: Bytes) {
        if self.config.sample_enabled() {
            self.write_sample(batch, address);
        }

        // Full local copy so that fallback reads have something to find.
        if self.config.fallback_to_local {
            match self.local.put(address, data) {
                Ok(path) => debug!("local mirror written: {path}"),
                Err(e) => warn!("local mirror write failed (non-critical): {e}"),
            }
        }
    }

    fn write_sample(&self, batch: &RecordBatch, address: &DatasetAddress) {
        let rows = self.config.sample_size.min(batch.num_rows());
        let sample = batch.slice(0, rows);
        let sample_address = address.sample();

        let result = encode_parquet(&sample)
            .map_err(GatewayError::from)
            .and_then(|data| {
                self.local
                    .put(&sample_address, Bytes::from(data))
                    .map_err(|e| store_error(self.local.as_ref(), &sample_address, e))
            });

        match result {
            Ok(path) => debug!("local sample of {rows} rows written: {path}"),
            Err(e) => error!("failed to write local sample {sample_address}: {e}"),
        }
    }

    /// Write `batch` as `{prefix}_{timestamp}.parquet` stamped with the current time.
    pub fn write_dataset(
        &self,
        batch: RecordBatch,
        layer: Layer,
        prefix: &str,
    ) -> Result<WriteOutcome, GatewayError> {
        self.write_dataset_at(batch, layer, prefix, Utc::now())
    }

    /// Write `batch` as `{prefix}_{timestamp}.parquet` stamped with `at`.
    pub fn write_dataset_at(
        &self,
        batch: RecordBatch,
        layer: Layer,
        prefix: &str,
        at: DateTime<Utc>,
    ) -> Result<WriteOutcome, GatewayError> {
        validate_prefix(prefix)?;
        let filename = timestamped_filename(prefix, at);
        let path = self.write(&batch, layer, &filename)?;

        let landed_on = if path.is_local() {
            BackendKind::Local
        } else {
            BackendKind::Adls
        };
        let metadata = DatasetMetadata::from_batch(&batch, landed_on);
        info!("dataset written: {path}");

        Ok(WriteOutcome {
            path,
            batch,
            metadata,
        })
    }

    /// Filename of the latest dataset in `layer` matching `prefix`.
    pub fn latest_filename(&self, layer: Layer, prefix: &str) -> Result<String, GatewayError> {
        validate_prefix(prefix)?;
        self.with_read_fallback(|store| Self::latest_in(store, layer, prefix))
    }

    /// Read the latest dataset in `layer` whose filename starts with `prefix`.
    ///
    /// Absence is always an error, never an empty batch.
    pub fn read_latest(&self, layer: Layer, prefix: &str) -> Result<RecordBatch, GatewayError> {
        self.read_latest_with_name(layer, prefix)
            .map(|latest| latest.batch)
    }

    /// Like [`read_latest`](Self::read_latest), also reporting which file
    /// was resolved and which backend served it.
    pub fn read_latest_with_name(
        &self,
        layer: Layer,
        prefix: &str,
    ) -> Result<LatestDataset, GatewayError> {
        validate_prefix(prefix)?;
        info!(
            "reading latest dataset from {layer} with prefix '{prefix}' using {} backend",
            self.config.backend
        );

        self.with_read_fallback(|store| {
            let filename = Self::latest_in(store, layer, prefix)?;
            let address = DatasetAddress::new(layer, filename)?;
            let data = store
                .get(&address)
                .map_err(|e| store_error(store, &address, e))?;
            let batch = decode_parquet(data)?;
            info!("read {} rows from {address}", batch.num_rows());
            Ok(LatestDataset {
                filename: address.filename,
                backend: store.backend(),
                batch,
            })
        })
    }

    fn latest_in(store: &dyn LayerStore, layer: Layer, prefix: &str) -> Result<String, GatewayError> {
        let names = store.list(layer).map_err(|e| match store.backend() {
            BackendKind::Adls => GatewayError::Remote(e),
            BackendKind::Local => GatewayError::Local(e),
        })?;

        let latest = latest_matching(names.iter().map(String::as_str), prefix)
            .ok_or_else(|| GatewayError::NotFound {
                layer,
                prefix: prefix.to_string(),
            })?;
        debug!("found latest file: {layer}/{latest}");
        Ok(latest.to_string())
    }

    /// Run a read against the primary store, retrying locally on remote
    /// failure when fallback is enabled. Absence is never retried.
    fn with_read_fallback<T, F>(&self, read: F) -> Result<T, GatewayError>
    where
        F: Fn(&dyn LayerStore) -> Result<T, GatewayError>,
    {
        match read(self.primary()?) {
            Err(GatewayError::Remote(cause)) if self.config.fallback_to_local => {
                warn!("remote read failed, falling back to local storage: {cause}");
                read(self.local.as_ref())
            }
            result => result,
        }
    }
}
