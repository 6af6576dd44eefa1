// Medallion Kernel
//
// Storage gateway for bronze/silver/gold datasets on a local
// filesystem or Azure Data Lake Storage Gen2.

pub mod codec;
pub mod config;
pub mod gateway;
pub mod layer;
pub mod metadata;
pub mod storage;
pub mod timing;
pub mod validate;

pub use config::{BackendKind, StorageConfig};
pub use gateway::{GatewayError, LatestDataset, StorageGateway};
pub use layer::{DatasetAddress, Layer};
pub use storage::StoragePath;
