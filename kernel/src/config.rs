// Storage Configuration
//
// Explicitly constructed configuration handed to a gateway at
// construction time. Loaded once from environment-style key/value
// pairs or from a JSON document.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::layer::Layer;

pub const DEFAULT_SAMPLE_SIZE: usize = 50;
pub const DEFAULT_ADLS_BASE_PATH: &str = "dna-platform/data";
pub const DEFAULT_LOCAL_ROOT: &str = "data";

/// Which backend holds canonical data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Adls,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Adls => "adls",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "adls" => Ok(BackendKind::Adls),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unsupported STORAGE_BACKEND `{0}`: must be 'local' or 'adls'")]
    UnknownBackend(String),

    #[error("ADLS backend requires {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    #[error("ADLS backend selected but no remote store is available")]
    NoRemoteStore,
}

/// Credentials and target container for Azure Data Lake Storage Gen2.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdlsCredentials {
    pub account_name: String,
    pub account_key: String,
    pub container: String,
}

impl fmt::Debug for AdlsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdlsCredentials")
            .field("account_name", &self.account_name)
            .field("account_key", &"***")
            .field("container", &self.container)
            .finish()
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub local_root: PathBuf,
    pub adls: Option<AdlsCredentials>,
    pub adls_base_path: String,
    pub sample_size: usize,
    pub disable_local_sample: bool,
    pub fallback_to_local: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            local_root: PathBuf::from(DEFAULT_LOCAL_ROOT),
            adls: None,
            adls_base_path: DEFAULT_ADLS_BASE_PATH.to_string(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            disable_local_sample: false,
            fallback_to_local: false,
        }
    }
}

impl StorageConfig {
    /// Local-only configuration rooted at `root`.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            local_root: root.into(),
            ..Self::default()
        }
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Unset and empty values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match get("STORAGE_BACKEND") {
            Some(raw) => raw.parse::<BackendKind>()?,
            None => BackendKind::Local,
        };

        let account_name = get("ADLS_ACCOUNT_NAME");
        let account_key = get("ADLS_ACCOUNT_KEY");
        let container = get("ADLS_CONTAINER");
        let adls = match (account_name, account_key, container) {
            (None, None, None) => None,
            (name, key, container) => Some(AdlsCredentials {
                account_name: name.unwrap_or_default(),
                account_key: key.unwrap_or_default(),
                container: container.unwrap_or_default(),
            }),
        };

        let adls_base_path = get("ADLS_BASE_PATH")
            .map(|p| p.trim_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_ADLS_BASE_PATH.to_string());

        let sample_size = match get("DUAL_WRITE_SAMPLE_SIZE") {
            Some(raw) => parse_sample_size(&raw),
            None => DEFAULT_SAMPLE_SIZE,
        };

        let config = Self {
            backend,
            local_root: get("LOCAL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_ROOT)),
            adls,
            adls_base_path,
            sample_size,
            disable_local_sample: get("DISABLE_LOCAL_SAMPLE")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            fallback_to_local: get("ADLS_FALLBACK_TO_LOCAL")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        };

        debug!("loaded storage config: backend={}", config.backend);
        Ok(config)
    }

    /// Check that the selected backend has everything it needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == BackendKind::Local {
            return Ok(());
        }

        let mut missing = Vec::new();
        let creds = self.adls.clone().unwrap_or_default();
        if creds.account_name.is_empty() {
            missing.push("ADLS_ACCOUNT_NAME");
        }
        if creds.account_key.is_empty() {
            missing.push("ADLS_ACCOUNT_KEY");
        }
        if creds.container.is_empty() {
            missing.push("ADLS_CONTAINER");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingCredentials(missing))
        }
    }

    /// Base path inside the container, without surrounding slashes.
    pub fn base_path(&self) -> &str {
        self.adls_base_path.trim_matches('/')
    }

    /// Fully qualified `abfss://` URI for a dataset, if ADLS is configured.
    pub fn adls_uri(&self, layer: Layer, filename: &str) -> Option<String> {
        let creds = self.adls.as_ref()?;
        Some(format!(
            "abfss://{}@{}.dfs.core.windows.net/{}",
            creds.container,
            creds.account_name,
            join_key(self.base_path(), layer, filename)
        ))
    }

    /// Copy suitable for display, with the account key masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(creds) = copy.adls.as_mut() {
            if !creds.account_key.is_empty() {
                creds.account_key = "***".to_string();
            }
        }
        copy
    }

    /// Whether a local sample accompanies each remote write.
    pub fn sample_enabled(&self) -> bool {
        !self.disable_local_sample
    }
}

/// `{base}/{layer}/{filename}` with an empty base collapsed.
pub fn join_key(base: &str, layer: Layer, filename: &str) -> String {
    if base.is_empty() {
        format!("{layer}/{filename}")
    } else {
        format!("{base}/{layer}/{filename}")
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn parse_sample_size(raw: &str) -> usize {
    match raw.trim().parse::<i64>() {
        Ok(n) if n >= 0 => n as usize,
        _ => {
            warn!(
                "invalid DUAL_WRITE_SAMPLE_SIZE '{raw}', using default of {DEFAULT_SAMPLE_SIZE}"
            );
            DEFAULT_SAMPLE_SIZE
        }
    }
}
