// Medallion Layers & Dataset Addressing
//
// Every dataset lives in exactly one of three fixed layers and is
// addressed by `(layer, filename)`. Filenames carry a UTC timestamp
// so that lexicographic order equals write order.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp suffix format used in dataset filenames.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Extension of every persisted dataset.
pub const PARQUET_EXTENSION: &str = ".parquet";

/// Prefix given to local debug samples written alongside remote datasets.
pub const SAMPLE_PREFIX: &str = "sample_";

/// Data layer of the medallion architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Raw extracted data.
    Bronze,

    /// Cleaned and conformed data.
    Silver,

    /// Aggregated, consumer-facing data.
    Gold,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Bronze, Layer::Silver, Layer::Gold];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Bronze => "bronze",
            Layer::Silver => "silver",
            Layer::Gold => "gold",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LayerError {
    #[error("unknown layer `{0}`: must be one of bronze, silver, gold")]
    Unknown(String),
}

impl FromStr for Layer {
    type Err = LayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bronze" => Ok(Layer::Bronze),
            "silver" => Ok(Layer::Silver),
            "gold" => Ok(Layer::Gold),
            _ => Err(LayerError::Unknown(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("filename must be a non-empty string")]
    EmptyFilename,

    #[error("filename `{0}` must not contain path separators")]
    PathSeparator(String),

    #[error("filename `{0}` is not a valid dataset name")]
    Reserved(String),

    #[error("prefix must be a non-empty string")]
    EmptyPrefix,
}

/// Logical address of a single dataset version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetAddress {
    pub layer: Layer,
    pub filename: String,
}

impl DatasetAddress {
    pub fn new(layer: Layer, filename: impl Into<String>) -> Result<Self, AddressError> {
        let filename = filename.into();
        validate_filename(&filename)?;
        Ok(Self { layer, filename })
    }

    /// Relative `{layer}/{filename}` key shared by every backend.
    pub fn key(&self) -> String {
        format!("{}/{}", self.layer, self.filename)
    }

    /// Address of the local debug sample for this dataset.
    pub fn sample(&self) -> DatasetAddress {
        DatasetAddress {
            layer: self.layer,
            filename: format!("{SAMPLE_PREFIX}{}", self.filename),
        }
    }
}

impl fmt::Display for DatasetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.layer, self.filename)
    }
}

pub fn validate_filename(filename: &str) -> Result<(), AddressError> {
    if filename.trim().is_empty() {
        return Err(AddressError::EmptyFilename);
    }
    if filename.contains('/') || filename.contains('\\') {
        return Err(AddressError::PathSeparator(filename.to_string()));
    }
    if filename == "." || filename == ".." {
        return Err(AddressError::Reserved(filename.to_string()));
    }
    Ok(())
}

pub fn validate_prefix(prefix: &str) -> Result<(), AddressError> {
    if prefix.is_empty() {
        return Err(AddressError::EmptyPrefix);
    }
    if prefix.contains('/') || prefix.contains('\\') {
        return Err(AddressError::PathSeparator(prefix.to_string()));
    }
    Ok(())
}

/// Build `{prefix}_{YYYYMMDDThhmmssZ}.parquet` for a write at `at`.
pub fn timestamped_filename(prefix: &str, at: DateTime<Utc>) -> String {
    format!(
        "{prefix}_{}{PARQUET_EXTENSION}",
        at.format(TIMESTAMP_FORMAT)
    )
}

/// Pick the latest dataset among `names` matching `prefix`.
///
/// Only `.parquet` files count. Ordering is plain string ordering,
/// which matches write order for timestamped names.
pub fn latest_matching<'a, I>(names: I, prefix: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .filter(|name| name.starts_with(prefix) && name.ends_with(PARQUET_EXTENSION))
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_layers_case_insensitively() {
        assert_eq!("bronze".parse::<Layer>().unwrap(), Layer::Bronze);
        assert_eq!("Silver".parse::<Layer>().unwrap(), Layer::Silver);
        assert_eq!(" GOLD ".parse::<Layer>().unwrap(), Layer::Gold);
    }

    #[test]
    fn unknown_layer_is_rejected() {
        let err = "platinum".parse::<Layer>().unwrap_err();
        assert_eq!(err, LayerError::Unknown("platinum".into()));
    }

    #[test]
    fn layer_serializes_lowercase() {
        let json = serde_json::to_string(&Layer::Silver).unwrap();
        assert_eq!(json, "\"silver\"");
    }

    #[test]
    fn filename_validation() {
        assert!(DatasetAddress::new(Layer::Bronze, "orders.parquet").is_ok());
        assert_eq!(
            DatasetAddress::new(Layer::Bronze, "").unwrap_err(),
            AddressError::EmptyFilename
        );
        assert!(matches!(
            DatasetAddress::new(Layer::Bronze, "../gold/x.parquet").unwrap_err(),
            AddressError::PathSeparator(_)
        ));
        assert!(matches!(
            DatasetAddress::new(Layer::Bronze, "..").unwrap_err(),
            AddressError::Reserved(_)
        ));
    }

    #[test]
    fn sample_address_stays_in_layer() {
        let addr = DatasetAddress::new(Layer::Gold, "summary.parquet").unwrap();
        let sample = addr.sample();
        assert_eq!(sample.layer, Layer::Gold);
        assert_eq!(sample.filename, "sample_summary.parquet");
        assert_eq!(addr.key(), "gold/summary.parquet");
    }

    #[test]
    fn timestamped_filename_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            timestamped_filename("bronze_orders", at),
            "bronze_orders_20240309T070501Z.parquet"
        );
    }

    #[test]
    fn latest_matching_picks_greatest_parquet() {
        let names = [
            "orders_20240101T000000Z.parquet",
            "orders_20240301T000000Z.parquet",
            "orders_20240401T000000Z.csv",
            "customers_20250101T000000Z.parquet",
            "sample_orders_20250101T000000Z.parquet",
        ];
        assert_eq!(
            latest_matching(names.iter().copied(), "orders"),
            Some("orders_20240301T000000Z.parquet")
        );
        assert_eq!(latest_matching(names.iter().copied(), "payments"), None);
    }
}
