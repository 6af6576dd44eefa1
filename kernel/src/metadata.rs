// Dataset Metadata
//
// Describes a written dataset for orchestration: shape, column
// types and a small markdown preview.

use std::collections::BTreeMap;

use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use serde::{Deserialize, Serialize};

use crate::config::BackendKind;
use crate::storage::StoragePath;

/// Rows included in a preview unless the caller says otherwise.
pub const DEFAULT_PREVIEW_ROWS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<String>,
    pub column_types: BTreeMap<String, String>,
    pub storage_backend: BackendKind,
}

impl DatasetMetadata {
    pub fn from_batch(batch: &RecordBatch, storage_backend: BackendKind) -> Self {
        let schema = batch.schema();
        let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        let column_types = schema
            .fields()
            .iter()
            .map(|f| (f.name().clone(), f.data_type().to_string()))
            .collect();

        Self {
            row_count: batch.num_rows(),
            column_count: columns.len(),
            columns,
            column_types,
            storage_backend,
        }
    }
}

/// Result of writing a dataset: where it went, what was written and
/// a description of it.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub path: StoragePath,
    pub batch: RecordBatch,
    pub metadata: DatasetMetadata,
}

/// Serializable summary handed to an orchestrator for a written asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetOutput {
    pub file_path: String,
    pub metadata: DatasetMetadata,
    pub preview: String,
}

impl AssetOutput {
    pub fn from_write(outcome: &WriteOutcome, preview_rows: usize) -> Result<Self, ArrowError> {
        Ok(Self {
            file_path: outcome.path.to_string(),
            metadata: outcome.metadata.clone(),
            preview: preview_markdown(&outcome.batch, preview_rows)?,
        })
    }
}

/// Render the first `rows` rows of a batch as a markdown table.
pub fn preview_markdown(batch: &RecordBatch, rows: usize) -> Result<String, ArrowError> {
    let schema = batch.schema();
    let headers: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();

    let mut lines = Vec::with_capacity(rows + 2);
    lines.push(format!("| {} |", headers.join(" | ")));
    lines.push(format!("| {} |", vec!["---"; headers.len()].join(" | ")));

    let options = FormatOptions::default().with_null("null");
    let formatters = batch
        .columns()
        .iter()
        .map(|column| ArrayFormatter::try_new(column.as_ref(), &options))
        .collect::<Result<Vec<_>, _>>()?;

    for row in 0..rows.min(batch.num_rows()) {
        let cells: Vec<String> = formatters
            .iter()
            .map(|formatter| formatter.value(row).to_string())
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn customers() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("customer_id", DataType::Int64, false),
            Field::new("segment", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec![Some("retail"), None, Some("fleet")])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn metadata_describes_batch() {
        let meta = DatasetMetadata::from_batch(&customers(), BackendKind::Local);

        assert_eq!(meta.row_count, 3);
        assert_eq!(meta.column_count, 2);
        assert_eq!(meta.columns, vec!["customer_id", "segment"]);
        assert_eq!(meta.column_types["customer_id"], "Int64");
        assert_eq!(meta.column_types["segment"], "Utf8");
    }

    #[test]
    fn preview_is_a_markdown_table() {
        let preview = preview_markdown(&customers(), 2).unwrap();
        assert_eq!(
            preview,
            "| customer_id | segment |\n| --- | --- |\n| 1 | retail |\n| 2 | null |"
        );
    }

    #[test]
    fn asset_output_carries_path_and_preview() {
        let batch = customers();
        let outcome = WriteOutcome {
            path: StoragePath::Local("data/silver/c.parquet".into()),
            metadata: DatasetMetadata::from_batch(&batch, BackendKind::Local),
            batch,
        };

        let output = AssetOutput::from_write(&outcome, DEFAULT_PREVIEW_ROWS).unwrap();
        assert_eq!(output.file_path, "data/silver/c.parquet");
        assert_eq!(output.preview.lines().count(), 5);

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["metadata"]["storage_backend"], "local");
    }
}
