// Dataset Validation
//
// Structural checks applied to a batch before downstream logic
// consumes it.

use arrow::record_batch::RecordBatch;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("dataset is empty")]
    Empty,

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// Require at least one row and every column in `required`.
///
/// All missing columns are reported at once.
pub fn validate_batch(batch: &RecordBatch, required: &[&str]) -> Result<(), ValidationError> {
    if batch.num_rows() == 0 {
        return Err(ValidationError::Empty);
    }

    let schema = batch.schema();
    let missing: Vec<String> = required
        .iter()
        .filter(|name| schema.index_of(name).is_err())
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingColumns(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn batch(rows: Vec<i64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("order_id", DataType::Int64, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(rows))]).unwrap()
    }

    #[test]
    fn passes_with_required_columns() {
        assert!(validate_batch(&batch(vec![1, 2]), &["order_id"]).is_ok());
        assert!(validate_batch(&batch(vec![1]), &[]).is_ok());
    }

    #[test]
    fn reports_every_missing_column() {
        let err = validate_batch(&batch(vec![1]), &["order_id", "status", "fetched_at"]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingColumns(vec!["status".into(), "fetched_at".into()])
        );
        assert_eq!(err.to_string(), "missing required columns: status, fetched_at");
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert_eq!(
            validate_batch(&batch(vec![]), &["order_id"]).unwrap_err(),
            ValidationError::Empty
        );
    }
}
