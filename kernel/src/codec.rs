// Parquet Codec
//
// Serializes Arrow record batches to Parquet bytes and back.
// Backends only ever see opaque bytes.

use arrow::compute::concat_batches;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::errors::ParquetError;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

/// Encode a batch as a complete Parquet file.
pub fn encode_parquet(batch: &RecordBatch) -> Result<Vec<u8>, CodecError> {
    let mut writer = ArrowWriter::try_new(Vec::new(), batch.schema(), None)?;
    writer.write(batch)?;
    Ok(writer.into_inner()?)
}

/// Decode a Parquet file into a single batch.
///
/// Row groups are concatenated in file order.
pub fn decode_parquet(data: impl Into<Bytes>) -> Result<RecordBatch, CodecError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(data.into())?;
    let schema = builder.schema().clone();
    let batches = builder
        .build()?
        .collect::<Result<Vec<_>, ArrowError>>()?;

    Ok(concat_batches(&schema, &batches)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn orders() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("order_id", DataType::Int64, false),
            Field::new("status", DataType::Utf8, true),
            Field::new("total_amount", DataType::Float64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![10000, 10001, 10002])),
                Arc::new(StringArray::from(vec![Some("placed"), None, Some("shipped")])),
                Arc::new(Float64Array::from(vec![25.5, 99.0, 310.25])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn decoded_batch_matches_input() {
        let batch = orders();
        let bytes = encode_parquet(&batch).unwrap();
        let decoded = decode_parquet(Bytes::from(bytes)).unwrap();

        assert_eq!(decoded.num_rows(), 3);
        let names: Vec<String> = decoded
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, vec!["order_id", "status", "total_amount"]);
        assert_eq!(decoded.columns(), batch.columns());
    }

    #[test]
    fn empty_batch_keeps_schema() {
        let batch = orders().slice(0, 0);
        let decoded = decode_parquet(Bytes::from(encode_parquet(&batch).unwrap())).unwrap();

        assert_eq!(decoded.num_rows(), 0);
        assert_eq!(decoded.num_columns(), 3);
    }

    #[test]
    fn garbage_is_rejected() {
        let err = decode_parquet(Bytes::from_static(b"not a parquet file")).unwrap_err();
        assert!(matches!(err, CodecError::Parquet(_)));
    }
}
