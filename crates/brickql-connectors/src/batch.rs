//! Convert resolved row values to Arrow record batches.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
    TimestampSecondArray,
};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatchOptions;
use datafusion::error::{DataFusionError, Result as DFResult};
use serde_json::Value;

use crate::column::{
    to_bool_value, to_double_value, to_int_value, to_json_value, to_string_value,
    to_timestamp_value, ColumnDef, ColumnType,
};

/// Build one column array from the values of that column across rows.
fn column_to_array(column: &ColumnDef, values: &[&Value]) -> ArrayRef {
    match column.ty {
        ColumnType::String => Arc::new(StringArray::from(
            values.iter().map(|v| to_string_value(v)).collect::<Vec<_>>(),
        )),
        ColumnType::Json => Arc::new(StringArray::from(
            values.iter().map(|v| to_json_value(v)).collect::<Vec<_>>(),
        )),
        ColumnType::Bool => Arc::new(BooleanArray::from(
            values.iter().map(|v| to_bool_value(v)).collect::<Vec<_>>(),
        )),
        ColumnType::Int => Arc::new(Int64Array::from(
            values.iter().map(|v| to_int_value(v)).collect::<Vec<_>>(),
        )),
        ColumnType::Double => Arc::new(Float64Array::from(
            values.iter().map(|v| to_double_value(v)).collect::<Vec<_>>(),
        )),
        ColumnType::Timestamp => Arc::new(
            TimestampSecondArray::from(
                values.iter().map(|v| to_timestamp_value(v)).collect::<Vec<_>>(),
            )
            .with_timezone("UTC"),
        ),
    }
}

/// Turn rows of resolved values (one `Vec` per row, ordered like `columns`)
/// into a batch with `schema`.
pub fn rows_to_record_batch(
    schema: SchemaRef,
    columns: &[ColumnDef],
    rows: &[Vec<Value>],
) -> DFResult<RecordBatch> {
    if schema.fields().len() != columns.len() {
        return Err(DataFusionError::Internal(format!(
            "schema has {} fields but {} columns were resolved",
            schema.fields().len(),
            columns.len()
        )));
    }

    if columns.is_empty() {
        // projection with no columns, e.g. COUNT(*)
        let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
        return Ok(RecordBatch::try_new_with_options(schema, vec![], &options)?);
    }

    let arrays: Vec<ArrayRef> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let values: Vec<&Value> = rows.iter().map(|row| &row[i]).collect();
            column_to_array(column, &values)
        })
        .collect();

    Ok(RecordBatch::try_new(schema, arrays)?)
}
