// src/table/arrow.rs

use arrow::array::{Array, ArrayRef, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Date32Type, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use std::sync::Arc;

use crate::error::{Result, TransformError};

pub const DEFAULT_SERIES_FIELD: &str = "cpi_series";
pub const DEFAULT_DATE_FIELD: &str = "date";
pub const DEFAULT_VALUE_FIELD: &str = "value";

/// Long-format observation schema:
/// - `<series_col>` → Utf8
/// - `date`         → Date32
/// - `value`        → Float64 (nullable, missing prints stay null)
pub fn long_schema(series_col: &str) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(series_col, DataType::Utf8, false),
        Field::new(DEFAULT_DATE_FIELD, DataType::Date32, false),
        Field::new(DEFAULT_VALUE_FIELD, DataType::Float64, true),
    ]))
}

/// Look a column up by name.
pub fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| TransformError::MissingColumn(name.to_string()))
}

fn typed_column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    name: &str,
    expected: DataType,
) -> Result<&'a T> {
    let col = column(batch, name)?;
    col.as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| TransformError::ColumnType {
            column: name.to_string(),
            expected,
            actual: col.data_type().clone(),
        })
}

pub fn date_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Date32Array> {
    typed_column(batch, name, DataType::Date32)
}

pub fn float_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    typed_column(batch, name, DataType::Float64)
}

pub fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    typed_column(batch, name, DataType::Int64)
}

pub fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    typed_column(batch, name, DataType::Utf8)
}

pub fn to_date(days: i32) -> NaiveDate {
    Date32Type::to_naive_date(days)
}

pub fn from_date(date: NaiveDate) -> i32 {
    Date32Type::from_naive_date(date)
}

/// Return a copy of `batch` with `array` appended under `field`.
/// Schema metadata is carried over.
pub fn with_column(batch: &RecordBatch, field: Field, array: ArrayRef) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(field);
    let mut columns = batch.columns().to_vec();
    columns.push(array);

    let out = Schema::new_with_metadata(fields, schema.metadata().clone());
    Ok(RecordBatch::try_new(Arc::new(out), columns)?)
}

/// Return a copy of `batch` with the column `name` swapped for `array`.
/// The field definition stays as it was, so `array` must match its type.
pub fn replace_column(batch: &RecordBatch, name: &str, array: ArrayRef) -> Result<RecordBatch> {
    let schema = batch.schema();
    let idx = schema
        .index_of(name)
        .map_err(|_| TransformError::MissingColumn(name.to_string()))?;
    let mut columns = batch.columns().to_vec();
    columns[idx] = array;
    Ok(RecordBatch::try_new(schema, columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordBatch {
        RecordBatch::try_new(
            long_schema("cpi_series"),
            vec![
                Arc::new(StringArray::from(vec!["All items"])),
                Arc::new(Date32Array::from(vec![from_date(
                    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                )])),
                Arc::new(Float64Array::from(vec![Some(308.4)])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_date_roundtrip_through_epoch_days() {
        let d = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        assert_eq!(to_date(from_date(d)), d);
        assert_eq!(from_date(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap()), 1);
    }

    #[test]
    fn test_missing_and_mistyped_columns() {
        let batch = sample();
        assert!(matches!(
            column(&batch, "nope"),
            Err(TransformError::MissingColumn(c)) if c == "nope"
        ));
        match float_column(&batch, "date") {
            Err(TransformError::ColumnType {
                expected, actual, ..
            }) => {
                assert_eq!(expected, DataType::Float64);
                assert_eq!(actual, DataType::Date32);
            }
            other => panic!("unexpected: {:?}", other.map(|a| a.len())),
        }
        assert_eq!(string_column(&batch, "cpi_series").unwrap().value(0), "All items");
    }

    #[test]
    fn test_with_column_appends() {
        let batch = sample();
        let out = with_column(
            &batch,
            Field::new("lag", DataType::Int64, false),
            Arc::new(Int64Array::from(vec![12])),
        )
        .unwrap();
        assert_eq!(out.num_columns(), 4);
        assert_eq!(out.schema().field(3).name(), "lag");
        assert_eq!(int_column(&out, "lag").unwrap().value(0), 12);
    }
}
