// src/table/rows.rs

use arrow::array::{Array, ArrayRef, AsArray, Date32Array, Float64Array, StringArray, UInt32Array};
use arrow::compute::{cast, take_record_batch};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

use super::arrow::{column, from_date, long_schema};
use crate::error::{Result, TransformError};

/// Composite group key, one string per grouping column.
pub type GroupKey = Vec<String>;

/// Build the group key for every row. Any grouping column is accepted; values
/// are compared by their Utf8 rendering. Rows with a null in any key column
/// get `None` and are left out of every group.
pub fn group_keys(batch: &RecordBatch, group_by: &[&str]) -> Result<Vec<Option<GroupKey>>> {
    if group_by.is_empty() {
        return Err(TransformError::NoGroupColumns);
    }

    let rendered: Vec<ArrayRef> = group_by
        .iter()
        .map(|name| {
            let col = column(batch, name)?;
            Ok(cast(col.as_ref(), &DataType::Utf8)?)
        })
        .collect::<Result<_>>()?;
    let strings: Vec<&StringArray> = rendered
        .iter()
        .map(|a| a.as_string::<i32>())
        .collect();

    let keys = (0..batch.num_rows())
        .map(|row| {
            strings
                .iter()
                .map(|arr| (!arr.is_null(row)).then(|| arr.value(row).to_string()))
                .collect::<Option<GroupKey>>()
        })
        .collect();
    Ok(keys)
}

/// Partition row indices by key, groups in order of first appearance and rows
/// in table order within each group.
pub fn partition(keys: &[Option<GroupKey>]) -> Vec<(GroupKey, Vec<usize>)> {
    let mut slots: HashMap<&GroupKey, usize> = HashMap::new();
    let mut groups: Vec<(GroupKey, Vec<usize>)> = Vec::new();
    for (row, key) in keys.iter().enumerate() {
        let Some(key) = key else { continue };
        let slot = *slots.entry(key).or_insert_with(|| {
            groups.push((key.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(row);
    }
    groups
}

/// Gather `rows` (in the given order) into a new batch.
pub fn take_rows(batch: &RecordBatch, rows: &[usize]) -> Result<RecordBatch> {
    let indices = UInt32Array::from_iter_values(rows.iter().map(|&r| r as u32));
    Ok(take_record_batch(batch, &indices)?)
}

/// Accumulates long-format observations row by row.
#[derive(Debug, Default)]
pub struct LongTableBuilder {
    labels: Vec<String>,
    dates: Vec<i32>,
    values: Vec<Option<f64>>,
}

impl LongTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, date: NaiveDate, value: Option<f64>) {
        self.labels.push(label.into());
        self.dates.push(from_date(date));
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn finish(self, series_col: &str) -> Result<RecordBatch> {
        Ok(RecordBatch::try_new(
            long_schema(series_col),
            vec![
                Arc::new(StringArray::from(self.labels)),
                Arc::new(Date32Array::from(self.dates)),
                Arc::new(Float64Array::from(self.values)),
            ],
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{Field, Schema};

    #[test]
    fn test_partition_keeps_first_appearance_order() {
        let batch = RecordBatch::try_new(
            Arc::new(Schema::new(vec![
                Field::new("s", DataType::Utf8, true),
                Field::new("n", DataType::Int64, false),
            ])),
            vec![
                Arc::new(StringArray::from(vec![
                    Some("b"),
                    Some("a"),
                    None,
                    Some("b"),
                    Some("a"),
                ])),
                Arc::new(Int64Array::from(vec![1, 1, 1, 2, 1])),
            ],
        )
        .unwrap();

        let keys = group_keys(&batch, &["s"]).unwrap();
        assert_eq!(keys[2], None);
        let groups = partition(&keys);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], (vec!["b".to_string()], vec![0, 3]));
        assert_eq!(groups[1], (vec!["a".to_string()], vec![1, 4]));

        // non-string columns group by their rendering
        let composite = partition(&group_keys(&batch, &["s", "n"]).unwrap());
        assert_eq!(composite.len(), 3);
    }

    #[test]
    fn test_group_keys_needs_columns() {
        let batch = LongTableBuilder::new().finish("cpi_series").unwrap();
        assert!(matches!(
            group_keys(&batch, &[]),
            Err(TransformError::NoGroupColumns)
        ));
        assert!(matches!(
            group_keys(&batch, &["missing"]),
            Err(TransformError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_builder_and_take() {
        let mut b = LongTableBuilder::new();
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        b.push("A", d, Some(1.0));
        b.push("B", d, None);
        b.push("C", d, Some(3.0));
        assert_eq!(b.len(), 3);
        let batch = b.finish("cpi_series").unwrap();

        let picked = take_rows(&batch, &[2, 0]).unwrap();
        let labels = picked
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(labels.value(0), "C");
        assert_eq!(labels.value(1), "A");
    }
}
