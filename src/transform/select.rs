// src/transform/select.rs

use arrow::array::{Array, BooleanArray, StringArray};
use arrow::compute::filter_record_batch;
use arrow::record_batch::RecordBatch;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::table::{date_column, group_keys, partition, replace_column, string_column, take_rows};

/// Keep rows whose `column` value is one of `labels`. An empty list keeps
/// the whole table.
pub fn subset_series<S: AsRef<str>>(
    table: &RecordBatch,
    column: &str,
    labels: &[S],
) -> Result<RecordBatch> {
    if labels.is_empty() {
        return Ok(table.clone());
    }
    let col = string_column(table, column)?;
    let wanted: HashSet<&str> = labels.iter().map(AsRef::as_ref).collect();
    let mask: BooleanArray = col
        .iter()
        .map(|v| Some(v.is_some_and(|s| wanted.contains(s))))
        .collect();
    Ok(filter_record_batch(table, &mask)?)
}

/// Last `n` rows of every group, returned in table order.
pub fn tail_per_group(table: &RecordBatch, group_by: &[&str], n: usize) -> Result<RecordBatch> {
    let keys = group_keys(table, group_by)?;
    let mut rows: Vec<usize> = partition(&keys)
        .into_iter()
        .flat_map(|(_, rows)| {
            let skip = rows.len().saturating_sub(n);
            rows.into_iter().skip(skip)
        })
        .collect();
    rows.sort_unstable();
    take_rows(table, &rows)
}

/// Map every label in a string column through `rename`.
pub fn relabel<F>(table: &RecordBatch, column: &str, rename: F) -> Result<RecordBatch>
where
    F: Fn(&str) -> String,
{
    let mapped: StringArray = string_column(table, column)?
        .iter()
        .map(|v| v.map(&rename))
        .collect();
    replace_column(table, column, Arc::new(mapped))
}

/// Order rows by date within each series, series kept in order of first
/// appearance. Stable, so rows sharing a date keep their relative order;
/// null dates go last.
pub fn sort_long_table(table: &RecordBatch, series_col: &str, date_col: &str) -> Result<RecordBatch> {
    let dates = date_column(table, date_col)?;
    let keys = group_keys(table, &[series_col])?;
    let mut rows = Vec::with_capacity(table.num_rows());
    for (_, mut group) in partition(&keys) {
        group.sort_by_key(|&r| (dates.is_null(r), dates.is_valid(r).then(|| dates.value(r))));
        rows.extend(group);
    }
    take_rows(table, &rows)
}
