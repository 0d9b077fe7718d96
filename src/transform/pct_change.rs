// src/transform/pct_change.rs

use arrow::array::{Array, Date32Array, Float64Array, Int64Array};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;
use tracing::debug;

use super::dates::{date_range, months_before};
use super::select::tail_per_group;
use crate::error::{Result, TransformError};
use crate::table::{float_column, from_date, group_keys, partition, replace_column, take_rows, with_column};

pub const VS_DATE_FIELD: &str = "vs_date";
pub const LAG_FIELD: &str = "lag";

/// Name of the change column derived from `value_field`: `value` → `pct_chg_value`.
pub fn pct_change_column(value_field: &str) -> String {
    format!("pct_chg_{}", value_field)
}

/// Percent change of `value_field` against the row `periods` positions
/// earlier within the same group (later, for a negative lag).
///
/// The table must already be ordered by date within each group; nothing is
/// re-sorted here. Rows without a predecessor at that distance, rows with a
/// null key or value, and 0/0 results are dropped, so the output column is
/// never null. Surviving rows keep their input order.
pub fn grouped_percent_change(
    table: &RecordBatch,
    group_by: &[&str],
    periods: i64,
    value_field: &str,
) -> Result<RecordBatch> {
    if periods == 0 {
        return Err(TransformError::InvalidPeriods);
    }
    let values = float_column(table, value_field)?;
    let keys = group_keys(table, group_by)?;

    let mut kept: Vec<(usize, f64)> = Vec::new();
    for (_, rows) in partition(&keys) {
        let len = rows.len() as i64;
        for (pos, &row) in rows.iter().enumerate() {
            let Some(base) = (pos as i64).checked_sub(periods) else {
                continue;
            };
            if base < 0 || base >= len {
                continue;
            }
            let prev_row = rows[base as usize];
            if values.is_null(row) || values.is_null(prev_row) {
                continue;
            }
            let prev = values.value(prev_row);
            let change = (values.value(row) - prev) / prev;
            if change.is_nan() {
                continue;
            }
            kept.push((row, change));
        }
    }
    kept.sort_unstable_by_key(|&(row, _)| row);
    debug!(
        periods,
        rows_in = table.num_rows(),
        rows_out = kept.len(),
        "grouped percent change"
    );

    let rows: Vec<usize> = kept.iter().map(|&(row, _)| row).collect();
    let changes = Float64Array::from_iter_values(kept.into_iter().map(|(_, c)| c));
    let selected = take_rows(table, &rows)?;
    with_column(
        &selected,
        Field::new(pct_change_column(value_field), DataType::Float64, false),
        Arc::new(changes),
    )
}

/// Latest percent change per group for each lag in `periods_list`.
///
/// Each lag contributes at most one row per group: the group's most recent
/// computable change, rounded to 4 decimals, tagged with `lag` and with
/// `vs_date` = latest table date minus `lag` months. Results are concatenated
/// in `periods_list` order. Groups too short for a lag are left out.
pub fn latest_percent_change_by_lag(
    table: &RecordBatch,
    periods_list: &[i64],
    group_by: &[&str],
    value_field: &str,
    date_field: &str,
) -> Result<RecordBatch> {
    let latest = match date_range(table, date_field) {
        Ok(range) => range.max,
        Err(TransformError::EmptyInput { .. }) => {
            return Err(TransformError::EmptyInput {
                operation: "latest_percent_change_by_lag",
            })
        }
        Err(e) => return Err(e),
    };
    let pct_col = pct_change_column(value_field);

    let mut parts = Vec::with_capacity(periods_list.len());
    for &lag in periods_list {
        let changes = grouped_percent_change(table, group_by, lag, value_field)?;
        let last = tail_per_group(&changes, group_by, 1)?;

        let rounded: Float64Array = float_column(&last, &pct_col)?.unary(round4);
        let last = replace_column(&last, &pct_col, Arc::new(rounded))?;

        let vs_date = months_before(latest, lag).ok_or(TransformError::InvalidPeriods)?;
        let n = last.num_rows();
        let last = with_column(
            &last,
            Field::new(VS_DATE_FIELD, DataType::Date32, false),
            Arc::new(Date32Array::from(vec![from_date(vs_date); n])),
        )?;
        let last = with_column(
            &last,
            Field::new(LAG_FIELD, DataType::Int64, false),
            Arc::new(Int64Array::from(vec![lag; n])),
        )?;
        debug!(lag, groups = n, %vs_date, "latest change");
        parts.push(last);
    }

    let schema = latest_schema(table, &pct_col);
    Ok(concat_batches(&schema, &parts)?)
}

fn latest_schema(table: &RecordBatch, pct_col: &str) -> Arc<Schema> {
    let input = table.schema();
    let mut fields: Vec<Field> = input.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(Field::new(pct_col, DataType::Float64, false));
    fields.push(Field::new(VS_DATE_FIELD, DataType::Date32, false));
    fields.push(Field::new(LAG_FIELD, DataType::Int64, false));
    Arc::new(Schema::new_with_metadata(fields, input.metadata().clone()))
}

/// Round to 4 decimal places.
pub(crate) fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
