// src/report/mod.rs
//
// What each dashboard page shows, built from the transforms. Renderers take
// these tables as they are.

use arrow::array::{Int64Array, StringArray};
use arrow::compute::{concat_batches, lexsort_to_indices, take_record_batch, SortColumn};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{DashboardConfig, PageConfig};
use crate::error::{Result, TransformError};
use crate::table::{
    column, date_column, float_column, to_date, with_column, DEFAULT_DATE_FIELD,
    DEFAULT_VALUE_FIELD,
};
use crate::transform::{
    date_range, grouped_percent_change, latest_percent_change_by_lag, pct_change_column,
    pct_change::round4, pivot_percent_change, subset_series, tail_per_group, DateRange,
    PivotSpec, LAG_FIELD,
};

/// Label column of the comparison table.
pub const GROUP_FIELD: &str = "group";

/// Latest change of one series at one lag, and how it moved since the
/// previous print.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadlineMetric {
    pub series: String,
    pub lag: i64,
    pub date: NaiveDate,
    pub value: f64,
    pub delta: f64,
}

/// Headline figure for `series` at `periods`. `None` when the series has fewer
/// than two computable changes.
pub fn headline(
    table: &RecordBatch,
    series_col: &str,
    series: &str,
    periods: i64,
) -> Result<Option<HeadlineMetric>> {
    let subset = subset_series(table, series_col, &[series])?;
    let changes = grouped_percent_change(&subset, &[series_col], periods, DEFAULT_VALUE_FIELD)?;
    let last_two = tail_per_group(&changes, &[series_col], 2)?;
    if last_two.num_rows() < 2 {
        debug!(series, periods, "not enough history for headline");
        return Ok(None);
    }

    let pct = float_column(&last_two, &pct_change_column(DEFAULT_VALUE_FIELD))?;
    let dates = date_column(&last_two, DEFAULT_DATE_FIELD)?;
    Ok(Some(HeadlineMetric {
        series: series.to_string(),
        lag: periods,
        date: to_date(dates.value(1)),
        value: pct.value(1),
        delta: round4(pct.value(1) - pct.value(0)),
    }))
}

/// Latest change per series for each lag, labelled `"<lag> Month Percent Change"`
/// and ordered by series then lag. Values are left unrounded for plotting.
pub fn comparison_table(table: &RecordBatch, series_col: &str, lags: &[i64]) -> Result<RecordBatch> {
    let pct_col = pct_change_column(DEFAULT_VALUE_FIELD);
    let mut parts = Vec::with_capacity(lags.len());
    for &lag in lags {
        let changes = grouped_percent_change(table, &[series_col], lag, DEFAULT_VALUE_FIELD)?;
        let last = tail_per_group(&changes, &[series_col], 1)?;
        let n = last.num_rows();
        let last = with_column(
            &last,
            Field::new(LAG_FIELD, DataType::Int64, false),
            Arc::new(Int64Array::from(vec![lag; n])),
        )?;
        let label = format!("{} Month Percent Change", lag);
        let last = with_column(
            &last,
            Field::new(GROUP_FIELD, DataType::Utf8, false),
            Arc::new(StringArray::from(vec![label; n])),
        )?;
        parts.push(last);
    }

    let input = table.schema();
    let mut fields: Vec<Field> = input.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(Field::new(pct_col, DataType::Float64, false));
    fields.push(Field::new(LAG_FIELD, DataType::Int64, false));
    fields.push(Field::new(GROUP_FIELD, DataType::Utf8, false));
    let schema = Arc::new(Schema::new_with_metadata(fields, input.metadata().clone()));
    let combined = concat_batches(&schema, &parts)?;

    let indices = lexsort_to_indices(
        &[
            SortColumn {
                values: column(&combined, series_col)?.clone(),
                options: None,
            },
            SortColumn {
                values: column(&combined, LAG_FIELD)?.clone(),
                options: None,
            },
        ],
        None,
    )?;
    Ok(take_record_batch(&combined, &indices)?)
}

/// Tables behind one dashboard page.
#[derive(Debug, Clone)]
pub struct PageReport {
    pub name: String,
    pub title: String,
    pub dates: DateRange,
    /// One long percent-change table per configured lag.
    pub changes: Vec<(i64, RecordBatch)>,
    /// Pivot of the first lag's changes.
    pub pivot: RecordBatch,
}

/// Subset the table to the page's series and compute its line-chart and
/// pivot tables. A page with no matching rows is `EmptyInput`.
pub fn build_page(
    table: &RecordBatch,
    config: &DashboardConfig,
    page: &PageConfig,
) -> Result<PageReport> {
    let series_col = config.series_column.as_str();
    let subset = subset_series(table, series_col, &page.series)?;
    let dates = date_range(&subset, DEFAULT_DATE_FIELD)?;

    let changes = page
        .lags
        .iter()
        .map(|&lag| {
            let t = grouped_percent_change(&subset, &[series_col], lag, DEFAULT_VALUE_FIELD)?;
            Ok((lag, t))
        })
        .collect::<Result<Vec<_>>>()?;
    let (_, first) = changes.first().ok_or(TransformError::InvalidPeriods)?;
    let pivot = pivot_percent_change(
        first,
        &PivotSpec::new(series_col).window(config.pivot_window),
    )?;

    info!(
        page = %page.name,
        rows = subset.num_rows(),
        pivot_columns = pivot.num_columns(),
        "built page"
    );
    Ok(PageReport {
        name: page.name.clone(),
        title: page.title.clone(),
        dates,
        changes,
        pivot,
    })
}

/// Figures for the landing page.
#[derive(Debug, Clone)]
pub struct Overview {
    pub dates: DateRange,
    pub headlines: Vec<HeadlineMetric>,
    /// Bar-chart input: latest change per series for the comparison lags.
    pub comparison: RecordBatch,
    /// Latest change per series for every configured lag.
    pub latest: RecordBatch,
}

pub fn build_overview(table: &RecordBatch, config: &DashboardConfig) -> Result<Overview> {
    let series_col = config.series_column.as_str();
    let dates = date_range(table, DEFAULT_DATE_FIELD)?;

    let mut headlines = Vec::new();
    for &lag in &config.comparison_lags {
        if let Some(h) = headline(table, series_col, &config.headline_series, lag)? {
            headlines.push(h);
        }
    }
    let comparison = comparison_table(table, series_col, &config.comparison_lags)?;
    let latest = latest_percent_change_by_lag(
        table,
        &config.latest_lags,
        &[series_col],
        DEFAULT_VALUE_FIELD,
        DEFAULT_DATE_FIELD,
    )?;

    Ok(Overview {
        dates,
        headlines,
        comparison,
        latest,
    })
}
