// src/load/csv.rs

use anyhow::{anyhow, Context, Result};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use csv::ReaderBuilder;
use std::{
    fs::File,
    io::{BufReader, Read},
    path::PathBuf,
};
use tracing::{debug, info, warn};

use super::SeriesSource;
use crate::table::{LongTableBuilder, DEFAULT_DATE_FIELD, DEFAULT_SERIES_FIELD, DEFAULT_VALUE_FIELD};
use crate::transform::sort_long_table;

/// Provider placeholder for a missing observation.
const MISSING_VALUE: &str = ".";

/// Header names to pick out of a long-format CSV export.
#[derive(Debug, Clone)]
pub struct CsvColumns {
    pub series: String,
    pub date: String,
    pub value: String,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            series: DEFAULT_SERIES_FIELD.to_string(),
            date: DEFAULT_DATE_FIELD.to_string(),
            value: DEFAULT_VALUE_FIELD.to_string(),
        }
    }
}

/// Long-format CSV export on disk.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    columns: CsvColumns,
    rename: Option<fn(&str) -> String>,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            columns: CsvColumns::default(),
            rename: None,
        }
    }

    pub fn series_column(mut self, name: &str) -> Self {
        self.columns.series = name.to_string();
        self
    }

    pub fn columns(mut self, columns: CsvColumns) -> Self {
        self.columns = columns;
        self
    }

    /// Map every series label while loading, e.g. `labels::parse_cpi_series_title`.
    pub fn rename(mut self, rename: fn(&str) -> String) -> Self {
        self.rename = Some(rename);
        self
    }
}

impl SeriesSource for CsvSource {
    fn describe(&self) -> String {
        format!("csv {}", self.path.display())
    }

    #[tracing::instrument(level = "info", skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<RecordBatch> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open CSV file: {:?}", self.path))?;
        read_long_csv(BufReader::new(file), &self.columns, self.rename)
            .with_context(|| format!("Failed to load {:?}", self.path))
    }
}

/// Parse a long-format CSV (header row first) into the observation schema.
///
/// Columns are located by header name, extra columns are ignored. Dates are
/// `YYYY-MM-DD`, anything after the first 10 characters (a time part) is
/// dropped. Empty or `.` values are missing prints and are skipped. The result
/// is ordered by date within each series, series in order of first appearance.
pub fn read_long_csv<R: Read>(
    reader: R,
    columns: &CsvColumns,
    rename: Option<fn(&str) -> String>,
) -> Result<RecordBatch> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("reading CSV header")?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow!("CSV has no `{}` column (found {:?})", name, headers))
    };
    let series_idx = find(&columns.series)?;
    let date_idx = find(&columns.date)?;
    let value_idx = find(&columns.value)?;

    let mut builder = LongTableBuilder::new();
    let mut missing = 0usize;
    for (idx, result) in rdr.records().enumerate() {
        // header is line 1
        let line = idx + 2;
        let record = result.with_context(|| format!("CSV parse error at line {}", line))?;

        let raw_value = record.get(value_idx).unwrap_or("");
        if raw_value.is_empty() || raw_value == MISSING_VALUE {
            missing += 1;
            continue;
        }
        let value: f64 = raw_value
            .parse()
            .with_context(|| format!("bad value {:?} at line {}", raw_value, line))?;

        let raw_date = record.get(date_idx).unwrap_or("");
        let date = parse_date(raw_date)
            .ok_or_else(|| anyhow!("bad date {:?} at line {}", raw_date, line))?;

        let label = record.get(series_idx).unwrap_or("");
        let label = match rename {
            Some(f) => f(label),
            None => label.to_string(),
        };
        builder.push(label, date, Some(value));
    }

    if missing > 0 {
        warn!(missing, "skipped observations without a value");
    }
    debug!(rows = builder.len(), "parsed CSV rows");

    let table = builder.finish(&columns.series)?;
    let table = sort_long_table(&table, &columns.series, DEFAULT_DATE_FIELD)?;
    info!(rows = table.num_rows(), "loaded long table");
    Ok(table)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let day = s.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
