// src/transform/pivot.rs

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fmt,
    str::FromStr,
    sync::Arc,
};
use tracing::debug;

use crate::error::{Result, TransformError};
use crate::labels::title_case_column;
use crate::table::{column, date_column, float_column, to_date, DEFAULT_DATE_FIELD};

/// Header level holding the month label of each pivot column.
pub const PERIOD_HEADER: &str = "Date";
/// Separator between header levels in a flattened pivot column name.
pub const HEADER_SEPARATOR: &str = " | ";

/// How many periods a pivot keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWindow", into = "RawWindow")]
pub enum PivotWindow {
    /// The N most recent distinct periods.
    Last(usize),
    All,
}

impl Default for PivotWindow {
    fn default() -> Self {
        PivotWindow::Last(6)
    }
}

impl FromStr for PivotWindow {
    type Err = TransformError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(PivotWindow::All);
        }
        match s.parse::<usize>() {
            Ok(n) if n > 0 => Ok(PivotWindow::Last(n)),
            _ => Err(TransformError::InvalidWindow(s.to_string())),
        }
    }
}

impl fmt::Display for PivotWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PivotWindow::Last(n) => write!(f, "{}", n),
            PivotWindow::All => f.write_str("all"),
        }
    }
}

/// Serialized form of [`PivotWindow`]: either a count or the word "all".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawWindow {
    Count(usize),
    Word(String),
}

impl TryFrom<RawWindow> for PivotWindow {
    type Error = TransformError;

    fn try_from(raw: RawWindow) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawWindow::Count(0) => Err(TransformError::InvalidWindow("0".into())),
            RawWindow::Count(n) => Ok(PivotWindow::Last(n)),
            RawWindow::Word(w) => w.parse(),
        }
    }
}

impl From<PivotWindow> for RawWindow {
    fn from(w: PivotWindow) -> Self {
        match w {
            PivotWindow::Last(n) => RawWindow::Count(n),
            PivotWindow::All => RawWindow::Word("all".into()),
        }
    }
}

/// Arguments for [`pivot_percent_change`].
#[derive(Debug, Clone)]
pub struct PivotSpec<'a> {
    pub index_col: &'a str,
    pub value_col: &'a str,
    pub date_col: &'a str,
    pub window: PivotWindow,
    pub extra_cols: &'a [&'a str],
}

impl<'a> PivotSpec<'a> {
    pub fn new(index_col: &'a str) -> Self {
        Self {
            index_col,
            value_col: "pct_chg_value",
            date_col: DEFAULT_DATE_FIELD,
            window: PivotWindow::default(),
            extra_cols: &[],
        }
    }

    pub fn value_col(mut self, value_col: &'a str) -> Self {
        self.value_col = value_col;
        self
    }

    pub fn date_col(mut self, date_col: &'a str) -> Self {
        self.date_col = date_col;
        self
    }

    pub fn window(mut self, window: PivotWindow) -> Self {
        self.window = window;
        self
    }

    pub fn extra_cols(mut self, extra_cols: &'a [&'a str]) -> Self {
        self.extra_cols = extra_cols;
        self
    }
}

/// Month-year label used as pivot column header, e.g. `Mar 2024`.
pub fn period_label(date: NaiveDate) -> String {
    date.format("%b %Y").to_string()
}

/// Cross-tabulate a percent-change table for display.
///
/// Rows are the distinct `index_col` values; columns are the selected month
/// labels, optionally split further by `extra_cols`. `Last(n)` keeps the n
/// most recent distinct labels counted from the end of the table, so the input
/// is expected in ascending date order; asking for more periods than exist
/// keeps them all. Duplicate cells are averaged. Rows and columns appear in
/// first-seen order, and cells with no observation are null.
///
/// The index column is renamed to its title-cased form. Each value column is
/// named by its header levels joined with `" | "` and carries the levels as
/// field metadata (`Date` plus the title-cased extra column names).
pub fn pivot_percent_change(table: &RecordBatch, spec: &PivotSpec<'_>) -> Result<RecordBatch> {
    if spec.window == PivotWindow::Last(0) {
        return Err(TransformError::InvalidWindow("0".into()));
    }
    let dates = date_column(table, spec.date_col)?;
    let values = float_column(table, spec.value_col)?;
    let index = utf8(table, spec.index_col)?;
    let index = as_strings(&index);
    let extras: Vec<ArrayRef> = spec
        .extra_cols
        .iter()
        .map(|name| utf8(table, name))
        .collect::<Result<_>>()?;
    let extras: Vec<&StringArray> = extras.iter().map(as_strings).collect();

    let labels: Vec<Option<String>> = dates
        .iter()
        .map(|d| d.map(|d| period_label(to_date(d))))
        .collect();
    let selected = select_periods(&labels, spec.window);

    let mut row_names: Vec<String> = Vec::new();
    let mut row_slot: HashMap<String, usize> = HashMap::new();
    let mut headers: Vec<Vec<String>> = Vec::new();
    let mut col_slot: HashMap<Vec<String>, usize> = HashMap::new();
    let mut cells: HashMap<(usize, usize), (f64, usize)> = HashMap::new();

    'rows: for row in 0..table.num_rows() {
        let Some(label) = labels[row].as_deref() else {
            continue;
        };
        if !selected.contains(label) || index.is_null(row) || values.is_null(row) {
            continue;
        }
        let mut header = Vec::with_capacity(1 + extras.len());
        header.push(label.to_string());
        for extra in &extras {
            if extra.is_null(row) {
                continue 'rows;
            }
            header.push(extra.value(row).to_string());
        }

        let name = index.value(row);
        let r = match row_slot.get(name) {
            Some(&r) => r,
            None => {
                row_names.push(name.to_string());
                row_slot.insert(name.to_string(), row_names.len() - 1);
                row_names.len() - 1
            }
        };
        let c = match col_slot.get(&header) {
            Some(&c) => c,
            None => {
                headers.push(header.clone());
                col_slot.insert(header, headers.len() - 1);
                headers.len() - 1
            }
        };
        let cell = cells.entry((r, c)).or_insert((0.0, 0));
        cell.0 += values.value(row);
        cell.1 += 1;
    }
    debug!(
        window = %spec.window,
        periods = selected.len(),
        rows = row_names.len(),
        columns = headers.len(),
        "pivot"
    );

    let level_names: Vec<String> = std::iter::once(PERIOD_HEADER.to_string())
        .chain(spec.extra_cols.iter().map(|c| title_case_column(c)))
        .collect();

    let mut fields = vec![Field::new(title_case_column(spec.index_col), DataType::Utf8, false)];
    let mut columns: Vec<ArrayRef> = vec![Arc::new(StringArray::from(row_names.clone()))];
    for (c, header) in headers.iter().enumerate() {
        let metadata: HashMap<String, String> = level_names
            .iter()
            .cloned()
            .zip(header.iter().cloned())
            .collect();
        fields.push(
            Field::new(header.join(HEADER_SEPARATOR), DataType::Float64, true)
                .with_metadata(metadata),
        );
        let cell_values: Float64Array = (0..row_names.len())
            .map(|r| cells.get(&(r, c)).map(|&(sum, n)| sum / n as f64))
            .collect();
        columns.push(Arc::new(cell_values));
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Which period labels survive the window.
fn select_periods(labels: &[Option<String>], window: PivotWindow) -> HashSet<&str> {
    match window {
        PivotWindow::All => labels.iter().flatten().map(String::as_str).collect(),
        PivotWindow::Last(n) => {
            let mut picked = HashSet::with_capacity(n);
            for label in labels.iter().rev().flatten() {
                if picked.contains(label.as_str()) {
                    continue;
                }
                if picked.len() == n {
                    break;
                }
                picked.insert(label.as_str());
            }
            picked
        }
    }
}

fn utf8(table: &RecordBatch, name: &str) -> Result<ArrayRef> {
    Ok(cast(column(table, name)?.as_ref(), &DataType::Utf8)?)
}

fn as_strings(array: &ArrayRef) -> &StringArray {
    array.as_string::<i32>()
}
