//! Percent-change and date-alignment transforms over long-format tables.
//!
//! Every function takes a borrowed `RecordBatch` and returns a new one; inputs
//! are never modified.

pub mod dates;
pub mod pct_change;
pub mod pivot;
pub mod select;

pub use dates::{date_range, months_before, nearest_prior_date, DateRange};
pub use pct_change::{
    grouped_percent_change, latest_percent_change_by_lag, pct_change_column, LAG_FIELD,
    VS_DATE_FIELD,
};
pub use pivot::{period_label, pivot_percent_change, PivotSpec, PivotWindow};
pub use select::{relabel, sort_long_table, subset_series, tail_per_group};
