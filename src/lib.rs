pub mod config;
pub mod error;
pub mod labels;
pub mod load;
pub mod report;
pub mod table;
pub mod transform;

pub use error::{Result, TransformError};
pub use transform::{
    date_range, grouped_percent_change, latest_percent_change_by_lag, nearest_prior_date,
    pivot_percent_change, DateRange, PivotSpec, PivotWindow,
};
