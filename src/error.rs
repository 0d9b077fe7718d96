// src/error.rs

use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by the table transforms.
///
/// A group that is too short for a requested lag is not an error: it simply
/// contributes no rows.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("`{operation}` needs at least one row")]
    EmptyInput { operation: &'static str },

    #[error("no date in `{column}` falls before {reference}")]
    NoPriorDate { column: String, reference: NaiveDate },

    #[error("column `{0}` not found")]
    MissingColumn(String),

    #[error("column `{column}` is {actual}, expected {expected}")]
    ColumnType {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("lag must be nonzero")]
    InvalidPeriods,

    #[error("pivot window must be a positive count or \"all\", got `{0}`")]
    InvalidWindow(String),

    #[error("at least one group column is required")]
    NoGroupColumns,

    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

pub type Result<T> = std::result::Result<T, TransformError>;
