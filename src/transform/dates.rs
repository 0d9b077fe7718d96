// src/transform/dates.rs

use arrow::compute::{max, min};
use arrow::record_batch::RecordBatch;
use chrono::{Months, NaiveDate};
use serde::Serialize;

use crate::error::{Result, TransformError};
use crate::table::{date_column, from_date, to_date};

/// Earliest and latest date of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

/// Min/max of `date_field`. Null dates are skipped; a table with no dates at
/// all is `EmptyInput`.
pub fn date_range(table: &RecordBatch, date_field: &str) -> Result<DateRange> {
    let dates = date_column(table, date_field)?;
    match (min(dates), max(dates)) {
        (Some(lo), Some(hi)) => Ok(DateRange {
            min: to_date(lo),
            max: to_date(hi),
        }),
        _ => Err(TransformError::EmptyInput {
            operation: "date_range",
        }),
    }
}

/// Walk back from `reference_date` to the closest date strictly before it.
/// An exact match is never returned. Result is `YYYY-MM-DD`.
pub fn nearest_prior_date(
    table: &RecordBatch,
    reference_date: NaiveDate,
    date_col: &str,
) -> Result<String> {
    let cutoff = from_date(reference_date);
    date_column(table, date_col)?
        .iter()
        .flatten()
        .filter(|&d| d < cutoff)
        .max()
        .map(|d| to_date(d).format("%Y-%m-%d").to_string())
        .ok_or_else(|| TransformError::NoPriorDate {
            column: date_col.to_string(),
            reference: reference_date,
        })
}

/// `date` moved back by `lag` calendar months (forward for a negative lag).
/// Day-of-month clamps to the end of shorter months.
pub fn months_before(date: NaiveDate, lag: i64) -> Option<NaiveDate> {
    let months = Months::new(u32::try_from(lag.unsigned_abs()).ok()?);
    if lag >= 0 {
        date.checked_sub_months(months)
    } else {
        date.checked_add_months(months)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::LongTableBuilder;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn table(dates: &[NaiveDate]) -> RecordBatch {
        let mut b = LongTableBuilder::new();
        for d in dates {
            b.push("All items", *d, Some(100.0));
        }
        b.finish("cpi_series").unwrap()
    }

    #[test]
    fn test_date_range() {
        let t = table(&[ymd(2024, 2, 1), ymd(2023, 11, 1), ymd(2024, 3, 1)]);
        let r = date_range(&t, "date").unwrap();
        assert_eq!(r.min, ymd(2023, 11, 1));
        assert_eq!(r.max, ymd(2024, 3, 1));
    }

    #[test]
    fn test_date_range_empty() {
        let t = table(&[]);
        assert!(matches!(
            date_range(&t, "date"),
            Err(TransformError::EmptyInput { .. })
        ));
    }

    #[test]
    fn test_nearest_prior_date_walks_back() {
        let t = table(&[ymd(2024, 1, 1), ymd(2024, 2, 1), ymd(2024, 3, 1)]);
        assert_eq!(
            nearest_prior_date(&t, ymd(2024, 3, 1), "date").unwrap(),
            "2024-02-01"
        );
        assert_eq!(
            nearest_prior_date(&t, ymd(2024, 2, 15), "date").unwrap(),
            "2024-02-01"
        );
        assert_eq!(
            nearest_prior_date(&t, ymd(2030, 1, 1), "date").unwrap(),
            "2024-03-01"
        );
    }

    #[test]
    fn test_nearest_prior_date_never_exact_or_later() {
        let dates = [ymd(2023, 6, 1), ymd(2023, 7, 1), ymd(2023, 8, 1)];
        let t = table(&dates);
        for reference in [ymd(2023, 6, 2), ymd(2023, 7, 1), ymd(2023, 8, 1), ymd(2023, 9, 1)] {
            let found = nearest_prior_date(&t, reference, "date").unwrap();
            let found = NaiveDate::parse_from_str(&found, "%Y-%m-%d").unwrap();
            assert!(found < reference);
            assert!(dates.contains(&found));
        }
    }

    #[test]
    fn test_nearest_prior_date_none_before() {
        let t = table(&[ymd(2024, 1, 1), ymd(2024, 2, 1)]);
        match nearest_prior_date(&t, ymd(2024, 1, 1), "date") {
            Err(TransformError::NoPriorDate { reference, .. }) => {
                assert_eq!(reference, ymd(2024, 1, 1))
            }
            other => panic!("expected NoPriorDate, got {:?}", other),
        }
    }

    #[test]
    fn test_months_before() {
        assert_eq!(months_before(ymd(2024, 3, 1), 12), Some(ymd(2023, 3, 1)));
        assert_eq!(months_before(ymd(2024, 3, 31), 1), Some(ymd(2024, 2, 29)));
        assert_eq!(months_before(ymd(2024, 3, 1), -2), Some(ymd(2024, 5, 1)));
    }
}
