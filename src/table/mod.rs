pub mod arrow;
pub mod rows;

pub use self::arrow::{
    column, date_column, float_column, from_date, int_column, long_schema, string_column, to_date,
    replace_column, with_column, DEFAULT_DATE_FIELD, DEFAULT_SERIES_FIELD, DEFAULT_VALUE_FIELD,
};
pub use rows::{group_keys, partition, take_rows, GroupKey, LongTableBuilder};
