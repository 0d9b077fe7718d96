// src/load/mod.rs
//
// The only place series data enters the crate. Transforms never fetch
// anything themselves; callers pick a source and hand the loaded table over.

use anyhow::Result;
use arrow::record_batch::RecordBatch;
use std::path::Path;

pub mod csv;
pub mod parquet;

pub use self::csv::{read_long_csv, CsvSource};
pub use self::parquet::{write_parquet, ParquetSource};

/// Anything that can produce a long-format observation table.
pub trait SeriesSource {
    /// Short human-readable description for logs.
    fn describe(&self) -> String;

    /// Materialize the table, ordered by date within each series.
    fn load(&self) -> Result<RecordBatch>;
}

/// A table that is already in memory.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    batch: RecordBatch,
}

impl InMemorySource {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }
}

impl SeriesSource for InMemorySource {
    fn describe(&self) -> String {
        format!("in-memory table ({} rows)", self.batch.num_rows())
    }

    fn load(&self) -> Result<RecordBatch> {
        Ok(self.batch.clone())
    }
}

/// Choose a source by path: directories and `.parquet` files are snapshots,
/// anything else is read as a CSV export.
pub fn source_for_path(
    path: &Path,
    series_col: &str,
    rename: Option<fn(&str) -> String>,
) -> Box<dyn SeriesSource> {
    let is_parquet = path.is_dir()
        || path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
    if is_parquet {
        let mut src = ParquetSource::new(path).series_column(series_col);
        if let Some(f) = rename {
            src = src.rename(f);
        }
        Box::new(src)
    } else {
        let mut src = CsvSource::new(path).series_column(series_col);
        if let Some(f) = rename {
            src = src.rename(f);
        }
        Box::new(src)
    }
}
