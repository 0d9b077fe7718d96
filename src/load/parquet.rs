// src/load/parquet.rs

use anyhow::{bail, Context, Result};
use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use glob::glob;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use super::SeriesSource;
use crate::table::{DEFAULT_DATE_FIELD, DEFAULT_SERIES_FIELD};
use crate::transform::{relabel, sort_long_table};

/// A Parquet snapshot: a single file, or every `*.parquet` in a directory
/// (read in file-name order).
#[derive(Debug, Clone)]
pub struct ParquetSource {
    path: PathBuf,
    series_column: String,
    rename: Option<fn(&str) -> String>,
}

impl ParquetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            series_column: DEFAULT_SERIES_FIELD.to_string(),
            rename: None,
        }
    }

    pub fn series_column(mut self, name: &str) -> Self {
        self.series_column = name.to_string();
        self
    }

    /// Map every series label while loading, e.g. `labels::parse_cpi_series_title`.
    pub fn rename(mut self, rename: fn(&str) -> String) -> Self {
        self.rename = Some(rename);
        self
    }

    fn files(&self) -> Result<Vec<PathBuf>> {
        if self.path.is_file() {
            return Ok(vec![self.path.clone()]);
        }
        let pattern = format!("{}/*.parquet", self.path.display());
        let mut files: Vec<PathBuf> = glob(&pattern)
            .with_context(|| format!("bad glob pattern {}", pattern))?
            .filter_map(|entry| entry.ok())
            .collect();
        files.sort();
        Ok(files)
    }
}

impl SeriesSource for ParquetSource {
    fn describe(&self) -> String {
        format!("parquet {}", self.path.display())
    }

    #[tracing::instrument(level = "info", skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<RecordBatch> {
        let files = self.files()?;
        if files.is_empty() {
            bail!("no parquet files found in {}", self.path.display());
        }

        let mut batches = Vec::new();
        for p in &files {
            let file = File::open(p).with_context(|| format!("failed to open `{}`", p.display()))?;
            let reader = ParquetRecordBatchReaderBuilder::try_new(file)
                .with_context(|| format!("reading parquet metadata of `{}`", p.display()))?
                .with_batch_size(8192)
                .build()?;
            for batch in reader {
                batches.push(batch?);
            }
            debug!(file = %p.display(), "read snapshot file");
        }

        let schema = match batches.first() {
            Some(b) => b.schema(),
            None => bail!("parquet files in {} hold no row groups", self.path.display()),
        };
        let mut table =
            concat_batches(&schema, &batches).context("concatenating snapshot batches")?;
        if let Some(f) = self.rename {
            table = relabel(&table, &self.series_column, f)
                .with_context(|| format!("relabelling `{}`", self.series_column))?;
        }
        let table = sort_long_table(&table, &self.series_column, DEFAULT_DATE_FIELD)
            .context("ordering snapshot by series and date")?;
        info!(files = files.len(), rows = table.num_rows(), "loaded snapshot");
        Ok(table)
    }
}

/// Write `batch` as a Snappy-compressed Parquet file. The file is written to
/// `<path>.tmp` and renamed into place once closed.
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {:?}", parent))?;
    }
    let tmp = path.with_extension("parquet.tmp");
    let file = File::create(&tmp).with_context(|| format!("creating {:?}", &tmp))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(BufWriter::new(file), batch.schema(), Some(props))
        .context("creating Arrow writer")?;
    writer.write(batch).context("writing batch")?;
    writer.close().context("closing writer")?;
    fs::rename(&tmp, path).with_context(|| format!("moving {:?} into place", &tmp))?;
    debug!(path = %path.display(), rows = batch.num_rows(), "wrote parquet");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::parse_cpi_series_title;
    use crate::table::{date_column, float_column, string_column, to_date, LongTableBuilder};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn table(label: &str, value: f64) -> RecordBatch {
        let mut b = LongTableBuilder::new();
        b.push(label, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), Some(value));
        b.push(label, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), Some(value + 1.0));
        b.finish("cpi_series").unwrap()
    }

    #[test]
    fn test_write_then_load_file() -> Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("out").join("long.parquet");
        let original = table("All items", 300.0);
        write_parquet(&path, &original)?;
        assert!(path.exists());
        assert!(!path.with_extension("parquet.tmp").exists());

        let loaded = ParquetSource::new(&path).load()?;
        assert_eq!(loaded.num_rows(), 2);
        assert_eq!(loaded.columns(), original.columns());
        assert_eq!(loaded.schema().field(1).name(), "date");
        Ok(())
    }

    #[test]
    fn test_load_directory_concatenates() -> Result<()> {
        let tmp = tempdir()?;
        write_parquet(&tmp.path().join("a.parquet"), &table("All items", 300.0))?;
        write_parquet(&tmp.path().join("b.parquet"), &table("Food", 310.0))?;
        fs::write(tmp.path().join("notes.txt"), "ignored")?;

        let loaded = ParquetSource::new(tmp.path()).load()?;
        assert_eq!(loaded.num_rows(), 4);
        assert_eq!(float_column(&loaded, "value")?.value(2), 310.0);
        Ok(())
    }

    #[test]
    fn test_load_sorts_and_relabels() -> Result<()> {
        let tmp = tempdir()?;
        let raw = "Consumer Price Index for All Urban Consumers: Food in U.S. City Average";
        let mut b = LongTableBuilder::new();
        b.push(raw, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), Some(3.0));
        b.push(raw, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), Some(1.0));
        b.push(raw, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), Some(2.0));
        let path = tmp.path().join("snap.parquet");
        write_parquet(&path, &b.finish("cpi_series")?)?;

        let loaded = ParquetSource::new(&path)
            .series_column("cpi_series")
            .rename(parse_cpi_series_title)
            .load()?;
        let labels: Vec<&str> = string_column(&loaded, "cpi_series")?.iter().flatten().collect();
        assert_eq!(labels, vec!["Food"; 3]);
        let values: Vec<f64> = float_column(&loaded, "value")?.iter().flatten().collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        let months: Vec<String> = date_column(&loaded, "date")?
            .iter()
            .flatten()
            .map(|d| to_date(d).to_string())
            .collect();
        assert_eq!(months, vec!["2024-01-01", "2024-02-01", "2024-03-01"]);

        let changes = crate::transform::grouped_percent_change(&loaded, &["cpi_series"], 1, "value")?;
        let pct: Vec<f64> = float_column(&changes, "pct_chg_value")?.iter().flatten().collect();
        assert_eq!(pct, vec![1.0, 0.5]);
        Ok(())
    }

    #[test]
    fn test_empty_directory_fails() {
        let tmp = tempdir().unwrap();
        let err = ParquetSource::new(tmp.path()).load().unwrap_err();
        assert!(err.to_string().contains("no parquet files"));
    }
}
