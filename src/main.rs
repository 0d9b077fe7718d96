use anyhow::{bail, Context, Result};
use arrow::util::pretty::pretty_format_batches;
use chrono::NaiveDate;
use clap::Parser;
use cpi_tables::{
    config::{DashboardConfig, PageConfig},
    labels::parse_cpi_series_title,
    load::{source_for_path, write_parquet},
    nearest_prior_date,
    report::{build_overview, build_page, Overview, PageReport},
    table::DEFAULT_DATE_FIELD,
    TransformError,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const OVERVIEW_PAGE: &str = "overview";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Build the CPI dashboard tables from a long-format series export"
)]
struct Args {
    /// Long-format CSV export, a Parquet file, or a directory of Parquet files.
    #[arg(short, long)]
    input: PathBuf,
    /// YAML dashboard layout; built-in pages when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Only build this page.
    #[arg(short, long)]
    page: Option<String>,
    /// Write every computed table as Parquet under this directory.
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Report the last observation strictly before this date (YYYY-MM-DD).
    #[arg(long)]
    as_of: Option<NaiveDate>,
    /// Print headline metrics as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();
    let config = DashboardConfig::load_or_default(args.config.as_deref())?;

    let rename = config
        .humanize_titles
        .then_some(parse_cpi_series_title as fn(&str) -> String);
    let source = source_for_path(&args.input, &config.series_column, rename);
    info!(source = %source.describe(), "loading series");
    let table = source.load()?;

    if let Some(as_of) = args.as_of {
        match nearest_prior_date(&table, as_of, DEFAULT_DATE_FIELD) {
            Ok(date) => println!("last observation before {}: {}", as_of, date),
            Err(e @ TransformError::NoPriorDate { .. }) => warn!("{}", e),
            Err(e) => return Err(e.into()),
        }
    }

    let pages: Vec<&PageConfig> = match &args.page {
        Some(name) => match config.page(name) {
            Some(p) => vec![p],
            None => bail!("no page named `{}` in config", name),
        },
        None => config.pages.iter().collect(),
    };

    for page in pages {
        if page.name == OVERVIEW_PAGE {
            match build_overview(&table, &config) {
                Ok(overview) => emit_overview(&overview, args.json, args.out.as_deref())?,
                Err(e) => warn!(page = %page.name, error = %e, "skipping page"),
            }
            continue;
        }
        match build_page(&table, &config, page) {
            Ok(report) => emit_page(&report, args.out.as_deref())?,
            Err(e) => warn!(page = %page.name, error = %e, "skipping page"),
        }
    }

    info!("done");
    Ok(())
}

fn emit_overview(overview: &Overview, json: bool, out: Option<&Path>) -> Result<()> {
    println!(
        "== {} ({} to {}) ==",
        OVERVIEW_PAGE, overview.dates.min, overview.dates.max
    );
    if json {
        let text = serde_json::to_string_pretty(&overview.headlines)
            .context("serializing headline metrics")?;
        println!("{}", text);
    } else {
        for h in &overview.headlines {
            println!(
                "{} {}-month change as of {}: {:.4} (Δ {:+.4})",
                h.series, h.lag, h.date, h.value, h.delta
            );
        }
    }
    println!("{}", pretty_format_batches(&[overview.comparison.clone()])?);
    println!("{}", pretty_format_batches(&[overview.latest.clone()])?);

    if let Some(dir) = out {
        write_parquet(&dir.join("overview_comparison.parquet"), &overview.comparison)?;
        write_parquet(&dir.join("overview_latest.parquet"), &overview.latest)?;
    }
    Ok(())
}

fn emit_page(report: &PageReport, out: Option<&Path>) -> Result<()> {
    println!(
        "== {} ({} to {}) ==",
        report.title, report.dates.min, report.dates.max
    );
    println!("{}", pretty_format_batches(&[report.pivot.clone()])?);

    if let Some(dir) = out {
        for (lag, table) in &report.changes {
            let path = dir.join(format!("{}_pct_chg_{}.parquet", report.name, lag));
            write_parquet(&path, table)?;
        }
        write_parquet(&dir.join(format!("{}_pivot.parquet", report.name)), &report.pivot)?;
        info!(page = %report.name, dir = %dir.display(), "wrote page tables");
    }
    Ok(())
}
