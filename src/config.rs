// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, path::Path};
use tracing::{info, warn};

use crate::table::DEFAULT_SERIES_FIELD;
use crate::transform::PivotWindow;

/// Dashboard layout: which series each page shows and which lags it uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Name of the column holding series labels.
    pub series_column: String,
    /// Series shown in the headline metrics.
    pub headline_series: String,
    /// Lags compared side by side in the overview bar chart.
    pub comparison_lags: Vec<i64>,
    /// Lags reported in the latest-change table.
    pub latest_lags: Vec<i64>,
    pub pivot_window: PivotWindow,
    /// Shorten provider CPI titles while loading.
    pub humanize_titles: bool,
    pub pages: Vec<PageConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    pub name: String,
    pub title: String,
    /// Series on this page; empty means every series in the table.
    #[serde(default)]
    pub series: Vec<String>,
    /// Line-chart lags; the first one feeds the pivot table.
    #[serde(default = "default_page_lags")]
    pub lags: Vec<i64>,
}

fn default_page_lags() -> Vec<i64> {
    vec![1, 12]
}

impl PageConfig {
    fn new(name: &str, title: &str, series: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            series: series.iter().map(|s| s.to_string()).collect(),
            lags: default_page_lags(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            series_column: DEFAULT_SERIES_FIELD.to_string(),
            headline_series: "All items".to_string(),
            comparison_lags: vec![1, 12],
            latest_lags: vec![1, 6, 12, 24],
            pivot_window: PivotWindow::default(),
            humanize_titles: false,
            pages: vec![
                PageConfig::new("overview", "CPI Summary", &[]),
                PageConfig::new(
                    "core-and-headline",
                    "Core & Headline",
                    &["All items", "All items less food and energy"],
                ),
                PageConfig::new(
                    "food",
                    "Food",
                    &["Food", "Food at home", "Food away from home"],
                ),
                PageConfig::new(
                    "education",
                    "Education",
                    &[
                        "Educational books and supplies",
                        "Tuition, other school fees, and childcare",
                    ],
                ),
            ],
        }
    }
}

impl DashboardConfig {
    /// Parse and validate a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: DashboardConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        info!(path = %path.display(), pages = cfg.pages.len(), "loaded config");
        Ok(cfg)
    }

    /// `load` when a path is given and exists, built-in defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            Some(p) => {
                warn!(path = %p.display(), "config not found, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn page(&self, name: &str) -> Option<&PageConfig> {
        self.pages.iter().find(|p| p.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.series_column.trim().is_empty() {
            bail!("series_column must not be empty");
        }
        let all_lags = self
            .comparison_lags
            .iter()
            .chain(&self.latest_lags)
            .chain(self.pages.iter().flat_map(|p| &p.lags));
        for lag in all_lags {
            if *lag == 0 {
                bail!("lags must be nonzero");
            }
        }
        let mut names = HashSet::new();
        for page in &self.pages {
            if !names.insert(page.name.as_str()) {
                bail!("duplicate page `{}`", page.name);
            }
            if page.lags.is_empty() {
                bail!("page `{}` has no lags", page.name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = DashboardConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.series_column, "cpi_series");
        assert_eq!(cfg.page("food").unwrap().series.len(), 3);
        assert!(cfg.page("overview").unwrap().series.is_empty());
        assert!(cfg.page("shelter").is_none());
    }

    #[test]
    fn test_load_partial_yaml() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(
            tmp,
            r#"
series_column: sticky_cpi_series
pivot_window: all
pages:
  - name: sticky
    title: Sticky Price Indexes
    lags: [1, 3, 12]
"#
        )?;
        let cfg = DashboardConfig::load(tmp.path())?;
        assert_eq!(cfg.series_column, "sticky_cpi_series");
        assert_eq!(cfg.pivot_window, PivotWindow::All);
        assert_eq!(cfg.latest_lags, vec![1, 6, 12, 24]);
        assert_eq!(cfg.pages.len(), 1);
        assert_eq!(cfg.pages[0].lags, vec![1, 3, 12]);
        assert!(cfg.pages[0].series.is_empty());
        Ok(())
    }

    #[test]
    fn test_rejects_bad_config() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(tmp, "comparison_lags: [0, 12]\n")?;
        assert!(DashboardConfig::load(tmp.path()).is_err());

        let mut tmp = NamedTempFile::new()?;
        write!(
            tmp,
            "pages:\n  - {{name: a, title: A}}\n  - {{name: a, title: B}}\n"
        )?;
        let err = DashboardConfig::load(tmp.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("duplicate page"));

        let mut tmp = NamedTempFile::new()?;
        write!(tmp, "pivot_window: 0\n")?;
        assert!(DashboardConfig::load(tmp.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_missing_file_falls_back() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cfg = DashboardConfig::load_or_default(Some(&dir.path().join("nope.yaml")))?;
        assert_eq!(cfg, DashboardConfig::default());
        Ok(())
    }
}
