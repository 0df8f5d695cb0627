// src/config.rs

use crate::error::{PipelineError, Result};
use crate::model::RewardTable;
use serde::{de::DeserializeOwned, Deserialize};
use std::{env, fs, path::Path, path::PathBuf};
use tracing::debug;
use url::Url;

pub const DEFAULT_SOURCES_FILE: &str = "xls_urls.yml";
pub const DEFAULT_REWARDS_FILE: &str = "reward.yml";
pub const DEFAULT_OUTPUT_FILE: &str = "pharmacy.json";
pub const DEFAULT_GEOCODE_URL: &str = "https://geocode.csis.u-tokyo.ac.jp/cgi-bin/simple_geocode.cgi";

/// One regional bureau's listing, as written in `xls_urls.yml`.
///
/// Every key is optional; a missing one reads as empty.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceDescriptor {
    /// 管轄局
    #[serde(default)]
    pub department: String,
    /// Page the spreadsheets are linked from. Informational only.
    #[serde(rename = "originURL", default)]
    pub origin_url: String,
    #[serde(default)]
    pub reward_id: String,
    #[serde(rename = "excel_url", default)]
    pub excel_urls: Vec<String>,
    /// Caveat copied onto every record from this source.
    #[serde(default)]
    pub desc: String,
}

/// Fixed column positions of the bureau listing layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub prefecture_id: usize,
    pub prefecture: usize,
    pub category: usize,
    pub id: usize,
    pub name: usize,
    pub post_id: usize,
    pub address: usize,
    pub telephone: usize,
    pub fax: usize,
    pub facility: usize,
    /// Text of the header cell in the `id` column.
    pub header_marker: String,
    /// Category value kept by the extractor; other facility kinds are dropped.
    pub category_literal: String,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            prefecture_id: 1,
            prefecture: 2,
            category: 3,
            id: 4,
            name: 7,
            post_id: 8,
            address: 9,
            telephone: 10,
            fax: 11,
            facility: 13,
            header_marker: "医療機関番号".into(),
            category_literal: "薬局".into(),
        }
    }
}

impl ColumnLayout {
    /// Largest column index any field reads. Normalized rows are longer than this.
    pub fn min_width(&self) -> usize {
        [
            self.prefecture_id,
            self.prefecture,
            self.category,
            self.id,
            self.name,
            self.post_id,
            self.address,
            self.telephone,
            self.fax,
            self.facility,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Run settings, read once from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub sources_path: PathBuf,
    pub rewards_path: PathBuf,
    pub output_path: PathBuf,
    pub geocode_url: Url,
    /// Geocode lookups in flight at once. 1 keeps the run strictly sequential.
    pub geocode_concurrency: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = |key: &str, default: &str| {
            PathBuf::from(lookup(key).unwrap_or_else(|| default.to_string()))
        };

        let raw_url = lookup("GEOCODE_URL").unwrap_or_else(|| DEFAULT_GEOCODE_URL.to_string());
        let geocode_url =
            Url::parse(&raw_url).map_err(|e| PipelineError::parse("GEOCODE_URL", e))?;

        let geocode_concurrency = match lookup("GEOCODE_CONCURRENCY") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|e| PipelineError::parse("GEOCODE_CONCURRENCY", e))?
                .max(1),
            None => 1,
        };

        Ok(Self {
            sources_path: path("PHARMACY_SOURCES", DEFAULT_SOURCES_FILE),
            rewards_path: path("PHARMACY_REWARDS", DEFAULT_REWARDS_FILE),
            output_path: path("PHARMACY_OUTPUT", DEFAULT_OUTPUT_FILE),
            geocode_url,
            geocode_concurrency,
        })
    }
}

fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).map_err(|_| PipelineError::ConfigMissing {
        path: path.to_path_buf(),
    })?;
    serde_yaml::from_str(&raw).map_err(|e| PipelineError::parse(path.display().to_string(), e))
}

/// Load the ordered source list from `xls_urls.yml`.
pub fn load_sources(path: impl AsRef<Path>) -> Result<Vec<SourceDescriptor>> {
    let sources: Vec<SourceDescriptor> = load_yaml(path.as_ref())?;
    debug!(count = sources.len(), "loaded source descriptors");
    Ok(sources)
}

/// Load every reward table from `reward.yml`.
pub fn load_rewards(path: impl AsRef<Path>) -> Result<Vec<RewardTable>> {
    let tables: Vec<RewardTable> = load_yaml(path.as_ref())?;
    debug!(count = tables.len(), "loaded reward tables");
    Ok(tables)
}
