// src/fetch/mod.rs

pub mod zips;

use crate::error::PipelineError;
use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use tracing::{debug, info};
use url::Url;

/// One `.xlsx` workbook held in memory, plus a name for logging.
#[derive(Debug, Clone)]
pub struct Spreadsheet {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// What a locator points at, decided by its path extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Xlsx,
    Zip,
}

impl SourceKind {
    pub fn of(url: &Url) -> Option<Self> {
        let ext = Path::new(url.path())
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" => Some(Self::Xlsx),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }
}

/// GET `url` and return the whole body.
pub async fn download_bytes(client: &Client, url: &Url) -> Result<Vec<u8>> {
    let bytes = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?
        .bytes()
        .await
        .with_context(|| format!("Reading body from {}", url))?;
    Ok(bytes.to_vec())
}

/// Download one locator and return every spreadsheet it carries.
/// A bare `.xlsx` yields itself; a `.zip` yields each `.xlsx` member.
#[tracing::instrument(level = "info", skip(client))]
pub async fn fetch_spreadsheets(client: &Client, locator: &str) -> Result<Vec<Spreadsheet>> {
    let url = Url::parse(locator).with_context(|| format!("parsing source URL {}", locator))?;
    let kind = SourceKind::of(&url).ok_or_else(|| PipelineError::UnsupportedSource {
        locator: locator.to_string(),
    })?;

    let bytes = download_bytes(client, &url).await?;
    debug!(bytes = bytes.len(), ?kind, "downloaded");

    let sheets = match kind {
        SourceKind::Xlsx => {
            let name = url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|name| !name.is_empty())
                .unwrap_or("download.xlsx")
                .to_string();
            vec![Spreadsheet { name, bytes }]
        }
        SourceKind::Zip => {
            let members = zips::xlsx_members(&bytes)
                .with_context(|| format!("unpacking {}", locator))?;
            info!(count = members.len(), "unpacked zip");
            members
        }
    };
    Ok(sheets)
}
