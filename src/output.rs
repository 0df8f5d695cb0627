// src/output.rs

use crate::model::PharmacyRecord;
use anyhow::{Context, Result};
use std::{fs, io::Write, path::Path};
use tempfile::NamedTempFile;
use tracing::info;

/// Write `records` as a 2-space indented JSON array.
///
/// The JSON goes to a temp file next to `path` first and is renamed into place,
/// so a failed run never leaves a truncated output behind.
pub fn write_json(path: impl AsRef<Path>, records: &[PharmacyRecord]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {:?}", dir))?;

    let json = serde_json::to_string_pretty(records).context("failed to encode json")?;
    let mut tmp =
        NamedTempFile::new_in(dir).with_context(|| format!("creating temp file in {:?}", dir))?;
    tmp.write_all(json.as_bytes())
        .context("failed to write json")?;
    tmp.write_all(b"\n").context("failed to write json")?;
    tmp.persist(path)
        .with_context(|| format!("failed to move json into {:?}", path))?;

    info!(path = %path.display(), count = records.len(), "wrote output");
    Ok(())
}
