// src/fetch/zips.rs

use super::Spreadsheet;
use crate::error::PipelineError;
use anyhow::{Context, Result};
use encoding_rs::SHIFT_JIS;
use std::io::{Cursor, Read};
use tracing::{debug, trace};
use zip::ZipArchive;

/// Bureau archives are built on Windows; member names without the UTF-8 flag are Shift-JIS.
pub fn decode_entry_name(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(s) => s.to_string(),
        Err(_) => SHIFT_JIS.decode(raw).0.into_owned(),
    }
}

fn is_xlsx(name: &str) -> bool {
    name.to_lowercase().ends_with(".xlsx")
}

/// Buffer every `.xlsx` member of an in-memory ZIP, in archive order.
pub fn xlsx_members(zip_bytes: &[u8]) -> Result<Vec<Spreadsheet>> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))
        .map_err(|e| PipelineError::parse("zip archive", e))?;

    let mut out = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to access ZIP entry #{}", i))?;
        let name = decode_entry_name(entry.name_raw());

        if !entry.is_file() || !is_xlsx(&name) {
            trace!(name = %name, "skipping zip member");
            continue;
        }

        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .with_context(|| format!("Failed to read {} into memory", name))?;
        debug!(name = %name, bytes = buf.len(), "buffered zip member");
        out.push(Spreadsheet { name, bytes: buf });
    }

    Ok(out)
}
