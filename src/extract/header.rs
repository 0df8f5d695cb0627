// src/extract/header.rs

use crate::error::{PipelineError, Result};

/// Index of the first row whose `id_column` cell is exactly `marker`.
/// Data rows start right after it.
pub fn locate_header(rows: &[Vec<String>], id_column: usize, marker: &str) -> Result<usize> {
    rows.iter()
        .position(|row| row.get(id_column).map(String::as_str) == Some(marker))
        .ok_or_else(|| PipelineError::HeaderNotFound {
            marker: marker.to_string(),
        })
}
