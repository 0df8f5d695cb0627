// src/extract/normalize.rs

/// Trim every cell, then pad each row with empty cells until `row.len() > min_index`,
/// so fixed-position access up to `min_index` never goes out of bounds.
pub fn normalize_rows(rows: &mut [Vec<String>], min_index: usize) {
    for row in rows.iter_mut() {
        for cell in row.iter_mut() {
            let trimmed = cell.trim();
            if trimmed.len() != cell.len() {
                *cell = trimmed.to_string();
            }
        }
        if row.len() <= min_index {
            row.resize(min_index + 1, String::new());
        }
    }
}
