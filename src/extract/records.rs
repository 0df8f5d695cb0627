// src/extract/records.rs

use crate::config::{ColumnLayout, SourceDescriptor};
use crate::model::PharmacyRecord;
use tracing::trace;

/// Walk the normalized rows after `header_idx` and group them into pharmacies.
///
/// - rows whose category is not `layout.category_literal` are skipped outright
///   (they neither close the current record nor contribute a facility);
/// - a new record starts whenever the identifier differs from the previous kept row,
///   so a later non-contiguous repeat becomes its own record;
/// - each kept row appends its facility name, if any, to the current record.
///
/// Rows must already be padded past `layout.min_width()`.
pub fn extract_records(
    rows: &[Vec<String>],
    header_idx: usize,
    layout: &ColumnLayout,
    source: &SourceDescriptor,
) -> Vec<PharmacyRecord> {
    let mut out: Vec<PharmacyRecord> = Vec::new();

    for (idx, row) in rows.iter().enumerate().skip(header_idx + 1) {
        if row[layout.category] != layout.category_literal {
            trace!(row = idx, category = %row[layout.category], "skipping non-pharmacy row");
            continue;
        }

        // the last pushed record is the only one still open
        let same_run = out.last().is_some_and(|p| p.id == row[layout.id]);
        if !same_run {
            out.push(new_record(row, layout, source));
        }

        let facility = &row[layout.facility];
        if !facility.is_empty() {
            if let Some(current) = out.last_mut() {
                current.facility.push(facility.clone());
            }
        }
    }

    out
}

fn new_record(row: &[String], layout: &ColumnLayout, source: &SourceDescriptor) -> PharmacyRecord {
    PharmacyRecord {
        prefecture_id: row[layout.prefecture_id].clone(),
        prefecture: row[layout.prefecture].clone(),
        id: row[layout.id].clone(),
        name: row[layout.name].clone(),
        post_id: row[layout.post_id].clone(),
        address: row[layout.address].clone(),
        telephone: row[layout.telephone].clone(),
        fax: row[layout.fax].clone(),
        desc: source.desc.clone(),
        reward_id: source.reward_id.clone(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Compact layout: category, id, name, address, facility in columns 0..=4.
    fn layout() -> ColumnLayout {
        ColumnLayout {
            prefecture_id: 5,
            prefecture: 6,
            category: 0,
            id: 1,
            name: 2,
            post_id: 7,
            address: 3,
            telephone: 8,
            fax: 9,
            facility: 4,
            header_marker: "ID".into(),
            category_literal: "pharmacy".into(),
        }
    }

    fn source() -> SourceDescriptor {
        SourceDescriptor {
            department: "Kanto".into(),
            origin_url: String::new(),
            reward_id: "K1".into(),
            excel_urls: vec![],
            desc: "as of April".into(),
        }
    }

    fn row(category: &str, id: &str, facility: &str) -> Vec<String> {
        let mut r = vec![String::new(); 10];
        r[0] = category.into();
        r[1] = id.into();
        r[2] = format!("name {}", id);
        r[3] = format!("addr {}", id);
        r[4] = facility.into();
        r
    }

    fn sheet(data: Vec<Vec<String>>) -> Vec<Vec<String>> {
        let mut rows = vec![row("category", "ID", "facility")];
        rows.extend(data);
        rows
    }

    #[test]
    fn consecutive_rows_merge_into_one_record() {
        let rows = sheet(vec![
            row("pharmacy", "A001", "X"),
            row("pharmacy", "A001", "Y"),
            row("pharmacy", "A001", "Z"),
        ]);
        let recs = extract_records(&rows, 0, &layout(), &source());

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].facility, vec!["X", "Y", "Z"]);
        assert_eq!(recs[0].name, "name A001");
        assert_eq!(recs[0].address, "addr A001");
        assert_eq!(recs[0].desc, "as of April");
        assert_eq!(recs[0].reward_id, "K1");
    }

    #[test]
    fn non_contiguous_repeat_is_a_new_record() {
        let rows = sheet(vec![
            row("pharmacy", "A", "f1"),
            row("pharmacy", "A", "f2"),
            row("pharmacy", "B", "f3"),
            row("pharmacy", "A", "f4"),
        ]);
        let recs = extract_records(&rows, 0, &layout(), &source());

        let ids: Vec<_> = recs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["A", "B", "A"]);
        assert_eq!(recs[0].facility.len(), 2);
        assert_eq!(recs[1].facility.len(), 1);
        assert_eq!(recs[2].facility, vec!["f4"]);
    }

    #[test]
    fn other_categories_neither_break_nor_extend() {
        let rows = sheet(vec![
            row("pharmacy", "A", "f1"),
            row("clinic", "A", "clinic-only"),
            row("pharmacy", "A", "f2"),
        ]);
        let recs = extract_records(&rows, 0, &layout(), &source());

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].facility, vec!["f1", "f2"]);
    }

    #[test]
    fn empty_facility_cells_are_not_recorded() {
        let rows = sheet(vec![row("pharmacy", "A", ""), row("pharmacy", "A", "f1")]);
        let recs = extract_records(&rows, 0, &layout(), &source());

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].facility, vec!["f1"]);
    }

    #[test]
    fn rows_up_to_header_are_ignored() {
        let mut rows = vec![row("pharmacy", "PRE", "title")];
        rows.extend(sheet(vec![row("pharmacy", "A", "f1")]));
        let recs = extract_records(&rows, 1, &layout(), &source());

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].id, "A");
    }
}
