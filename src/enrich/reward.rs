// src/enrich/reward.rs

use crate::error::{PipelineError, Result};
use crate::model::{PharmacyRecord, RewardTable};

/// First table whose `id` equals `key`.
pub fn find_table<'a>(tables: &'a [RewardTable], key: &str) -> Result<&'a RewardTable> {
    tables
        .iter()
        .find(|t| t.id == key)
        .ok_or_else(|| PipelineError::RewardTableNotFound {
            key: key.to_string(),
        })
}

/// Sum of points for every listed facility. Repeats count each time; unknown names count zero.
pub fn score(table: &RewardTable, facilities: &[String]) -> i64 {
    facilities
        .iter()
        .filter_map(|f| table.reward.get(f))
        .sum()
}

/// Add the record's facility points to its running total.
pub fn apply_reward(record: &mut PharmacyRecord, tables: &[RewardTable]) -> Result<()> {
    let table = find_table(tables, &record.reward_id)?;
    record.point += score(table, &record.facility);
    Ok(())
}
