// src/model.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One pharmacy, possibly assembled from several consecutive spreadsheet rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PharmacyRecord {
    /// 都道府県コード
    pub prefecture_id: String,
    pub prefecture: String,
    /// 医療機関番号, the grouping key within one sheet.
    pub id: String,
    pub name: String,
    pub post_id: String,
    pub address: String,
    pub telephone: String,
    pub fax: String,
    /// 受理届出名称, one entry per contributing row, in sheet order.
    pub facility: Vec<String>,
    pub point: i64,
    pub lat: f64,
    pub lon: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub desc: String,

    #[serde(skip)]
    pub reward_id: String,
}

/// A named point table: authorization name → points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RewardTable {
    pub id: String,
    #[serde(default)]
    pub reward: HashMap<String, i64>,
}

/// One geocoder hit. Only the first candidate of a response is used.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Candidate {
    pub latitude: f64,
    pub longitude: f64,
}
