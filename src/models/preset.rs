use serde::{Deserialize, Serialize};

/// A saved consumable preset, as listed by `GET /api/preset`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub name: String,
    pub preset_id: i64,
}

/// One item of a preset. The server only returns the id and the price.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresetItem {
    pub item_id: i64,
    pub price: i64,
}
