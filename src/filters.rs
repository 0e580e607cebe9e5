//! Dashboard filter state forwarded to the assistant

use serde::{Deserialize, Serialize};

/// Snapshot of the dashboard's filter drawer.
///
/// Serialized with camelCase keys to match the wire contract; on the
/// `filter_update` outbound frame the whole struct travels JSON-encoded
/// inside the `content` string field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterState {
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub age_groups: Vec<String>,
    pub sexes: Vec<String>,
    pub races: Vec<String>,
    pub weapon_types: Vec<String>,
}

impl FilterState {
    /// True when no filter is active.
    pub fn is_empty(&self) -> bool {
        self.start_year.is_none()
            && self.end_year.is_none()
            && self.age_groups.is_empty()
            && self.sexes.is_empty()
            && self.races.is_empty()
            && self.weapon_types.is_empty()
    }
}
