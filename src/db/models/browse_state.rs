use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the user was last browsing, restored on the next launch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BrowseState {
    pub last_folder: String,
    pub last_path: String,
    pub last_updated: DateTime<Utc>,
}

impl BrowseState {
    pub fn is_empty(&self) -> bool {
        self.last_path.is_empty()
    }
}
