//! Watch record data model.
//!
//! One row per distinct video path. Progress fields are only ever written from
//! the reconciler's output; everything else here is identity and description.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Percentage at or above which a file is listed as watched.
const WATCHED_PERCENTAGE_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WatchRecord {
    pub file_path: String,
    pub file_name: String,
    pub file_size: u64,
    pub watch_count: u32,
    /// Seconds.
    pub last_position: f64,
    /// Seconds. Never lowered once a positive length has been seen.
    pub total_duration: f64,
    pub watched_percentage: f64,
    pub watched_date: DateTime<Utc>,
}

impl WatchRecord {
    pub fn new(
        file_path: impl Into<String>,
        file_name: impl Into<String>,
        file_size: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            file_name: file_name.into(),
            file_size,
            watch_count: 0,
            last_position: 0.0,
            total_duration: 0.0,
            watched_percentage: 0.0,
            watched_date: now,
        }
    }

    /// Record for a path seen for the first time without file metadata.
    pub fn for_path(file_path: &str, now: DateTime<Utc>) -> Self {
        Self::new(file_path, file_name_of(file_path), 0, now)
    }

    pub fn path_key(&self) -> String {
        normalize_path_key(&self.file_path)
    }

    pub fn is_watched(&self) -> bool {
        self.watched_percentage >= WATCHED_PERCENTAGE_THRESHOLD
    }
}

/// Last component of a path, accepting both `/` and `\` separators.
pub fn file_name_of(path: &str) -> String {
    path.trim()
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Natural key of a watch record: separator- and case-normalized path.
pub fn normalize_path_key(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");

    let mut key = String::with_capacity(unified.len());
    let mut previous_was_separator = false;
    for ch in unified.chars() {
        if ch == '/' {
            if previous_was_separator {
                continue;
            }
            previous_was_separator = true;
        } else {
            previous_was_separator = false;
        }
        key.push(ch);
    }

    // Keep the separator of a bare root such as "/" or "c:/".
    let is_root = key == "/" || (key.len() == 3 && key.ends_with(":/"));
    if key.ends_with('/') && !is_root {
        key.pop();
    }

    key.to_lowercase()
}
