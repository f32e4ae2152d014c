//! One-level directory listing of folders and video files.

use std::{collections::HashMap, fs, path::Path};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

use crate::db::{normalize_path_key, WatchRecord};

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v"];

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    Folder,
    Video,
}

/// Progress attached to a listed video that has a watch record.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WatchSummary {
    pub watched_percentage: f64,
    pub last_position: f64,
    pub total_duration: f64,
    pub watch_count: u32,
    pub watched_date: DateTime<Utc>,
    pub is_watched: bool,
}

impl From<&WatchRecord> for WatchSummary {
    fn from(record: &WatchRecord) -> Self {
        Self {
            watched_percentage: record.watched_percentage,
            last_position: record.last_position,
            total_duration: record.total_duration,
            watch_count: record.watch_count,
            watched_date: record.watched_date,
            is_watched: record.is_watched(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    /// Bytes; zero for folders.
    pub size: u64,
    pub watch: Option<WatchSummary>,
}

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Lists folders and video files directly inside `dir`, folders first, then
/// by name ignoring case. Entries that cannot be inspected are skipped.
pub fn list_directory(dir: &Path) -> Result<Vec<LibraryEntry>> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }

    let read = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?;

    let mut entries = Vec::new();
    for entry in read {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("skipping unreadable entry in {}: {err}", dir.display());
                continue;
            }
        };
        let path = entry.path();
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) => {
                debug!("skipping {}: {err}", path.display());
                continue;
            }
        };

        let (kind, size) = if metadata.is_dir() {
            (EntryKind::Folder, 0)
        } else if metadata.is_file() && is_video_file(&path) {
            (EntryKind::Video, metadata.len())
        } else {
            continue;
        };

        entries.push(LibraryEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: path.to_string_lossy().into_owned(),
            kind,
            size,
            watch: None,
        });
    }

    entries.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    Ok(entries)
}

/// Attaches watch progress to every video entry that has a record.
pub fn annotate(entries: &mut [LibraryEntry], records: &[WatchRecord]) {
    let by_key: HashMap<String, &WatchRecord> = records
        .iter()
        .map(|record| (record.path_key(), record))
        .collect();

    for entry in entries.iter_mut().filter(|e| e.kind == EntryKind::Video) {
        entry.watch = by_key
            .get(&normalize_path_key(&entry.path))
            .map(|record| WatchSummary::from(*record));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str, bytes: usize) {
        fs::write(dir.join(name), vec![0u8; bytes]).unwrap();
    }

    #[test]
    fn lists_folders_first_then_videos_by_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Season 2")).unwrap();
        fs::create_dir(dir.path().join("extras")).unwrap();
        touch(dir.path(), "b.MKV", 3);
        touch(dir.path(), "A.mp4", 5);
        touch(dir.path(), "notes.txt", 1);
        touch(dir.path(), "cover.jpg", 1);
        touch(dir.path(), "noext", 1);

        let entries = list_directory(dir.path()).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["extras", "Season 2", "A.mp4", "b.MKV"]);

        assert_eq!(entries[0].kind, EntryKind::Folder);
        assert_eq!(entries[0].size, 0);
        assert_eq!(entries[2].kind, EntryKind::Video);
        assert_eq!(entries[2].size, 5);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_directory(&dir.path().join("gone")).is_err());
    }

    #[test]
    fn recognizes_video_extensions_case_insensitively() {
        assert!(is_video_file(Path::new("/v/clip.WebM")));
        assert!(is_video_file(Path::new("movie.m4v")));
        assert!(!is_video_file(Path::new("movie.mp3")));
        assert!(!is_video_file(Path::new("mp4")));
    }

    #[test]
    fn annotate_matches_records_by_path_key() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "seen.mp4", 1);
        touch(dir.path(), "new.mp4", 1);
        fs::create_dir(dir.path().join("seen.mp4.d")).unwrap();

        let mut entries = list_directory(dir.path()).unwrap();

        let seen_path = dir.path().join("seen.mp4").to_string_lossy().to_uppercase();
        let mut record = WatchRecord::for_path(&seen_path, Utc::now());
        record.watched_percentage = 85.0;
        record.watch_count = 2;

        annotate(&mut entries, &[record]);

        let seen = entries.iter().find(|e| e.name == "seen.mp4").unwrap();
        let summary = seen.watch.as_ref().unwrap();
        assert!(summary.is_watched);
        assert_eq!(summary.watch_count, 2);

        let fresh = entries.iter().find(|e| e.name == "new.mp4").unwrap();
        assert!(fresh.watch.is_none());
        assert!(entries.iter().filter(|e| e.kind == EntryKind::Folder).all(|e| e.watch.is_none()));
    }
}
