pub mod browser;

pub use browser::{
    annotate, is_video_file, list_directory, EntryKind, LibraryEntry, WatchSummary,
    VIDEO_EXTENSIONS,
};
