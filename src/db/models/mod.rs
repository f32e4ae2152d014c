pub mod browse_state;
pub mod watch_record;

pub use browse_state::BrowseState;
pub use watch_record::{file_name_of, normalize_path_key, WatchRecord};
