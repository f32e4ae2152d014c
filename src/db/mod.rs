mod connection;
mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{file_name_of, normalize_path_key, BrowseState, WatchRecord};
