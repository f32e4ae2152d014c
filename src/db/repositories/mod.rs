mod browse_state;
mod watch_records;
