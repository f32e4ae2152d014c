mod app;
mod commands;
pub mod db;
pub mod library;
pub mod monitor;
pub mod player;
pub mod settings;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;

pub use app::{default_data_dir, Listing, MediaTracker};
pub use commands::{Cli, Commands};

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        let tracker = MediaTracker::open(&data_dir)?;
        commands::execute(&tracker, cli.command).await
    })
}
