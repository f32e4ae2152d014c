use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use log::warn;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    app::MediaTracker,
    library::EntryKind,
    monitor::MonitorEvent,
    settings::SettingsStore,
};

/// Media Tracker - remembers how far you got in every video
#[derive(Parser, Debug)]
#[command(name = "mediatracker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Where the database and settings live (default: $MEDIATRACKER_HOME or ~/.mediatracker)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open a file in the player and track progress until playback ends
    Play { file: PathBuf },
    /// Track a file that is already playing
    Monitor { file: PathBuf },
    /// Ask the player what it is doing right now
    Status,
    /// List folders and videos with their progress
    List {
        /// Folder to list (default: the last one listed)
        dir: Option<PathBuf>,
    },
    /// Show every tracked video, most recent first
    History,
    /// Drop the watch record of a file
    Forget { file: PathBuf },
    /// Show settings, or change them with the flags below
    Config(ConfigArgs),
}

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Player executable to try before the usual install locations
    #[arg(long)]
    pub executable: Option<PathBuf>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub password: Option<String>,
    /// Timeout of a single status request
    #[arg(long)]
    pub status_timeout_ms: Option<u64>,
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
    /// Position ratio (0-1) that has to be passed to count as finished
    #[arg(long)]
    pub completion_threshold: Option<f64>,
    /// Failed polls in a row before a session ends (0 = never give up)
    #[arg(long)]
    pub max_failures: Option<u32>,
}

/// Writes the given overrides to the settings file. Returns whether anything
/// changed.
pub fn apply_config(settings: &SettingsStore, args: ConfigArgs) -> Result<bool> {
    if let Some(threshold) = args.completion_threshold {
        if !(0.0..=1.0).contains(&threshold) {
            bail!("completion threshold must be between 0 and 1, got {threshold}");
        }
    }

    let current_player = settings.player();
    let mut player = current_player.clone();
    if let Some(executable) = args.executable {
        player.executable = Some(executable);
    }
    if let Some(host) = args.host {
        player.host = host;
    }
    if let Some(port) = args.port {
        player.port = port;
    }
    if let Some(password) = args.password {
        player.password = password;
    }
    if let Some(timeout) = args.status_timeout_ms {
        player.status_timeout_ms = timeout;
    }

    let current_monitor = settings.monitor();
    let mut monitor = current_monitor.clone();
    if let Some(interval) = args.poll_interval_ms {
        monitor.poll_interval_ms = interval;
    }
    if let Some(threshold) = args.completion_threshold {
        monitor.completion_threshold = threshold;
    }
    if let Some(max_failures) = args.max_failures {
        monitor.max_consecutive_failures = max_failures;
    }

    let mut changed = false;
    if player != current_player {
        settings.update_player(player)?;
        changed = true;
    }
    if monitor != current_monitor {
        settings.update_monitor(monitor)?;
        changed = true;
    }
    Ok(changed)
}

pub async fn execute(tracker: &MediaTracker, command: Commands) -> Result<()> {
    match command {
        Commands::Play { file } => {
            let events = tracker.subscribe();
            let state = tracker.play(&file).await?;
            println!("Playing {}", state.target_path.unwrap_or_default());
            follow(tracker, events).await;
        }
        Commands::Monitor { file } => {
            let events = tracker.subscribe();
            let state = tracker.monitor(&file).await?;
            println!("Monitoring {}", state.target_path.unwrap_or_default());
            follow(tracker, events).await;
        }
        Commands::Status => match tracker.live_status().await {
            Ok(sample) => println!(
                "{} {:.1}% ({:.0}s / {:.0}s) {}",
                sample.state.as_str(),
                sample.position_ratio * 100.0,
                sample.time_seconds,
                sample.length_seconds,
                sample.title
            ),
            Err(err) => println!("{err}"),
        },
        Commands::List { dir } => {
            let listing = tracker.browse(dir.as_deref()).await?;
            println!("{}", listing.folder.display());
            for entry in listing.entries {
                match (entry.kind, entry.watch) {
                    (EntryKind::Folder, _) => println!("  [dir] {}", entry.name),
                    (EntryKind::Video, Some(watch)) => println!(
                        "  {} {:>3.0}% x{} {}",
                        if watch.is_watched { "✓" } else { " " },
                        watch.watched_percentage,
                        watch.watch_count,
                        entry.name
                    ),
                    (EntryKind::Video, None) => println!("         {}", entry.name),
                }
            }
        }
        Commands::History => {
            let records = tracker.history().await?;
            if records.is_empty() {
                println!("No videos tracked yet");
            }
            for record in records {
                println!(
                    "{} {:>3.0}% x{} {}",
                    record.watched_date.format("%Y-%m-%d %H:%M"),
                    record.watched_percentage,
                    record.watch_count,
                    record.file_path
                );
            }
        }
        Commands::Config(args) => {
            let settings = tracker.settings();
            if apply_config(settings, args)? {
                println!("Saved. New values apply from the next command.");
            }
            let current = serde_json::json!({
                "player": settings.player(),
                "monitor": settings.monitor(),
            });
            println!("{}", serde_json::to_string_pretty(&current)?);
        }
        Commands::Forget { file } => {
            if tracker.forget(&file).await? {
                println!("Forgot {}", file.display());
            } else {
                println!("{} was not tracked", file.display());
            }
        }
    }
    Ok(())
}

/// Prints monitor events until the session ends or Ctrl-C stops it.
async fn follow(tracker: &MediaTracker, mut events: broadcast::Receiver<MonitorEvent>) {
    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    print_event(&event);
                    if matches!(event, MonitorEvent::SessionEnded { .. }) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("missed {skipped} monitor events"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracker.stop_monitoring().await;
                println!("Stopped");
                break;
            }
        }
    }
}

fn print_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::ProgressUpdated {
            position,
            length,
            percentage,
            ..
        } => println!("{percentage:>3}% ({position:.0}s / {length:.0}s)"),
        MonitorEvent::Completed { file_path } => println!("Finished {file_path}"),
        MonitorEvent::SessionEnded { reason, .. } => {
            println!("Session ended: {}", reason.as_str())
        }
        MonitorEvent::PersistFailed { message, .. } => {
            println!("Could not save progress of {}: {message}", event.file_path())
        }
    }
}
