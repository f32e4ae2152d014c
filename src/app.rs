use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{info, warn};
use tokio::sync::broadcast;

use crate::{
    db::{file_name_of, Database, WatchRecord},
    library::{self, LibraryEntry},
    monitor::{MonitorController, MonitorEvent, MonitorState},
    player::{PlayerLauncher, PollError, Sample, StatusClient},
    settings::SettingsStore,
};

const DATABASE_FILE: &str = "mediatracker.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

/// `$MEDIATRACKER_HOME`, else `~/.mediatracker`.
pub fn default_data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("MEDIATRACKER_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".mediatracker"))
        .context("failed to determine home directory")
}

/// Listing of one folder with watch progress attached.
#[derive(Debug, Clone)]
pub struct Listing {
    pub folder: PathBuf,
    pub entries: Vec<LibraryEntry>,
}

/// Everything a front end needs: storage, settings, the player and the monitor.
pub struct MediaTracker {
    db: Database,
    settings: SettingsStore,
    launcher: PlayerLauncher,
    monitor: MonitorController,
}

impl MediaTracker {
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let db = Database::new(data_dir.join(DATABASE_FILE))?;
        let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;

        let player = settings.player();
        let client = StatusClient::new(&player)?;
        let launcher = PlayerLauncher::new(&player);
        info!("Player status endpoint: {}", client.url());
        let monitor = MonitorController::new(
            Arc::new(client),
            Arc::new(db.clone()),
            &settings.monitor(),
        );

        info!("Opened media tracker at {}", data_dir.display());
        Ok(Self {
            db,
            settings,
            launcher,
            monitor,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.monitor.subscribe()
    }

    pub async fn snapshot(&self) -> MonitorState {
        self.monitor.snapshot().await
    }

    /// Starts the player on the file, registers it and begins monitoring.
    pub async fn play(&self, file: &Path) -> Result<MonitorState> {
        if !file.is_file() {
            return Err(anyhow!("cannot play {}: not a file", file.display()));
        }
        // Nothing is recorded for a file the player could not be started on.
        let launched = self.launcher.launch(file)?;
        let file_path = self.register_playback(file).await?;
        info!("Player {} started for {file_path}", launched.pid);
        self.monitor.start(&file_path).await
    }

    /// Like [`play`](Self::play) for a file the player already has open.
    pub async fn monitor(&self, file: &Path) -> Result<MonitorState> {
        let file_path = self.register_playback(file).await?;
        self.monitor.start(&file_path).await
    }

    pub async fn stop_monitoring(&self) -> bool {
        self.monitor.stop().await
    }

    pub async fn live_status(&self) -> Result<Sample, PollError> {
        self.monitor.get_live_status().await
    }

    /// Lists `dir`, or the last browsed folder, or the working directory, and
    /// remembers it for next time.
    pub async fn browse(&self, dir: Option<&Path>) -> Result<Listing> {
        let folder = match dir {
            Some(dir) => dir.to_path_buf(),
            None => match self.db.browse_state().await? {
                Some(state) if !state.last_folder.is_empty() => PathBuf::from(state.last_folder),
                _ => std::env::current_dir().context("failed to read working directory")?,
            },
        };

        let folder = fs::canonicalize(&folder).unwrap_or(folder);
        let mut entries = library::list_directory(&folder)?;
        let records = self.db.list_watch_records().await?;
        library::annotate(&mut entries, &records);

        let last_path = self
            .db
            .browse_state()
            .await?
            .map(|state| state.last_path)
            .unwrap_or_default();
        self.db
            .save_browse_state(&folder.to_string_lossy(), &last_path)
            .await?;

        Ok(Listing { folder, entries })
    }

    pub async fn history(&self) -> Result<Vec<WatchRecord>> {
        self.db.list_watch_records().await
    }

    pub async fn forget(&self, file: &Path) -> Result<bool> {
        self.monitor.forget(&resolve(file)).await
    }

    /// The "played" signal: make sure a record exists and remember where the
    /// file lives. Returns the path the session should track.
    async fn register_playback(&self, file: &Path) -> Result<String> {
        let file_path = resolve(file);
        if file_path.trim().is_empty() {
            return Err(anyhow!("file path must not be empty"));
        }

        let file_size = match fs::metadata(file) {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                warn!("cannot stat {file_path}: {err}");
                0
            }
        };

        self.db
            .ensure_watch_record(&file_path, &file_name_of(&file_path), file_size, Utc::now())
            .await?;

        let folder = Path::new(&file_path)
            .parent()
            .map(|parent| parent.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.db.save_browse_state(&folder, &file_path).await?;

        Ok(file_path)
    }
}

/// Absolute form of `file` when it exists, otherwise the path as given.
fn resolve(file: &Path) -> String {
    fs::canonicalize(file)
        .unwrap_or_else(|_| file.to_path_buf())
        .to_string_lossy()
        .into_owned()
}
