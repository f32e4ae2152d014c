use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

const MIN_TIMEOUT_MS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 60_000;
const MIN_POLL_INTERVAL_MS: u64 = 100;
const MAX_POLL_INTERVAL_MS: u64 = 3_600_000;

/// How to reach and start the external player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerSettings {
    /// Tried before the built-in install locations.
    pub executable: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub password: String,
    pub status_timeout_ms: u64,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            executable: None,
            host: "127.0.0.1".into(),
            port: 8080,
            password: "mediatracker".into(),
            status_timeout_ms: 1_000,
        }
    }
}

impl PlayerSettings {
    pub fn status_url(&self) -> String {
        format!("http://{}:{}/requests/status.json", self.host, self.port)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorSettings {
    pub poll_interval_ms: u64,
    /// Position ratio that has to be exceeded before `Completed` fires.
    pub completion_threshold: f64,
    /// Consecutive failed polls after which a session ends. 0 keeps polling forever.
    pub max_consecutive_failures: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            completion_threshold: 0.8,
            max_consecutive_failures: 30,
        }
    }
}

impl MonitorSettings {
    pub fn poll_interval(&self) -> Duration {
        let millis = self
            .poll_interval_ms
            .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS);
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    player: PlayerSettings,
    monitor: MonitorSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings in {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn player(&self) -> PlayerSettings {
        self.read().player.clone()
    }

    pub fn monitor(&self) -> MonitorSettings {
        self.read().monitor.clone()
    }

    pub fn update_player(&self, settings: PlayerSettings) -> Result<()> {
        let mut guard = self.write();
        guard.player = settings;
        self.persist(&guard)
    }

    pub fn update_monitor(&self, settings: MonitorSettings) -> Result<()> {
        let mut guard = self.write();
        guard.monitor = settings;
        self.persist(&guard)
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
