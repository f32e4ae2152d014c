use std::{
    ffi::OsString,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};

use crate::settings::PlayerSettings;

const DEFAULT_EXECUTABLES: &[&str] = &[
    r"C:\Program Files\VideoLAN\VLC\vlc.exe",
    r"C:\Program Files (x86)\VideoLAN\VLC\vlc.exe",
    "/Applications/VLC.app/Contents/MacOS/VLC",
];

/// Executable name looked up on `PATH` when no install location exists.
const PATH_EXECUTABLE: &str = "vlc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedPlayer {
    pub executable: PathBuf,
    pub pid: u32,
}

/// Starts the external player with its HTTP status interface enabled.
pub struct PlayerLauncher {
    candidates: Vec<PathBuf>,
    password: String,
    port: u16,
}

impl PlayerLauncher {
    pub fn new(settings: &PlayerSettings) -> Self {
        let mut candidates: Vec<PathBuf> = settings.executable.iter().cloned().collect();
        candidates.extend(
            DEFAULT_EXECUTABLES
                .iter()
                .map(PathBuf::from)
                .filter(|path| path.exists()),
        );
        candidates.push(PathBuf::from(PATH_EXECUTABLE));
        Self::with_candidates(candidates, settings)
    }

    pub fn with_candidates(candidates: Vec<PathBuf>, settings: &PlayerSettings) -> Self {
        Self {
            candidates,
            password: settings.password.clone(),
            port: settings.port,
        }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    pub fn arguments(&self, file: &Path) -> Vec<OsString> {
        vec![
            file.as_os_str().to_os_string(),
            "--extraintf".into(),
            "http".into(),
            "--http-password".into(),
            self.password.clone().into(),
            "--http-port".into(),
            self.port.to_string().into(),
        ]
    }

    /// Spawns the first candidate that starts. The child is detached; a
    /// reaper thread waits on it and logs how it exited.
    pub fn launch(&self, file: &Path) -> Result<LaunchedPlayer> {
        if !file.exists() {
            return Err(anyhow!("cannot play {}: file does not exist", file.display()));
        }

        let args = self.arguments(file);
        for executable in &self.candidates {
            let spawned = Command::new(executable)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn();

            let mut child = match spawned {
                Ok(child) => child,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    warn!("Player executable {} not found", executable.display());
                    continue;
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("failed to start player {}", executable.display())
                    });
                }
            };

            let pid = child.id();
            info!(
                "Launched {} (pid {pid}) for {}",
                executable.display(),
                file.display()
            );

            thread::Builder::new()
                .name("mediatracker-player".into())
                .spawn(move || match child.wait() {
                    Ok(status) => info!("Player process {pid} exited with {status}"),
                    Err(err) => error!("Failed to wait for player process {pid}: {err}"),
                })
                .context("failed to spawn player reaper thread")?;

            return Ok(LaunchedPlayer {
                executable: executable.clone(),
                pid,
            });
        }

        Err(anyhow!(
            "no media player found (tried {})",
            self.candidates
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_enable_the_http_interface() {
        let settings = PlayerSettings {
            password: "pw".into(),
            port: 9000,
            ..PlayerSettings::default()
        };
        let launcher = PlayerLauncher::with_candidates(vec![], &settings);

        let args = launcher.arguments(Path::new("/v/film.mkv"));
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "/v/film.mkv",
                "--extraintf",
                "http",
                "--http-password",
                "pw",
                "--http-port",
                "9000"
            ]
        );
    }

    #[test]
    fn configured_executable_is_tried_first_and_path_last() {
        let settings = PlayerSettings {
            executable: Some(PathBuf::from("/opt/player/bin/vlc")),
            ..PlayerSettings::default()
        };
        let launcher = PlayerLauncher::new(&settings);
        let candidates = launcher.candidates();

        assert_eq!(candidates.first(), Some(&PathBuf::from("/opt/player/bin/vlc")));
        assert_eq!(candidates.last(), Some(&PathBuf::from(PATH_EXECUTABLE)));
    }

    #[test]
    fn missing_executables_fail_with_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"data").unwrap();

        let launcher = PlayerLauncher::with_candidates(
            vec![dir.path().join("no-such-player")],
            &PlayerSettings::default(),
        );
        let err = launcher.launch(&file).unwrap_err();
        assert!(err.to_string().contains("no media player found"));
    }

    #[test]
    fn missing_file_is_rejected_before_spawning() {
        let launcher = PlayerLauncher::with_candidates(vec![], &PlayerSettings::default());
        assert!(launcher.launch(Path::new("/definitely/not/here.mp4")).is_err());
    }
}
