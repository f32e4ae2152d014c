use serde::Serialize;

/// Why a monitoring session ended on its own.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    PlayerStopped,
    /// The player is up but reports no position.
    NothingPlaying,
    PlayerUnreachable,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::PlayerStopped => "player stopped",
            EndReason::NothingPlaying => "nothing playing",
            EndReason::PlayerUnreachable => "player unreachable",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MonitorEvent {
    ProgressUpdated {
        file_path: String,
        /// Seconds.
        position: f64,
        /// Seconds.
        length: f64,
        percentage: u8,
    },
    Completed {
        file_path: String,
    },
    SessionEnded {
        file_path: String,
        reason: EndReason,
    },
    PersistFailed {
        file_path: String,
        message: String,
    },
}

impl MonitorEvent {
    pub fn file_path(&self) -> &str {
        match self {
            MonitorEvent::ProgressUpdated { file_path, .. }
            | MonitorEvent::Completed { file_path }
            | MonitorEvent::SessionEnded { file_path, .. }
            | MonitorEvent::PersistFailed { file_path, .. } => file_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_camel_case_tags() {
        let event = MonitorEvent::ProgressUpdated {
            file_path: "/v/a.mp4".into(),
            position: 10.0,
            length: 100.0,
            percentage: 10,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progressUpdated");
        assert_eq!(json["filePath"], "/v/a.mp4");
        assert_eq!(json["percentage"], 10);

        let ended = MonitorEvent::SessionEnded {
            file_path: "/v/a.mp4".into(),
            reason: EndReason::PlayerUnreachable,
        };
        let json = serde_json::to_value(&ended).unwrap();
        assert_eq!(json["reason"], "playerUnreachable");
        assert_eq!(ended.file_path(), "/v/a.mp4");
    }
}
