//! Normalized player status samples and the wire format they come from.

use serde::{Deserialize, Serialize};

use super::client::PollError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PlayerState {
    Playing,
    Paused,
    Stopped,
}

impl PlayerState {
    /// Anything the player reports besides playing/paused counts as stopped.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "playing" => PlayerState::Playing,
            "paused" => PlayerState::Paused,
            _ => PlayerState::Stopped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub state: PlayerState,
    /// Playback position as a fraction of the media length, in `[0, 1]`.
    pub position_ratio: f64,
    pub time_seconds: f64,
    pub length_seconds: f64,
    pub title: String,
}

impl Sample {
    pub fn is_progressing(&self) -> bool {
        matches!(self.state, PlayerState::Playing | PlayerState::Paused)
            && self.position_ratio > 0.0
    }

    pub fn from_status_json(body: &str) -> Result<Self, PollError> {
        let status: StatusDocument = serde_json::from_str(body)
            .map_err(|err| PollError::MalformedResponse(err.to_string()))?;
        Ok(status.into())
    }
}

#[derive(Debug, Default, Deserialize)]
struct StatusDocument {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    position: Option<f64>,
    #[serde(default)]
    time: Option<f64>,
    #[serde(default)]
    length: Option<f64>,
    #[serde(default)]
    information: Option<Information>,
}

#[derive(Debug, Default, Deserialize)]
struct Information {
    #[serde(default)]
    category: Option<Category>,
}

#[derive(Debug, Default, Deserialize)]
struct Category {
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    filename: Option<String>,
}

impl From<StatusDocument> for Sample {
    fn from(doc: StatusDocument) -> Self {
        let title = doc
            .information
            .and_then(|info| info.category)
            .and_then(|category| category.meta)
            .and_then(|meta| meta.filename)
            .unwrap_or_default();

        Sample {
            state: doc
                .state
                .as_deref()
                .map(PlayerState::from_wire)
                .unwrap_or(PlayerState::Stopped),
            position_ratio: finite_or_zero(doc.position).clamp(0.0, 1.0),
            time_seconds: finite_or_zero(doc.time).max(0.0),
            length_seconds: finite_or_zero(doc.length).max(0.0),
            title,
        }
    }
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}
