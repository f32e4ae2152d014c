use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;

use super::status::Sample;
use crate::settings::PlayerSettings;

/// Why a single status poll produced no sample. Neither kind is fatal; the
/// monitor simply tries again on its next tick.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("player unreachable: {0}")]
    Unreachable(String),
    #[error("malformed status response: {0}")]
    MalformedResponse(String),
}

impl PollError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, PollError::Unreachable(_))
    }
}

/// Anything that can report the player's live status once.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn poll(&self) -> Result<Sample, PollError>;
}

/// HTTP client for the player's `status.json` endpoint. Makes exactly one
/// request per poll, bounded by its own timeout.
pub struct StatusClient {
    http: reqwest::Client,
    url: String,
    password: String,
}

impl StatusClient {
    pub fn new(settings: &PlayerSettings) -> Result<Self> {
        Self::with_url(
            settings.status_url(),
            settings.password.clone(),
            settings.status_timeout(),
        )
    }

    pub fn with_url(
        url: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("failed to build player status HTTP client")?;

        Ok(Self {
            http,
            url: url.into(),
            password: password.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StatusSource for StatusClient {
    async fn poll(&self) -> Result<Sample, PollError> {
        let response = self
            .http
            .get(&self.url)
            .basic_auth("", Some(&self.password))
            .send()
            .await
            .map_err(|err| PollError::Unreachable(describe(&err)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollError::MalformedResponse(format!(
                "unexpected HTTP status {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|err| PollError::Unreachable(describe(&err)))?;

        Sample::from_status_json(&body)
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection refused".to_string()
    } else {
        err.to_string()
    }
}
