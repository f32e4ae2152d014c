use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::WatchRecord;

use super::reconciler::SessionProgress;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum MonitorStatus {
    #[default]
    Idle,
    Active,
    Stopping,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MonitorState {
    pub status: MonitorStatus,
    pub session_id: Option<Uuid>,
    pub target_path: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ticks: u64,
    pub consecutive_failures: u32,
    pub last_percentage: Option<u8>,
    #[serde(skip)]
    pub progress: SessionProgress,
    /// Latest reconciled record; used as `previous` for the next tick even
    /// when persisting it failed.
    #[serde(skip)]
    pub record: Option<WatchRecord>,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_session(
        &mut self,
        session_id: Uuid,
        target_path: String,
        started_at: DateTime<Utc>,
        record: Option<WatchRecord>,
    ) {
        *self = Self {
            status: MonitorStatus::Active,
            session_id: Some(session_id),
            target_path: Some(target_path),
            started_at: Some(started_at),
            record,
            ..Self::default()
        };
    }

    pub fn is_current(&self, session_id: Uuid) -> bool {
        self.status == MonitorStatus::Active && self.session_id == Some(session_id)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
