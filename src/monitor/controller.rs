use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    db::normalize_path_key,
    player::{PollError, Sample, StatusSource},
    settings::MonitorSettings,
};

use super::{
    events::{EndReason, MonitorEvent},
    reconciler::Reconciler,
    state::{MonitorState, MonitorStatus},
    store::WatchStore,
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub const EVENT_CHANNEL_CAPACITY: usize = 64;

struct SessionHandle {
    id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the single active monitoring session and its polling task.
#[derive(Clone)]
pub struct MonitorController {
    state: Arc<Mutex<MonitorState>>,
    ticker: Arc<Mutex<Option<SessionHandle>>>,
    source: Arc<dyn StatusSource>,
    store: Arc<dyn WatchStore>,
    events: broadcast::Sender<MonitorEvent>,
    reconciler: Reconciler,
    poll_interval: Duration,
    max_consecutive_failures: u32,
    verbose: bool,
}

impl MonitorController {
    pub fn new(
        source: Arc<dyn StatusSource>,
        store: Arc<dyn WatchStore>,
        settings: &MonitorSettings,
    ) -> Self {
        let verbose = std::env::var("MEDIATRACKER_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            state: Arc::new(Mutex::new(MonitorState::new())),
            ticker: Arc::new(Mutex::new(None)),
            source,
            store,
            events,
            reconciler: Reconciler::new(settings.completion_threshold),
            poll_interval: settings.poll_interval(),
            max_consecutive_failures: settings.max_consecutive_failures,
            verbose,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> MonitorState {
        self.state.lock().await.clone()
    }

    /// One poll outside the timer cadence. Does not touch the session.
    pub async fn get_live_status(&self) -> Result<Sample, PollError> {
        self.source.poll().await
    }

    /// Starts monitoring `file_path`, superseding any running session.
    pub async fn start(&self, file_path: &str) -> Result<MonitorState> {
        let file_path = file_path.trim();
        if file_path.is_empty() {
            bail!("file path must not be empty");
        }

        let mut ticker = self.ticker.lock().await;
        if let Some(previous) = ticker.take() {
            self.shut_down(previous).await;
        }

        // Read after the old task is joined so its last write is visible.
        let previous_record = match self.store.get(file_path).await {
            Ok(record) => record,
            Err(err) => {
                self.state.lock().await.reset();
                return Err(err)
                    .with_context(|| format!("failed to load watch state for {file_path}"));
            }
        };

        let session_id = Uuid::new_v4();
        let snapshot = {
            let mut state = self.state.lock().await;
            state.begin_session(session_id, file_path.to_string(), Utc::now(), previous_record);
            state.clone()
        };

        let cancel = CancellationToken::new();
        let worker = SessionWorker {
            session_id,
            cancel: cancel.clone(),
            state: self.state.clone(),
            source: self.source.clone(),
            store: self.store.clone(),
            events: self.events.clone(),
            reconciler: self.reconciler,
            max_consecutive_failures: self.max_consecutive_failures,
            verbose: self.verbose,
        };
        let handle = tokio::spawn(worker.run(self.poll_interval));

        *ticker = Some(SessionHandle {
            id: session_id,
            cancel,
            handle,
        });

        log_info!("Monitoring {file_path} (session {session_id})");
        Ok(snapshot)
    }

    /// Stops the active session. Returns false when there was nothing to stop.
    pub async fn stop(&self) -> bool {
        let mut ticker = self.ticker.lock().await;
        match ticker.take() {
            Some(session) => self.shut_down(session).await,
            None => false,
        }
    }

    /// Deletes the watch record of `file_path`. A session tracking the same
    /// file is stopped first, otherwise its next tick would write the row back.
    pub async fn forget(&self, file_path: &str) -> Result<bool> {
        let mut ticker = self.ticker.lock().await;

        let key = normalize_path_key(file_path);
        let tracking = {
            let state = self.state.lock().await;
            state.status == MonitorStatus::Active
                && state.target_path.as_deref().map(normalize_path_key) == Some(key)
        };
        if tracking {
            if let Some(session) = ticker.take() {
                self.shut_down(session).await;
            }
        }

        self.store.remove(file_path).await
    }

    async fn shut_down(&self, session: SessionHandle) -> bool {
        session.cancel.cancel();

        let was_active = {
            let mut state = self.state.lock().await;
            let active = state.is_current(session.id);
            if active {
                state.status = MonitorStatus::Stopping;
            }
            active
        };

        if let Err(err) = session.handle.await {
            log_error!("monitor task for session {} failed to join: {err}", session.id);
        }

        if was_active {
            let mut state = self.state.lock().await;
            if let Some(path) = state.target_path.as_deref() {
                log_info!("Stopped monitoring {path} (session {})", session.id);
            }
            state.reset();
        }
        was_active
    }
}

enum TickOutcome {
    Continue,
    Finished,
}

/// Everything the polling task needs; lives for one session.
struct SessionWorker {
    session_id: Uuid,
    cancel: CancellationToken,
    state: Arc<Mutex<MonitorState>>,
    source: Arc<dyn StatusSource>,
    store: Arc<dyn WatchStore>,
    events: broadcast::Sender<MonitorEvent>,
    reconciler: Reconciler,
    max_consecutive_failures: u32,
    verbose: bool,
}

impl SessionWorker {
    async fn run(self, poll_interval: Duration) {
        let mut interval = time::interval_at(Instant::now() + poll_interval, poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            // A superseded poll is dropped before it can produce a result.
            let polled = tokio::select! {
                _ = self.cancel.cancelled() => break,
                polled = self.source.poll() => polled,
            };

            if let TickOutcome::Finished = self.apply(polled).await {
                break;
            }
        }

        if self.verbose {
            log_info!("monitor task for session {} exited", self.session_id);
        }
    }

    async fn apply(&self, polled: Result<Sample, PollError>) -> TickOutcome {
        let mut state = self.state.lock().await;
        if self.cancel.is_cancelled() || !state.is_current(self.session_id) {
            return TickOutcome::Finished;
        }

        let Some(file_path) = state.target_path.clone() else {
            return TickOutcome::Finished;
        };
        state.ticks += 1;

        let sample = match polled {
            Ok(sample) => sample,
            Err(err) => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                log_warn!(
                    "status poll failed for {file_path} ({} in a row): {err}",
                    state.consecutive_failures
                );
                if self.max_consecutive_failures > 0
                    && state.consecutive_failures >= self.max_consecutive_failures
                {
                    self.end_session(&mut state, file_path, EndReason::PlayerUnreachable);
                    return TickOutcome::Finished;
                }
                return TickOutcome::Continue;
            }
        };

        state.consecutive_failures = 0;
        if self.verbose {
            log_info!(
                "tick {} {file_path}: {} {:.3} {:.1}/{:.1}s",
                state.ticks,
                sample.state.as_str(),
                sample.position_ratio,
                sample.time_seconds,
                sample.length_seconds
            );
        }

        let outcome = self.reconciler.reconcile(
            &file_path,
            state.record.as_ref(),
            state.progress,
            &sample,
            Utc::now(),
        );
        state.progress = outcome.progress;

        if let Some(record) = outcome.record {
            // Written under the state lock so a newer session cannot write first.
            if let Err(err) = self.store.upsert(&record).await {
                log_error!("failed to persist watch state for {file_path}: {err:#}");
                self.emit(MonitorEvent::PersistFailed {
                    file_path: file_path.clone(),
                    message: format!("{err:#}"),
                });
            }
            state.record = Some(record);
        }

        for event in outcome.events {
            if let MonitorEvent::ProgressUpdated { percentage, .. } = &event {
                state.last_percentage = Some(*percentage);
            }
            self.emit(event);
        }

        match outcome.session_ended {
            Some(reason) => {
                self.end_session(&mut state, file_path, reason);
                TickOutcome::Finished
            }
            None => TickOutcome::Continue,
        }
    }

    fn end_session(&self, state: &mut MonitorState, file_path: String, reason: EndReason) {
        log_info!(
            "Session {} for {file_path} ended: {}",
            self.session_id,
            reason.as_str()
        );
        state.reset();
        self.emit(MonitorEvent::SessionEnded { file_path, reason });
    }

    fn emit(&self, event: MonitorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
