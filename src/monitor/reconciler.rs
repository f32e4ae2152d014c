//! Turns one status sample into the next watch record and the events to emit.
//!
//! Everything here is pure: no clock, no I/O. The controller passes the
//! previous record, the per-session flags and the current time, and applies
//! the result.

use chrono::{DateTime, Utc};

use crate::db::WatchRecord;
use crate::player::{PlayerState, Sample};

use super::events::{EndReason, MonitorEvent};

/// Per-session flags that make counting and completion happen once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionProgress {
    /// `watch_count` already incremented for this session.
    pub counted: bool,
    /// `Completed` already emitted for this session.
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Record to persist, `None` when the sample carried no progress.
    pub record: Option<WatchRecord>,
    pub events: Vec<MonitorEvent>,
    pub session_ended: Option<EndReason>,
    pub progress: SessionProgress,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciler {
    completion_threshold: f64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(0.8)
    }
}

impl Reconciler {
    pub fn new(completion_threshold: f64) -> Self {
        Self {
            completion_threshold: completion_threshold.clamp(0.0, 1.0),
        }
    }

    pub fn reconcile(
        &self,
        target_path: &str,
        previous: Option<&WatchRecord>,
        progress: SessionProgress,
        sample: &Sample,
        now: DateTime<Utc>,
    ) -> Reconciliation {
        if !sample.is_progressing() {
            let reason = if sample.state == PlayerState::Stopped {
                EndReason::PlayerStopped
            } else {
                EndReason::NothingPlaying
            };
            return Reconciliation {
                record: None,
                events: Vec::new(),
                session_ended: Some(reason),
                progress,
            };
        }

        let mut progress = progress;
        let ratio = sample.position_ratio.clamp(0.0, 1.0);
        let percentage = (ratio * 100.0).round() as u8;

        let mut record = previous
            .cloned()
            .unwrap_or_else(|| WatchRecord::for_path(target_path, now));

        if !progress.counted {
            record.watch_count = record.watch_count.saturating_add(1);
            progress.counted = true;
        }

        record.last_position = sample.time_seconds.max(0.0);
        if sample.length_seconds > record.total_duration {
            record.total_duration = sample.length_seconds;
        }
        if record.total_duration > 0.0 {
            record.watched_percentage = (record.last_position / record.total_duration * 100.0)
                .round()
                .clamp(0.0, 100.0);
        }
        record.watched_date = now;

        let mut events = vec![MonitorEvent::ProgressUpdated {
            file_path: target_path.to_string(),
            position: record.last_position,
            length: record.total_duration,
            percentage,
        }];

        if !progress.completed && ratio > self.completion_threshold {
            events.push(MonitorEvent::Completed {
                file_path: target_path.to_string(),
            });
            progress.completed = true;
        }

        Reconciliation {
            record: Some(record),
            events,
            session_ended: None,
            progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "/videos/film.mkv";

    fn sample(state: PlayerState, ratio: f64, time: f64, length: f64) -> Sample {
        Sample {
            state,
            position_ratio: ratio,
            time_seconds: time,
            length_seconds: length,
            title: "film.mkv".into(),
        }
    }

    fn playing(ratio: f64, time: f64, length: f64) -> Sample {
        sample(PlayerState::Playing, ratio, time, length)
    }

    fn run(samples: &[Sample]) -> (Option<WatchRecord>, Vec<MonitorEvent>) {
        let reconciler = Reconciler::default();
        let mut record = None;
        let mut progress = SessionProgress::default();
        let mut events = Vec::new();
        for s in samples {
            let out = reconciler.reconcile(PATH, record.as_ref(), progress, s, Utc::now());
            progress = out.progress;
            if out.record.is_some() {
                record = out.record;
            }
            events.extend(out.events);
        }
        (record, events)
    }

    #[test]
    fn stopped_or_zero_position_ends_session_without_events() {
        let reconciler = Reconciler::default();
        let now = Utc::now();

        for (s, reason) in [
            (sample(PlayerState::Stopped, 0.5, 50.0, 100.0), EndReason::PlayerStopped),
            (playing(0.0, 0.0, 100.0), EndReason::NothingPlaying),
            (sample(PlayerState::Paused, 0.0, 0.0, 0.0), EndReason::NothingPlaying),
        ] {
            let out = reconciler.reconcile(PATH, None, SessionProgress::default(), &s, now);
            assert!(out.record.is_none());
            assert!(out.events.is_empty());
            assert_eq!(out.session_ended, Some(reason));
            assert_eq!(out.progress, SessionProgress::default());
        }
    }

    #[test]
    fn three_sample_stream_completes_once_on_the_last_sample() {
        let (record, events) = run(&[
            playing(0.1, 10.0, 100.0),
            playing(0.5, 50.0, 100.0),
            playing(0.85, 85.0, 100.0),
        ]);

        let progress = |position, percentage| MonitorEvent::ProgressUpdated {
            file_path: PATH.into(),
            position,
            length: 100.0,
            percentage,
        };
        assert_eq!(
            events,
            vec![
                progress(10.0, 10),
                progress(50.0, 50),
                progress(85.0, 85),
                MonitorEvent::Completed {
                    file_path: PATH.into()
                },
            ]
        );

        let record = record.unwrap();
        assert_eq!(record.last_position, 85.0);
        assert_eq!(record.total_duration, 100.0);
        assert_eq!(record.watched_percentage, 85.0);
        assert_eq!(record.watch_count, 1);
    }

    #[test]
    fn completion_is_emitted_once_across_many_ticks() {
        let samples: Vec<_> = (0..50)
            .map(|i| playing(0.81 + i as f64 * 0.001, 81.0 + i as f64 * 0.1, 100.0))
            .collect();
        let (record, events) = run(&samples);

        let completed = events
            .iter()
            .filter(|e| matches!(e, MonitorEvent::Completed { .. }))
            .count();
        assert_eq!(completed, 1);
        assert_eq!(events.len(), 51);
        assert_eq!(record.unwrap().watch_count, 1);
    }

    #[test]
    fn threshold_is_strict() {
        let (_, events) = run(&[playing(0.8, 80.0, 100.0)]);
        assert!(!events.iter().any(|e| matches!(e, MonitorEvent::Completed { .. })));
    }

    #[test]
    fn watch_count_increments_once_per_session() {
        let reconciler = Reconciler::default();
        let now = Utc::now();
        let mut existing = WatchRecord::for_path(PATH, now);
        existing.watch_count = 4;

        let first = reconciler.reconcile(
            PATH,
            Some(&existing),
            SessionProgress::default(),
            &playing(0.9, 90.0, 100.0),
            now,
        );
        assert_eq!(first.record.as_ref().unwrap().watch_count, 5);

        let second = reconciler.reconcile(
            PATH,
            first.record.as_ref(),
            first.progress,
            &playing(0.95, 95.0, 100.0),
            now,
        );
        assert_eq!(second.record.unwrap().watch_count, 5);
        assert!(second.progress.counted && second.progress.completed);
    }

    #[test]
    fn known_duration_is_never_lowered() {
        let (record, events) = run(&[
            playing(0.2, 20.0, 100.0),
            playing(0.3, 30.0, 0.0),
            playing(0.4, 40.0, 90.0),
        ]);

        let record = record.unwrap();
        assert_eq!(record.total_duration, 100.0);
        assert_eq!(record.last_position, 40.0);
        assert_eq!(record.watched_percentage, 40.0);
        assert!(events.iter().all(|e| match e {
            MonitorEvent::ProgressUpdated { length, .. } => *length == 100.0,
            _ => true,
        }));
    }

    #[test]
    fn unknown_duration_leaves_percentage_unchanged() {
        let reconciler = Reconciler::default();
        let now = Utc::now();
        let mut existing = WatchRecord::for_path(PATH, now);
        existing.watched_percentage = 12.0;

        let out = reconciler.reconcile(
            PATH,
            Some(&existing),
            SessionProgress::default(),
            &playing(0.5, 30.0, 0.0),
            now,
        );
        let record = out.record.unwrap();
        assert_eq!(record.watched_percentage, 12.0);
        assert_eq!(record.last_position, 30.0);
        assert_eq!(
            out.events[0],
            MonitorEvent::ProgressUpdated {
                file_path: PATH.into(),
                position: 30.0,
                length: 0.0,
                percentage: 50,
            }
        );
    }

    #[test]
    fn paused_samples_still_report_progress() {
        let (record, events) = run(&[sample(PlayerState::Paused, 0.25, 25.0, 100.0)]);
        assert_eq!(events.len(), 1);
        assert_eq!(record.unwrap().watched_percentage, 25.0);
    }

    #[test]
    fn first_observation_derives_the_file_name() {
        let (record, _) = run(&[playing(0.1, 1.0, 10.0)]);
        let record = record.unwrap();
        assert_eq!(record.file_path, PATH);
        assert_eq!(record.file_name, "film.mkv");
    }
}
