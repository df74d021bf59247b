//! Replay scheduler
//!
//! Walks the recording one record per tick. Each tick dispatches the record
//! under the cursor, works out how long the caller should wait before the
//! next one, and advances the cursor. The scheduler never sleeps itself;
//! the supervisor's control loop owns the timer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::anonymize::Anonymizer;
use crate::config::ReplayConfig;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::error::{ReplayError, Result};
use crate::recording::RecordingStore;
use crate::writer::IngestWriter;

/// What the caller should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Tick again after the given delay
    Continue(Duration),
    /// Stop ticking until the scheduler is started again
    Halted,
}

/// Counters kept across the life of a scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    /// First time playback was started
    pub started_at: Option<DateTime<Utc>>,
    /// Records written
    pub dispatched: u64,
    /// Records skipped because their fields did not match
    pub skipped_malformed: u64,
    /// Records skipped because the message name has no handler
    pub skipped_unknown: u64,
    /// Completed passes over the whole recording
    pub cycles: u64,
}

impl ReplayStats {
    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Written => self.dispatched += 1,
            DispatchOutcome::Malformed(_) => self.skipped_malformed += 1,
            DispatchOutcome::Unknown => self.skipped_unknown += 1,
        }
    }
}

/// Delay between two recorded timestamps.
///
/// Uses the absolute difference, so an out-of-order recording yields a
/// positive delay instead of an underflow.
pub fn inter_event_delay(current: u64, next: u64) -> Duration {
    Duration::from_nanos(current.abs_diff(next))
}

/// Drives playback of one recording
#[derive(Debug)]
pub struct ReplayScheduler {
    store: RecordingStore,
    dispatcher: Dispatcher,
    running: bool,
    loop_recording: bool,
    stats: ReplayStats,
}

impl ReplayScheduler {
    /// Create a stopped scheduler that loops the recording
    pub fn new(store: RecordingStore, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            dispatcher,
            running: false,
            loop_recording: true,
            stats: ReplayStats::default(),
        }
    }

    /// Load the configured recording and set up anonymization and looping.
    ///
    /// # Errors
    ///
    /// Fails when no recording path is configured or the recording cannot
    /// be loaded.
    pub fn from_config(config: &ReplayConfig) -> Result<Self> {
        let path = config.recording.path.as_ref().ok_or_else(|| {
            ReplayError::Configuration(
                "no recording given (set recording.path or --ingest-file)".into(),
            )
        })?;
        let store = RecordingStore::load(path)?;
        let anonymizer = Anonymizer::from_seed(config.anonymizer.seed);
        debug!("session prefix {}", anonymizer.session_prefix());

        Ok(Self::new(store, Dispatcher::new(anonymizer))
            .loop_recording(config.replay.loop_recording))
    }

    /// Whether to wrap to the first record after the last one, or halt
    pub fn loop_recording(mut self, enabled: bool) -> Self {
        self.loop_recording = enabled;
        self
    }

    /// Arm playback from the first record
    pub fn start(&mut self) {
        self.store.reset();
        self.running = true;
        if self.stats.started_at.is_none() {
            self.stats.started_at = Some(Utc::now());
        }
        debug!("replay started at record 0 of {}", self.store.len());
    }

    /// Halt playback; the cursor stays where it is
    pub fn stop(&mut self) {
        if self.running {
            debug!("replay stopped at record {}", self.store.position());
        }
        self.running = false;
    }

    /// Rewind the cursor to the first record
    pub fn reset(&mut self) {
        self.store.reset();
    }

    /// Whether ticks will dispatch
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Cursor position in the recording
    pub fn position(&self) -> usize {
        self.store.position()
    }

    /// Dispatch the current record and advance.
    ///
    /// Returns the delay before the next record is due. After the last
    /// record the delay is zero and the cursor is back at the first one,
    /// unless looping is disabled, in which case the scheduler halts.
    pub fn tick<W>(&mut self, writer: &mut W) -> Tick
    where
        W: IngestWriter + ?Sized,
    {
        if !self.running {
            return Tick::Halted;
        }

        let record = self.store.current();
        let outcome = self.dispatcher.dispatch(record, writer);
        self.stats.record(&outcome);

        let delay = match self.store.peek_next() {
            Some(next) => inter_event_delay(record.timestamp, next.timestamp),
            None => Duration::ZERO,
        };

        let step = self.store.advance();
        if !step.wrapped {
            return Tick::Continue(delay);
        }

        self.stats.cycles += 1;
        if self.loop_recording {
            debug!("EOF reached, restarting");
            Tick::Continue(Duration::ZERO)
        } else {
            info!(
                "EOF reached after {} records, looping disabled",
                self.store.len()
            );
            self.running = false;
            Tick::Halted
        }
    }

    /// Counters so far
    pub fn stats(&self) -> &ReplayStats {
        &self.stats
    }

    /// The recording being replayed
    pub fn store(&self) -> &RecordingStore {
        &self.store
    }

    /// The dispatcher and its anonymizer
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::recording::{EventRecord, Fields};
    use crate::writer::JsonLinesWriter;

    fn sock(timestamp: u64, sk: u64) -> EventRecord {
        EventRecord::new("close_sock_info", timestamp, Fields::new().with("sk", sk))
    }

    fn scheduler(records: Vec<EventRecord>) -> ReplayScheduler {
        let store = RecordingStore::from_records(records).unwrap();
        ReplayScheduler::new(store, Dispatcher::new(Anonymizer::with_seed(3)))
    }

    fn written_sks(writer: &JsonLinesWriter) -> Vec<u64> {
        writer
            .peek_messages()
            .unwrap()
            .iter()
            .map(|m| m.data["sk"].as_u64().unwrap())
            .collect()
    }

    #[test]
    fn test_inter_event_delay() {
        assert_eq!(inter_event_delay(0, 100), Duration::from_nanos(100));
        assert_eq!(inter_event_delay(250, 100), Duration::from_nanos(150));
        assert_eq!(inter_event_delay(7, 7), Duration::ZERO);
    }

    #[test]
    fn test_delays_follow_timestamps() {
        let mut s = scheduler(vec![sock(0, 1), sock(100, 2), sock(250, 3)]);
        let mut w = JsonLinesWriter::default();
        s.start();

        assert_eq!(s.tick(&mut w), Tick::Continue(Duration::from_nanos(100)));
        assert_eq!(s.tick(&mut w), Tick::Continue(Duration::from_nanos(150)));
    }

    #[test]
    fn test_out_of_order_delays_are_absolute() {
        let mut s = scheduler(vec![sock(0, 1), sock(250, 2), sock(100, 3)]);
        let mut w = JsonLinesWriter::default();
        s.start();

        assert_eq!(s.tick(&mut w), Tick::Continue(Duration::from_nanos(250)));
        assert_eq!(s.tick(&mut w), Tick::Continue(Duration::from_nanos(150)));
    }

    #[test]
    fn test_wraparound() {
        let mut s = scheduler(vec![sock(10, 1), sock(20, 2)]);
        let mut w = JsonLinesWriter::default();
        s.start();

        assert_eq!(s.tick(&mut w), Tick::Continue(Duration::from_nanos(10)));
        assert_eq!(s.tick(&mut w), Tick::Continue(Duration::ZERO));
        assert_eq!(s.position(), 0);
        assert_eq!(s.stats().cycles, 1);

        s.tick(&mut w);
        assert_eq!(written_sks(&w), [1, 2, 1]);
    }

    #[test]
    fn test_full_cycle_writes_every_record_in_order() {
        let records: Vec<_> = (0..5).map(|i| sock(i * 1_000, i + 100)).collect();
        let mut s = scheduler(records);
        let mut w = JsonLinesWriter::default();
        s.start();

        for _ in 0..5 {
            s.tick(&mut w);
        }

        assert_eq!(written_sks(&w), [100, 101, 102, 103, 104]);
        assert_eq!(s.stats().dispatched, 5);
    }

    #[test]
    fn test_stopped_scheduler_does_not_dispatch() {
        let mut s = scheduler(vec![sock(0, 1), sock(5, 2)]);
        let mut w = JsonLinesWriter::default();

        assert_eq!(s.tick(&mut w), Tick::Halted);

        s.start();
        s.tick(&mut w);
        s.stop();
        assert_eq!(s.tick(&mut w), Tick::Halted);
        assert_eq!(w.pending_messages(), 1);
        assert_eq!(s.position(), 1);
    }

    #[test]
    fn test_restart_reproduces_first_cycle() {
        let mut s = scheduler(vec![sock(0, 1), sock(5, 2), sock(9, 3)]);
        let mut first = JsonLinesWriter::default();
        s.start();
        s.tick(&mut first);
        s.tick(&mut first);
        s.tick(&mut first);

        let mut second = JsonLinesWriter::default();
        s.tick(&mut second);
        s.stop();
        s.reset();
        s.start();
        s.start();
        second.discard();
        for _ in 0..3 {
            s.tick(&mut second);
        }

        assert_eq!(written_sks(&first), written_sks(&second));
    }

    #[test]
    fn test_no_loop_halts_after_last_record() {
        let mut s = scheduler(vec![sock(0, 1), sock(5, 2)]).loop_recording(false);
        let mut w = JsonLinesWriter::default();
        s.start();

        assert!(matches!(s.tick(&mut w), Tick::Continue(_)));
        assert_eq!(s.tick(&mut w), Tick::Halted);
        assert!(!s.is_running());
        assert_eq!(w.pending_messages(), 2);
        assert_eq!(s.stats().cycles, 1);
    }

    #[test]
    fn test_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingest.json");
        std::fs::write(
            &path,
            r#"[{"name":"tcp_syn_timeout","timestamp":1,"data":{"sk":1}},
               {"name":"tcp_syn_timeout","timestamp":2,"data":{"sk":2}}]"#,
        )
        .unwrap();

        let config = ConfigBuilder::new()
            .recording(&path)
            .seed(11)
            .loop_recording(false)
            .build();
        let s = ReplayScheduler::from_config(&config).unwrap();

        assert_eq!(s.store().len(), 2);
        assert_eq!(
            s.dispatcher().anonymizer().session_prefix(),
            Anonymizer::with_seed(11).session_prefix()
        );
        assert!(!s.loop_recording);
    }

    #[test]
    fn test_from_config_requires_recording() {
        let err = ReplayScheduler::from_config(&ReplayConfig::default()).unwrap_err();
        assert!(matches!(err, ReplayError::Configuration(_)));
    }

    #[test]
    fn test_skips_are_counted() {
        let mut s = scheduler(vec![
            sock(0, 1),
            EventRecord::new("mystery", 1, Fields::new()),
            EventRecord::new("close_sock_info", 2, Fields::new()),
        ]);
        let mut w = JsonLinesWriter::default();
        s.start();
        for _ in 0..3 {
            s.tick(&mut w);
        }

        let stats = s.stats();
        assert_eq!(stats.dispatched, 1);
        assert_eq!(stats.skipped_unknown, 1);
        assert_eq!(stats.skipped_malformed, 1);
        assert!(stats.started_at.is_some());
    }
}
