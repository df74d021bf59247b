//! End-to-end replay of a recording file through the JSON-lines writer

use std::io::Write;
use std::time::Duration;

use ingest_replay_core::prelude::*;
use tempfile::NamedTempFile;

const RECORDING: &str = r#"[
  {"name": "pid_info", "timestamp": 1000, "rpc_id": 1, "ref": 0,
   "data": {"pid": 4242, "comm": "postgres"}},
  {"name": "new_sock_info", "timestamp": 1500,
   "data": {"pid": 4242, "sk": 77}},
  {"name": "set_state_ipv4", "timestamp": 1800,
   "data": {"dest": 167772161, "src": 167772162, "dport": 5432, "sport": 40000, "sk": 77, "tx_rx": 1}},
  {"name": "dns_response", "timestamp": 1900,
   "data": {"sk": 77}},
  {"name": "socket_stats", "timestamp": 2600,
   "data": {"sk": 77, "diff_bytes": 1.5, "diff_delivered": 1, "diff_retrans": 0, "max_srtt": 9, "is_rx": 0}},
  {"name": "close_sock_info", "timestamp": 3000,
   "data": {"sk": 77}}
]"#;

fn recording_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents.as_bytes()).expect("Failed to write recording");
    file
}

fn scheduler(seed: u64) -> (NamedTempFile, ReplayScheduler) {
    let file = recording_file(RECORDING);
    let store = RecordingStore::load(file.path()).expect("recording should load");
    let scheduler = ReplayScheduler::new(store, Dispatcher::new(Anonymizer::with_seed(seed)));
    (file, scheduler)
}

#[test]
fn test_full_pass() {
    let (_file, mut scheduler) = scheduler(5);
    let mut writer = JsonLinesWriter::default();
    scheduler.start();

    let mut delays = Vec::new();
    for _ in 0..6 {
        match scheduler.tick(&mut writer) {
            Tick::Continue(delay) => delays.push(delay),
            Tick::Halted => panic!("scheduler halted mid-recording"),
        }
    }

    let nanos = |n| Duration::from_nanos(n);
    assert_eq!(
        delays,
        [nanos(500), nanos(300), nanos(100), nanos(700), nanos(400), Duration::ZERO]
    );

    let names: Vec<_> = writer
        .peek_messages()
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(
        names,
        ["pid_info", "new_sock_info", "set_state_ipv4", "close_sock_info"]
    );

    let stats = scheduler.stats();
    assert_eq!(stats.dispatched, 4);
    assert_eq!(stats.skipped_unknown, 1);
    assert_eq!(stats.skipped_malformed, 1);
    assert_eq!(stats.cycles, 1);
    assert_eq!(scheduler.position(), 0);
}

#[test]
fn test_identifiers_are_anonymized() {
    let (_file, mut scheduler) = scheduler(5);
    let prefix = scheduler.dispatcher().anonymizer().session_prefix().to_string();
    let mut writer = JsonLinesWriter::default();
    scheduler.start();
    for _ in 0..3 {
        scheduler.tick(&mut writer);
    }

    let messages = writer.peek_messages().unwrap();
    assert_eq!(messages[0].data["comm"], format!("{prefix}postgres"));
    assert_ne!(messages[2].data["dest"], 167772161u64);
    assert_ne!(messages[2].data["src"], 167772162u64);
    assert_eq!(messages[2].data["dport"], 5432);
}

#[test]
fn test_second_cycle_repeats_first() {
    let (_file, mut scheduler) = scheduler(8);
    let mut first = JsonLinesWriter::default();
    let mut second = JsonLinesWriter::default();
    scheduler.start();

    for _ in 0..6 {
        scheduler.tick(&mut first);
    }
    for _ in 0..6 {
        scheduler.tick(&mut second);
    }

    let strip = |w: &JsonLinesWriter| -> Vec<_> {
        w.peek_messages()
            .unwrap()
            .into_iter()
            .map(|m| (m.name, m.data))
            .collect()
    };
    assert_eq!(strip(&first), strip(&second));
}

#[test]
fn test_replayed_output_is_a_recording() {
    let (_file, mut scheduler) = scheduler(2);
    let mut writer = JsonLinesWriter::default();
    scheduler.start();
    for _ in 0..6 {
        scheduler.tick(&mut writer);
    }

    let messages = writer.peek_messages().unwrap();
    let json = serde_json::to_string(&messages).unwrap();
    let store = RecordingStore::from_json_str(&json).unwrap();

    assert_eq!(store.len(), 4);
    assert_eq!(store.records()[3].name, "close_sock_info");
    assert_eq!(store.records()[3].fields.u64("sk"), Ok(77));
}

#[test]
fn test_single_record_recording_is_rejected() {
    let file = recording_file(r#"[{"name": "pid_info", "timestamp": 1, "data": {}}]"#);
    let err = RecordingStore::load(file.path()).unwrap_err();
    assert!(matches!(err, ReplayError::TooFewRecords { found: 1 }));
}
