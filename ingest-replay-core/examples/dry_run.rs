//! Dry run: replay one pass of a recording to stdout
//!
//! Prints each anonymized message as a JSON line, sleeping between messages
//! the way the recording did. Useful for checking a recording before
//! pointing it at a collector.
//!
//! ```text
//! cargo run -p ingest-replay-core --example dry_run -- ingest.json
//! ```

use std::io::Write;

use ingest_replay_core::prelude::*;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: dry_run <recording.json>")?;

    let store = RecordingStore::load(&path)?;
    eprintln!("{} records in {}", store.len(), path);

    let dispatcher = Dispatcher::new(Anonymizer::new());
    eprintln!("session prefix {}", dispatcher.anonymizer().session_prefix());

    let mut scheduler = ReplayScheduler::new(store, dispatcher).loop_recording(false);
    let mut writer = JsonLinesWriter::default();
    let mut stdout = std::io::stdout().lock();

    scheduler.start();
    loop {
        let tick = scheduler.tick(&mut writer);
        stdout.write_all(&writer.take_buffer())?;
        stdout.flush()?;
        match tick {
            Tick::Continue(delay) => std::thread::sleep(delay),
            Tick::Halted => break,
        }
    }

    let stats = scheduler.stats();
    eprintln!(
        "{} written, {} malformed, {} unknown",
        stats.dispatched, stats.skipped_malformed, stats.skipped_unknown
    );
    Ok(())
}
