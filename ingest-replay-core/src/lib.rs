//! # Ingest Replay
//!
//! Replays recorded kernel and network telemetry against an ingest pipeline,
//! reproducing production-like collector load without kernel instrumentation.
//!
//! - Recordings are parsed once into an ordered, immutable store
//! - Transient identifiers are anonymized per run
//! - Each record maps onto one strongly typed ingest write
//! - Original inter-event timing is reconstructed from timestamps
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ingest_replay_core::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let store = RecordingStore::load("ingest.json")?;
//!     let dispatcher = Dispatcher::new(Anonymizer::with_seed(42));
//!     let mut scheduler = ReplayScheduler::new(store, dispatcher);
//!     let mut writer = JsonLinesWriter::default();
//!
//!     scheduler.start();
//!     while let Tick::Continue(delay) = scheduler.tick(&mut writer) {
//!         std::thread::sleep(delay);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! This crate holds everything that does not touch the network. Session
//! handling, reconnect backoff and the control loop live in
//! `ingest-replay-supervisor`.

pub mod anonymize;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod recording;
pub mod schedule;
pub mod writer;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::anonymize::Anonymizer;
    pub use crate::config::{
        AnonymizerConfig, ConfigBuilder, IntakeConfig, PlaybackConfig, ReconnectConfig,
        RecordingConfig, ReplayConfig,
    };
    pub use crate::dispatch::{DispatchOutcome, Dispatcher};
    pub use crate::error::{ReplayError, Result};
    pub use crate::recording::{EventRecord, FieldError, FieldValue, Fields, RecordingStore};
    pub use crate::schedule::{ReplayScheduler, ReplayStats, Tick};
    pub use crate::writer::{IngestMessage, IngestWriter, JsonLinesWriter};
}
