//! Recorded ingest messages
//!
//! A recording is the JSON output of the intake wire-to-json helper: an
//! array of messages, each with a `name`, a nanosecond `timestamp` and a
//! `data` object. It is parsed once at startup and never changes afterwards,
//! apart from the read cursor the replay scheduler moves through it.
//!
//! # Example
//!
//! ```rust,no_run
//! use ingest_replay_core::recording::RecordingStore;
//!
//! let mut store = RecordingStore::load("ingest.json")?;
//! let first = store.current().name.clone();
//! let step = store.advance();
//! assert!(!step.wrapped || store.position() == 0);
//! # let _ = first;
//! # Ok::<(), ingest_replay_core::error::ReplayError>(())
//! ```

mod record;
mod store;

pub use record::{fixed_bytes, EventRecord, FieldError, FieldValue, Fields};
pub use store::{Advance, RecordingStore, MIN_RECORDS};
