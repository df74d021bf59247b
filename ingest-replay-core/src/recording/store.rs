//! Recording store: the parsed recording plus its read cursor

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::record::EventRecord;
use crate::error::{ReplayError, Result};

/// Fewest records that still have an inter-event delay to reconstruct
pub const MIN_RECORDS: usize = 2;

/// Result of moving the cursor forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    /// Index the cursor now points at
    pub position: usize,
    /// The cursor went past the last record and is back at the first
    pub wrapped: bool,
}

/// An immutable, ordered recording with a single read cursor
#[derive(Debug, Clone)]
pub struct RecordingStore {
    source: Option<PathBuf>,
    records: Vec<EventRecord>,
    cursor: usize,
}

impl RecordingStore {
    /// Load a recording from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not a JSON array of event
    /// objects, or holds fewer than two records.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut store = Self::parse(&contents, path)?;
        store.source = Some(path.to_path_buf());
        debug!(
            "loaded {} records from {}",
            store.records.len(),
            path.display()
        );
        Ok(store)
    }

    /// Parse a recording held in memory
    pub fn from_json_str(contents: &str) -> Result<Self> {
        Self::parse(contents, Path::new("<memory>"))
    }

    /// Build a store from records that are already parsed
    pub fn from_records(records: Vec<EventRecord>) -> Result<Self> {
        if records.len() < MIN_RECORDS {
            return Err(ReplayError::TooFewRecords {
                found: records.len(),
            });
        }
        Ok(Self {
            source: None,
            records,
            cursor: 0,
        })
    }

    fn parse(contents: &str, path: &Path) -> Result<Self> {
        let value: Value = serde_json::from_str(contents).map_err(|e| ReplayError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let entries = match value {
            Value::Array(entries) => entries,
            _ => {
                return Err(ReplayError::Parse {
                    path: path.to_path_buf(),
                    reason: "top-level value must be an array of messages".to_string(),
                });
            }
        };

        if entries.len() < MIN_RECORDS {
            return Err(ReplayError::TooFewRecords {
                found: entries.len(),
            });
        }

        let records = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                EventRecord::from_json(entry)
                    .map_err(|reason| ReplayError::InvalidRecord { index, reason })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_records(records)
    }

    /// File the recording was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false: a store holds at least two records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Cursor position
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Record under the cursor
    pub fn current(&self) -> &EventRecord {
        &self.records[self.cursor]
    }

    /// Record after the cursor, or `None` at the last record
    pub fn peek_next(&self) -> Option<&EventRecord> {
        self.records.get(self.cursor + 1)
    }

    /// Move to the next record, wrapping to the first after the last
    pub fn advance(&mut self) -> Advance {
        let wrapped = self.cursor + 1 >= self.records.len();
        self.cursor = if wrapped { 0 } else { self.cursor + 1 };
        Advance {
            position: self.cursor,
            wrapped,
        }
    }

    /// Rewind to the first record
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// All records in order
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }
}
