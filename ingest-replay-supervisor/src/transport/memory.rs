//! In-process transport that keeps everything it is sent

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;

use super::{EventSender, Handshake, Transport, TransportEvent};
use crate::error::TransportError;
use ingest_replay_core::writer::{IngestMessage, JsonLinesWriter};

/// Scripted outcome of the next connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectScript {
    Succeed,
    Defer,
    Refuse,
    Hang,
}

/// Transport that records flushed messages in memory.
///
/// Connect and flush outcomes can be scripted, and session events can be
/// injected through [`MemoryTransport::inject`] once a session exists.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    writer: JsonLinesWriter,
    sent: Vec<IngestMessage>,
    script: VecDeque<ConnectScript>,
    events: Option<EventSender>,
    fail_next_flush: bool,
    connects: usize,
    closes: usize,
}

impl MemoryTransport {
    /// Transport whose connects always succeed
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next unscripted connect attempt
    pub fn refuse_next_connect(&mut self) -> &mut Self {
        self.script.push_back(ConnectScript::Refuse);
        self
    }

    /// Make the next connect complete only when a `Connected` event is injected
    pub fn defer_next_connect(&mut self) -> &mut Self {
        self.script.push_back(ConnectScript::Defer);
        self
    }

    /// Make the next connect attempt never finish
    pub fn hang_next_connect(&mut self) -> &mut Self {
        self.script.push_back(ConnectScript::Hang);
        self
    }

    /// Make the next connect succeed immediately
    pub fn accept_next_connect(&mut self) -> &mut Self {
        self.script.push_back(ConnectScript::Succeed);
        self
    }

    /// Fail the next flush that has data to send
    pub fn fail_next_flush(&mut self) -> &mut Self {
        self.fail_next_flush = true;
        self
    }

    /// Send an event on the current session's channel.
    ///
    /// Returns false when no session was ever opened.
    pub fn inject(&self, event: TransportEvent) -> bool {
        self.events
            .as_ref()
            .is_some_and(|events| events.send(event).is_ok())
    }

    /// Messages flushed so far, in order
    pub fn sent(&self) -> &[IngestMessage] {
        &self.sent
    }

    /// Connect attempts so far
    pub fn connects(&self) -> usize {
        self.connects
    }

    /// Sessions closed so far
    pub fn closes(&self) -> usize {
        self.closes
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Writer = JsonLinesWriter;

    fn peer(&self) -> String {
        "memory".to_string()
    }

    async fn connect(&mut self, events: EventSender) -> Result<Handshake, TransportError> {
        self.connects += 1;
        self.events = Some(events);
        match self.script.pop_front().unwrap_or(ConnectScript::Succeed) {
            ConnectScript::Succeed => Ok(Handshake::Complete),
            ConnectScript::Defer => Ok(Handshake::Pending),
            ConnectScript::Refuse => Err(TransportError::Connect {
                address: self.peer(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }),
            ConnectScript::Hang => std::future::pending().await,
        }
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        if self.writer.pending_bytes() == 0 {
            return Ok(());
        }
        if std::mem::take(&mut self.fail_next_flush) {
            self.writer.discard();
            return Err(TransportError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        let buffer = self.writer.take_buffer();
        self.sent.extend(JsonLinesWriter::decode(&buffer).map_err(io::Error::other)?);
        Ok(())
    }

    async fn close(&mut self) {
        self.closes += 1;
        self.writer.discard();
    }

    fn writer(&mut self) -> &mut JsonLinesWriter {
        &mut self.writer
    }
}
