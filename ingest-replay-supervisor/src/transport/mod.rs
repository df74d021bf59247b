//! Transport sessions
//!
//! A transport owns the outgoing [`IngestWriter`] and the connection the
//! writer's bytes are flushed to. Connection loss is reported out of band as
//! a [`TransportEvent`] on the channel handed to [`Transport::connect`], so
//! the supervisor never has to poll.

mod memory;
mod tcp;

pub use memory::MemoryTransport;
pub use tcp::TcpTransport;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;
use ingest_replay_core::writer::IngestWriter;

/// Asynchronous session notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// The session is established
    Connected,
    /// The session failed with an error code
    Error(i32),
    /// The peer closed the session
    Closed,
}

/// Sending half of the event channel
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiving half of the event channel
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Create an event channel
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// How a successful [`Transport::connect`] finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// The session is usable now
    Complete,
    /// A [`TransportEvent::Connected`] will follow on the event channel
    Pending,
}

/// A session the supervisor can open, write through and drop
#[async_trait]
pub trait Transport: Send {
    /// Writer that encodes ingest messages for this transport
    type Writer: IngestWriter + Send;

    /// Human-readable peer, for logs
    fn peer(&self) -> String;

    /// Open a session, reporting later failures on `events`
    async fn connect(&mut self, events: EventSender) -> Result<Handshake, TransportError>;

    /// Push everything the writer has buffered
    async fn flush(&mut self) -> Result<(), TransportError>;

    /// Drop the session and anything not yet flushed
    async fn close(&mut self);

    /// The writer messages are encoded into
    fn writer(&mut self) -> &mut Self::Writer;
}
