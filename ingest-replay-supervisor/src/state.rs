//! Session state machine
//!
//! [`transition`] is the whole state table. It performs no I/O; the
//! supervisor executes the returned [`Action`]s in order.

use std::fmt;

/// Where the connection session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing attempted yet
    #[default]
    Disconnected,
    /// Waiting for a connect attempt to finish
    Connecting,
    /// Session is up and playback is running
    Connected,
    /// Waiting out the jittered delay before reconnecting
    Backoff,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Backoff => write!(f, "backoff"),
        }
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Supervisor was started
    Start,
    /// The transport reports an established session
    Connected,
    /// The transport failed or closed; the code is absent for a clean close
    Failed(Option<i32>),
    /// The backoff delay elapsed
    ReconnectDue,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Open a transport session
    Connect,
    /// Start playback from the first record
    StartReplay,
    /// Halt playback
    StopReplay,
    /// Rewind the read cursor
    ResetCursor,
    /// Drop the current session, if any
    CloseTransport,
    /// Arm the jittered reconnect timer
    ArmBackoff,
}

/// Apply `event` to `state`.
///
/// Events that make no sense in the current state leave it unchanged and
/// request nothing.
pub fn transition(state: SessionState, event: SessionEvent) -> (SessionState, Vec<Action>) {
    use Action::*;
    use SessionState as S;

    match (state, event) {
        (S::Disconnected, SessionEvent::Start) => (S::Connecting, vec![Connect]),

        (S::Connecting, SessionEvent::Connected) => (S::Connected, vec![StartReplay]),

        (S::Connecting | S::Connected, SessionEvent::Failed(_)) => (
            S::Backoff,
            vec![StopReplay, ResetCursor, CloseTransport, ArmBackoff],
        ),

        (S::Backoff, SessionEvent::ReconnectDue) => (S::Connecting, vec![Connect]),

        (S::Backoff, SessionEvent::Failed(_)) => (S::Backoff, vec![ArmBackoff]),

        (state, _) => (state, Vec::new()),
    }
}
