//! Connection supervisor: gates playback on session health

use serde::Serialize;
use std::time::Duration;
use tokio::time::{sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::ReconnectPolicy;
use crate::error::{Result, SupervisorError, TransportError};
use crate::state::{transition, Action, SessionEvent, SessionState};
use crate::transport::{
    event_channel, EventReceiver, EventSender, Handshake, Transport, TransportEvent,
};
use ingest_replay_core::config::ReplayConfig;
use ingest_replay_core::schedule::{ReplayScheduler, ReplayStats, Tick};

/// Summary returned when the control loop stops
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SupervisorReport {
    /// Sessions established
    pub connects: u64,
    /// Connect failures and session losses
    pub failures: u64,
    /// Playback counters
    pub stats: ReplayStats,
}

/// Drives a [`ReplayScheduler`] over a [`Transport`], reconnecting with
/// jittered backoff whenever the session is lost.
///
/// The control loop is [`run`](Self::run). The step methods (`begin`,
/// `handle`, `on_deadline`, `reconnect_due`) expose the same behavior one
/// event at a time.
#[derive(Debug)]
pub struct ConnectionSupervisor<T: Transport> {
    transport: T,
    scheduler: ReplayScheduler,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
    state: SessionState,
    deadline: Option<Instant>,
    events_tx: EventSender,
    events_rx: EventReceiver,
    shutdown: CancellationToken,
    finished: bool,
    connects: u64,
    failures: u64,
}

impl<T: Transport> ConnectionSupervisor<T> {
    /// Create a supervisor in the `Disconnected` state
    pub fn new(transport: T, scheduler: ReplayScheduler, policy: ReconnectPolicy) -> Self {
        let (events_tx, events_rx) = event_channel();
        Self {
            transport,
            scheduler,
            policy,
            connect_timeout: Duration::from_secs(10),
            state: SessionState::Disconnected,
            deadline: None,
            events_tx,
            events_rx,
            shutdown: CancellationToken::new(),
            finished: false,
            connects: 0,
            failures: 0,
        }
    }

    /// Build the scheduler and policy from configuration.
    ///
    /// # Errors
    ///
    /// Fails if the recording cannot be loaded.
    pub fn from_config(transport: T, config: &ReplayConfig) -> Result<Self> {
        let scheduler = ReplayScheduler::from_config(config)?;
        let policy = ReconnectPolicy::from_config(&config.reconnect);
        Ok(Self::new(transport, scheduler, policy).connect_timeout(config.intake.connect_timeout))
    }

    /// Upper bound on a single connect attempt
    pub fn connect_timeout(mut self, limit: Duration) -> Self {
        self.connect_timeout = limit;
        self
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// When the next tick or reconnect is due, if anything is scheduled
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once a non-looping recording has played to the end
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The replay scheduler
    pub fn scheduler(&self) -> &ReplayScheduler {
        &self.scheduler
    }

    /// The transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the transport, for scripting test transports
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Counters so far
    pub fn report(&self) -> SupervisorReport {
        SupervisorReport {
            connects: self.connects,
            failures: self.failures,
            stats: self.scheduler.stats().clone(),
        }
    }

    /// Leave `Disconnected` and make the first connect attempt
    pub async fn begin(&mut self) {
        self.drive(SessionEvent::Start).await;
    }

    /// React to a transport notification
    pub async fn handle(&mut self, event: TransportEvent) {
        let event = match event {
            TransportEvent::Connected => SessionEvent::Connected,
            TransportEvent::Error(code) => SessionEvent::Failed(Some(code)),
            TransportEvent::Closed => SessionEvent::Failed(None),
        };
        self.drive(event).await;
    }

    /// The backoff delay elapsed: try to reconnect
    pub async fn reconnect_due(&mut self) {
        self.drive(SessionEvent::ReconnectDue).await;
    }

    /// Do whatever the current deadline was armed for
    pub async fn on_deadline(&mut self) {
        self.deadline = None;
        match self.state {
            SessionState::Connected => self.play_next().await,
            SessionState::Backoff => self.reconnect_due().await,
            SessionState::Disconnected | SessionState::Connecting => {}
        }
    }

    /// Run until `shutdown` is cancelled or a non-looping recording ends.
    ///
    /// The session is closed on the way out, so a later call starts over
    /// with a fresh connect.
    ///
    /// # Errors
    ///
    /// Fails only if the transport event channel closes underneath the loop.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<SupervisorReport> {
        self.shutdown = shutdown.clone();
        self.finished = false;
        if self.state == SessionState::Disconnected {
            self.begin().await;
        }

        while !self.finished && !shutdown.is_cancelled() {
            let deadline = self.deadline;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => return Err(SupervisorError::ChannelClosed),
                },
                _ = sleep_until_opt(deadline) => self.on_deadline().await,
            }
        }

        info!("stopping playback");
        self.scheduler.stop();
        self.transport.close().await;
        self.discard_session_events();
        self.state = SessionState::Disconnected;
        self.deadline = None;
        Ok(self.report())
    }

    async fn drive(&mut self, event: SessionEvent) {
        let mut next = Some(event);
        while let Some(event) = next.take() {
            let (state, actions) = transition(self.state, event);
            if state != self.state {
                debug!("session {} -> {} on {:?}", self.state, state, event);
            }
            self.state = state;

            if let SessionEvent::Failed(code) = event {
                if !actions.is_empty() {
                    self.failures += 1;
                    match code {
                        Some(code) => error!(
                            "connection error encountered {}. stopping playback until reconnection.",
                            code
                        ),
                        None => warn!("connection closed. stopping playback until reconnection."),
                    }
                }
            }

            for action in actions {
                if let Some(follow_up) = self.perform(action).await {
                    next = Some(follow_up);
                }
            }
        }
    }

    async fn perform(&mut self, action: Action) -> Option<SessionEvent> {
        match action {
            Action::Connect => return self.connect().await,
            Action::StartReplay => {
                self.connects += 1;
                info!("connected, starting playback.");
                self.scheduler.start();
                self.deadline = Some(Instant::now());
            }
            Action::StopReplay => {
                self.scheduler.stop();
                self.deadline = None;
            }
            Action::ResetCursor => self.scheduler.reset(),
            Action::CloseTransport => {
                self.transport.close().await;
                self.discard_session_events();
            }
            Action::ArmBackoff => {
                let delay = self.policy.jittered_delay();
                info!("reconnecting in {:?}", delay);
                self.deadline = Some(after(delay));
            }
        }
        None
    }

    async fn connect(&mut self) -> Option<SessionEvent> {
        let peer = self.transport.peer();
        debug!("connecting to {}", peer);

        let attempt = timeout(self.connect_timeout, self.transport.connect(self.events_tx.clone()));
        let outcome = tokio::select! {
            _ = self.shutdown.cancelled() => return None,
            outcome = attempt => outcome,
        };

        let result = outcome.unwrap_or_else(|_| {
            Err(TransportError::Timeout {
                address: peer,
                timeout: self.connect_timeout,
            })
        });

        match result {
            Ok(Handshake::Complete) => Some(SessionEvent::Connected),
            Ok(Handshake::Pending) => {
                debug!("waiting for {} to confirm the session", self.transport.peer());
                None
            }
            Err(e) => {
                warn!("{}", e);
                Some(SessionEvent::Failed(Some(e.code())))
            }
        }
    }

    /// Swap in a fresh event channel so anything the closed session queued
    /// (or its reader task still sends) is never handled.
    fn discard_session_events(&mut self) {
        let (events_tx, events_rx) = event_channel();
        self.events_tx = events_tx;
        self.events_rx = events_rx;
    }

    async fn play_next(&mut self) {
        match self.scheduler.tick(self.transport.writer()) {
            Tick::Continue(delay) => self.deadline = Some(after(delay)),
            Tick::Halted => {
                info!("playback finished");
                self.finished = true;
            }
        }

        if let Err(e) = self.transport.flush().await {
            warn!("flush failed: {}", e);
            self.drive(SessionEvent::Failed(Some(e.code()))).await;
        }
    }
}

/// `now + delay`, saturating far in the future instead of overflowing
fn after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay)
        .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365))
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
