//! Ingest Replay Supervisor - session handling for telemetry replay
//!
//! Owns the connection to the collector and decides when playback runs:
//! playback starts from the first record whenever a session is established,
//! and stops, rewinds and waits out a jittered backoff whenever it is lost.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ingest_replay_core::config::ReplayConfig;
//! use ingest_replay_supervisor::{ConnectionSupervisor, TcpTransport};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> ingest_replay_supervisor::Result<()> {
//! let config = ReplayConfig::load()?;
//! let transport = TcpTransport::from_config(&config.intake);
//! let mut supervisor = ConnectionSupervisor::from_config(transport, &config)?;
//!
//! let shutdown = CancellationToken::new();
//! let report = supervisor.run(shutdown).await?;
//! println!("dispatched {}", report.stats.dispatched);
//! # Ok(())
//! # }
//! ```

mod backoff;
mod error;
mod state;
mod supervisor;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use error::{
    CODE_NOT_CONNECTED, CODE_TIMEOUT, CODE_UNKNOWN, Result, SupervisorError, TransportError,
};
pub use state::{transition, Action, SessionEvent, SessionState};
pub use supervisor::{ConnectionSupervisor, SupervisorReport};
pub use transport::{Handshake, MemoryTransport, TcpTransport, Transport, TransportEvent};
