//! Event dispatcher
//!
//! Turns one recorded message into exactly one call on an [`IngestWriter`],
//! anonymizing transient identifiers on the way. A record whose fields do
//! not match what its message expects is logged and skipped, and so is a
//! message name this build does not know; neither stops the replay.

mod container;
mod network;
mod process;

use tracing::{debug, warn};

use crate::anonymize::Anonymizer;
use crate::recording::{EventRecord, FieldError, Fields};
use crate::writer::IngestWriter;

/// Every message name the dispatcher can write
pub const SUPPORTED_MESSAGES: [&str; 35] = [
    // process lifecycle
    "pid_info",
    "pid_close_info",
    "pid_info_create",
    "pid_cgroup_move",
    "pid_set_comm",
    "pid_set_cmdline",
    "pid_exit",
    "tracked_process_start",
    "tracked_process_end",
    "set_tgid",
    "set_cgroup",
    "set_command",
    // cgroups and container metadata
    "cgroup_create",
    "cgroup_close",
    "container_metadata",
    "k8s_metadata",
    "k8s_metadata_port",
    "nomad_metadata",
    // sockets
    "new_sock_info",
    "set_state_ipv4",
    "set_state_ipv6",
    "socket_stats",
    "nat_remapping",
    "close_sock_info",
    "tcp_reset",
    "tcp_syn_timeout",
    "http_response",
    "private_ipv4_addr",
    "udp_new_socket",
    "udp_destroy_socket",
    "udp_stats_addr_changed_v4",
    "udp_stats_addr_changed_v6",
    "udp_stats_addr_unchanged",
    "udp_stats_drops_changed",
    // agent diagnostics
    "bpf_log",
];

/// Whether `name` has a handler
pub fn is_supported(name: &str) -> bool {
    SUPPORTED_MESSAGES.contains(&name)
}

/// What happened to a dispatched record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// One write was issued
    Written,
    /// Fields did not match the message; nothing was written
    Malformed(FieldError),
    /// No handler for the message name; nothing was written
    Unknown,
}

impl DispatchOutcome {
    /// True only when a write was issued
    pub fn handled(&self) -> bool {
        matches!(self, DispatchOutcome::Written)
    }
}

/// Outcome of a family handler: `Ok(false)` means "not mine"
type HandlerResult = Result<bool, FieldError>;

/// Maps recorded messages onto writer calls
#[derive(Debug)]
pub struct Dispatcher {
    anonymizer: Anonymizer,
}

impl Dispatcher {
    /// Create a dispatcher that owns the run's anonymizer
    pub fn new(anonymizer: Anonymizer) -> Self {
        Self { anonymizer }
    }

    /// The anonymizer used for substitutions
    pub fn anonymizer(&self) -> &Anonymizer {
        &self.anonymizer
    }

    /// Write `record` through `writer`.
    ///
    /// Never performs any timing; the caller decides when to dispatch.
    pub fn dispatch<W>(&mut self, record: &EventRecord, writer: &mut W) -> DispatchOutcome
    where
        W: IngestWriter + ?Sized,
    {
        match self.write_message(&record.name, &record.fields, writer) {
            Ok(true) => DispatchOutcome::Written,
            Ok(false) => {
                debug!("no handler for message {}, skipping.", record.name);
                DispatchOutcome::Unknown
            }
            Err(e) => {
                warn!("type error from json {} for message {}", e, record.name);
                DispatchOutcome::Malformed(e)
            }
        }
    }

    fn write_message<W>(&mut self, name: &str, fields: &Fields, writer: &mut W) -> HandlerResult
    where
        W: IngestWriter + ?Sized,
    {
        let anon = &mut self.anonymizer;
        Ok(process::write(name, fields, anon, writer)?
            || container::write(name, fields, anon, writer)?
            || network::write(name, fields, anon, writer)?)
    }
}
