//! ingest-replay - replay a kernel telemetry recording against a collector

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ingest_replay_core::config::ReplayConfig;
use ingest_replay_supervisor::{ConnectionSupervisor, TcpTransport};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "ingest-replay")]
#[command(
    about = "Replay recorded kernel telemetry against an ingest collector",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Recording to replay (JSON array of ingest messages)
    #[arg(long, env = "INGEST_REPLAY_INGEST_FILE")]
    ingest_file: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, env = "INGEST_REPLAY_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Collector host
    #[arg(long, env = "EBPF_NET_INTAKE_HOST")]
    intake_host: Option<String>,

    /// Collector port
    #[arg(long, env = "EBPF_NET_INTAKE_PORT")]
    intake_port: Option<u16>,

    /// Seed for identifier anonymization, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after one pass over the recording instead of looping
    #[arg(long)]
    no_loop: bool,
}

impl Cli {
    /// Load configuration and apply command-line overrides on top
    fn config(&self) -> Result<ReplayConfig> {
        let mut config = ReplayConfig::load_unvalidated(self.config.as_deref())
            .context("failed to load configuration")?;

        if let Some(path) = &self.ingest_file {
            config.recording.path = Some(path.clone());
        }
        if let Some(host) = &self.intake_host {
            config.intake.host = host.clone();
        }
        if let Some(port) = self.intake_port {
            config.intake.port = port;
        }
        if let Some(seed) = self.seed {
            config.anonymizer.seed = Some(seed);
        }
        if self.no_loop {
            config.replay.loop_recording = false;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

/// Cancel `shutdown` on SIGINT or SIGTERM
fn watch_signals(shutdown: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
                        _ = sigterm.recv() => info!("received SIGTERM"),
                    }
                }
                Err(e) => {
                    warn!("could not install SIGTERM handler: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                    info!("received SIGINT");
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("received interrupt");
        }
        shutdown.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;

    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    let agent_id = Uuid::new_v4();
    info!("ingest-replay {} (core {})", env!("CARGO_PKG_VERSION"), ingest_replay_core::VERSION);
    info!("hostname: {}", host);
    info!("agent id: {}", agent_id);
    info!("intake: {}", config.intake.address());

    let transport = TcpTransport::from_config(&config.intake);
    let mut supervisor = ConnectionSupervisor::from_config(transport, &config)
        .context("failed to prepare replay")?;
    if let Some(path) = supervisor.scheduler().store().source() {
        info!(
            "replaying {} records from {}",
            supervisor.scheduler().store().len(),
            path.display()
        );
    }

    let shutdown = CancellationToken::new();
    watch_signals(shutdown.clone());

    let report = supervisor.run(shutdown).await?;
    info!(
        "done: {} connects, {} failures, {} written, {} malformed, {} unknown, {} full passes",
        report.connects,
        report.failures,
        report.stats.dispatched,
        report.stats.skipped_malformed,
        report.stats.skipped_unknown,
        report.stats.cycles
    );
    Ok(())
}
