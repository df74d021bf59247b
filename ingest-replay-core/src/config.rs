//! Configuration types for the replay engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ReplayError, Result};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "ingest-replay.toml";

/// Environment variable naming an additional config file
pub const CONFIG_PATH_ENV: &str = "INGEST_REPLAY_CONFIG_PATH";

/// Prefix for environment overrides (`INGEST_REPLAY_INTAKE__HOST=...`)
pub const ENV_PREFIX: &str = "INGEST_REPLAY_";

/// Main configuration for a replay run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReplayConfig {
    /// Input recording
    pub recording: RecordingConfig,

    /// Downstream collector connection
    pub intake: IntakeConfig,

    /// Reconnect backoff
    pub reconnect: ReconnectConfig,

    /// Identifier anonymization
    pub anonymizer: AnonymizerConfig,

    /// Playback behavior
    pub replay: PlaybackConfig,
}

/// Input recording configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RecordingConfig {
    /// Path to the JSON recording (may be supplied on the command line instead)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Collector (intake) connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Collector host name or address
    pub host: String,

    /// Collector port
    pub port: u16,

    /// Upper bound on a single connect attempt
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Initial capacity of the outgoing write buffer in bytes
    pub buffer_size: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            connect_timeout: Duration::from_secs(10),
            buffer_size: 16 * 1024,
        }
    }
}

impl IntakeConfig {
    /// `host:port` string suitable for a socket connect
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reconnect backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Base delay before a reconnect attempt
    #[serde(with = "humantime_serde")]
    pub delay: Duration,

    /// Maximum random offset applied in either direction
    #[serde(with = "humantime_serde")]
    pub jitter: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            jitter: Duration::from_secs(1),
        }
    }
}

/// Anonymizer configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnonymizerConfig {
    /// Fixed seed for reproducible anonymization; clock-seeded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Restart from the first record after the last one (otherwise stop)
    pub loop_recording: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            loop_recording: true,
        }
    }
}

/// Builder for ReplayConfig
pub struct ConfigBuilder {
    config: ReplayConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            config: ReplayConfig::default(),
        }
    }

    /// Set the recording path
    pub fn recording(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.recording.path = Some(path.into());
        self
    }

    /// Set intake configuration
    pub fn intake(mut self, config: IntakeConfig) -> Self {
        self.config.intake = config;
        self
    }

    /// Set reconnect configuration
    pub fn reconnect(mut self, config: ReconnectConfig) -> Self {
        self.config.reconnect = config;
        self
    }

    /// Set a fixed anonymizer seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.anonymizer.seed = Some(seed);
        self
    }

    /// Enable or disable looping playback
    pub fn loop_recording(mut self, enabled: bool) -> Self {
        self.config.replay.loop_recording = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ReplayConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `ingest-replay.toml` in the working directory
    /// 3. The file named by `INGEST_REPLAY_CONFIG_PATH`
    /// 4. `INGEST_REPLAY_*` environment overrides (nested keys split on `__`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is invalid or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Like [`ReplayConfig::load`], with an explicit file merged after the
    /// environment-named one.
    pub fn load_with(explicit: Option<&std::path::Path>) -> Result<Self> {
        let config = Self::load_unvalidated(explicit)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge all configuration sources without validating the result.
    ///
    /// Callers that apply their own overrides afterwards (the CLI) must call
    /// [`ReplayConfig::validate`] themselves.
    pub fn load_unvalidated(explicit: Option<&std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(ReplayConfig::default()))
            .merge(Toml::file(DEFAULT_CONFIG_FILE));

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            figment = figment.merge(Toml::file(path));
        }
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file(path));
        }

        let config: ReplayConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["CONFIG_PATH"]).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let config: ReplayConfig = Figment::from(Serialized::defaults(ReplayConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                ReplayError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.intake.host.trim().is_empty() {
            return Err(ReplayError::Configuration(
                "intake host must not be empty".to_string(),
            ));
        }
        if self.intake.port == 0 {
            return Err(ReplayError::Configuration(
                "intake port must be non-zero".to_string(),
            ));
        }
        if self.reconnect.jitter > self.reconnect.delay {
            return Err(ReplayError::Configuration(format!(
                "reconnect jitter ({:?}) must not exceed the base delay ({:?})",
                self.reconnect.jitter, self.reconnect.delay
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = ReplayConfig::default();
        assert_eq!(config.intake.address(), "localhost:8000");
        assert_eq!(config.intake.buffer_size, 16 * 1024);
        assert_eq!(config.reconnect.delay, Duration::from_secs(5));
        assert_eq!(config.reconnect.jitter, Duration::from_secs(1));
        assert!(config.replay.loop_recording);
        assert!(config.anonymizer.seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ConfigBuilder::new()
            .recording("ingest.json")
            .seed(7)
            .loop_recording(false)
            .build();

        assert_eq!(config.recording.path, Some(PathBuf::from("ingest.json")));
        assert_eq!(config.anonymizer.seed, Some(7));
        assert!(!config.replay.loop_recording);
    }

    #[test]
    fn test_validate_rejects_jitter_above_delay() {
        let config = ConfigBuilder::new()
            .reconnect(ReconnectConfig {
                delay: Duration::from_secs(1),
                jitter: Duration::from_secs(2),
            })
            .build();
        assert!(matches!(
            config.validate(),
            Err(ReplayError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = ReplayConfig::default();
        config.intake.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let mut config = ReplayConfig::default();
        config.intake.host = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ReplayError::Configuration(msg)) if msg.contains("host")
        ));
    }

    #[test]
    fn test_unvalidated_load_defers_checks() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_FILE, "[intake]\nport = 0\n")?;

            assert!(ReplayConfig::load().is_err());
            let config = ReplayConfig::load_unvalidated(None).expect("sources merge");
            assert_eq!(config.intake.port, 0);
            Ok(())
        });
    }

    #[test]
    fn test_load_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                [intake]
                host = "collector.internal"
                port = 7000
                connect_timeout = "3s"

                [reconnect]
                delay = "2s"
                jitter = "500ms"
                "#,
            )?;
            jail.set_env("INGEST_REPLAY_ANONYMIZER__SEED", "42");

            let config = ReplayConfig::load().expect("config loads");
            assert_eq!(config.intake.host, "collector.internal");
            assert_eq!(config.intake.port, 7000);
            assert_eq!(config.intake.connect_timeout, Duration::from_secs(3));
            assert_eq!(config.reconnect.jitter, Duration::from_millis(500));
            assert_eq!(config.anonymizer.seed, Some(42));
            // untouched sections keep their defaults
            assert!(config.replay.loop_recording);
            Ok(())
        });
    }

    #[test]
    fn test_from_file_invalid() {
        Jail::expect_with(|jail| {
            jail.create_file("bad.toml", "[reconnect]\ndelay = \"1s\"\njitter = \"5s\"\n")?;
            assert!(ReplayConfig::from_file("bad.toml").is_err());
            Ok(())
        });
    }
}
