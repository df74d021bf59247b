//! Jittered reconnect delay

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use ingest_replay_core::config::ReconnectConfig;

/// Fixed base delay perturbed by a uniform offset in `[-jitter, +jitter]`
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base: Duration,
    jitter: Duration,
    rng: StdRng,
}

impl ReconnectPolicy {
    /// Policy with a randomly seeded offset source
    pub fn new(base: Duration, jitter: Duration) -> Self {
        Self {
            base,
            jitter,
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Policy with reproducible offsets
    pub fn with_seed(base: Duration, jitter: Duration, seed: u64) -> Self {
        Self {
            base,
            jitter,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Policy from the `reconnect` config section
    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(config.delay, config.jitter)
    }

    /// Base delay
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Maximum offset either way
    pub fn jitter(&self) -> Duration {
        self.jitter
    }

    /// Shortest delay the policy can produce
    pub fn min_delay(&self) -> Duration {
        self.base.saturating_sub(self.jitter)
    }

    /// Longest delay the policy can produce
    pub fn max_delay(&self) -> Duration {
        self.base.saturating_add(self.jitter)
    }

    /// Draw the next delay, clamped at zero
    pub fn jittered_delay(&mut self) -> Duration {
        let base = nanos(self.base);
        let jitter = nanos(self.jitter);
        let spread = self.rng.random_range(0..=jitter.saturating_mul(2));
        Duration::from_nanos(base.saturating_add(spread).saturating_sub(jitter))
    }
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
