//! Runtime configuration for **imgchain** nodes (§9).
//!
//! [`Config`] centralises the tunables that govern mining and networking
//! timing. It is constructed via the fluent [`ConfigBuilder`], letting
//! callers override only the fields they care about while keeping sensible
//! defaults. There is no persistence layer: configuration lives for the
//! duration of a process and is supplied at startup (§9 Non-goals).
//!
//! ```
//! use imgchain_core::config::Config;
//!
//! let cfg = Config::default();
//! assert_eq!(cfg.running_difficulty, 4);
//! ```

use std::time::Duration;

/// Runtime configuration shared across a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Difficulty new blocks must meet once the chain is past genesis.
    pub running_difficulty: u32,

    /// Difficulty used to mine the very first (genesis) block, distinct
    /// from and lower than `running_difficulty`.
    pub genesis_difficulty: u32,

    /// How often the mining-poll loop checks for a freshly sealed candidate.
    pub mining_poll_interval: Duration,

    /// How long a mining trial sleeps between attempts that miss difficulty.
    pub mining_trial_sleep: Duration,

    /// Timeout on the listener's accept loop, letting it periodically check
    /// for shutdown without blocking forever.
    pub accept_loop_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            running_difficulty: 4,
            genesis_difficulty: 3,
            mining_poll_interval: Duration::from_millis(500),
            mining_trial_sleep: Duration::from_micros(10),
            accept_loop_timeout: Duration::from_secs(2),
        }
    }
}

/// Fluent builder for [`Config`].
pub struct ConfigBuilder {
    inner: Config,
}

impl ConfigBuilder {
    /// Starts a new builder pre-populated with [`Config::default`].
    pub fn new() -> Self {
        Self { inner: Config::default() }
    }

    pub fn running_difficulty(mut self, difficulty: u32) -> Self {
        self.inner.running_difficulty = difficulty;
        self
    }

    pub fn genesis_difficulty(mut self, difficulty: u32) -> Self {
        self.inner.genesis_difficulty = difficulty;
        self
    }

    pub fn mining_poll_interval(mut self, interval: Duration) -> Self {
        self.inner.mining_poll_interval = interval;
        self
    }

    pub fn mining_trial_sleep(mut self, sleep: Duration) -> Self {
        self.inner.mining_trial_sleep = sleep;
        self
    }

    pub fn accept_loop_timeout(mut self, timeout: Duration) -> Self {
        self.inner.accept_loop_timeout = timeout;
        self
    }

    /// Consumes the builder returning an immutable configuration value.
    pub fn finish(self) -> Config {
        self.inner
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
