//! Synchronization settings and their TOML loader
//!
//! All keys are optional:
//!
//! ```toml
//! heartbeat_interval_ms = 30000
//! stale_threshold_ms = 120000
//! sweep_interval_ms = 60000
//! deck = ["1", "2", "3", "5", "8", "13", "21", "?"]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::deck::Deck;
use crate::error::{Error, Result};

pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_STALE_THRESHOLD_MS: u64 = 120_000;
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60_000;

/// Timing and deck settings shared by every client of a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Liveness refresh period
    pub heartbeat_interval_ms: u64,
    /// Idle time after which a participant is evicted
    pub stale_threshold_ms: u64,
    /// Eviction sweep period
    pub sweep_interval_ms: u64,
    /// Allowed vote values
    pub deck: Deck,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            stale_threshold_ms: DEFAULT_STALE_THRESHOLD_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            deck: Deck::default(),
        }
    }
}

impl SyncConfig {
    /// Parse and validate TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "Loaded sync config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_ms == 0 || self.sweep_interval_ms == 0 {
            return Err(Error::Config("intervals must be greater than zero".into()));
        }
        if self.stale_threshold_ms <= self.heartbeat_interval_ms {
            return Err(Error::Config(format!(
                "stale_threshold_ms ({}) must exceed heartbeat_interval_ms ({})",
                self.stale_threshold_ms, self.heartbeat_interval_ms
            )));
        }
        self.deck.validate()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn stale_threshold(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.stale_threshold_ms).unwrap_or(i64::MAX))
    }

    /// Same deck, every interval divided by `factor` (minimum 1ms)
    pub fn scaled_down(&self, factor: u64) -> Self {
        let factor = factor.max(1);
        Self {
            heartbeat_interval_ms: (self.heartbeat_interval_ms / factor).max(1),
            stale_threshold_ms: (self.stale_threshold_ms / factor).max(2),
            sweep_interval_ms: (self.sweep_interval_ms / factor).max(1),
            deck: self.deck.clone(),
        }
    }
}
