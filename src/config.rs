//! Link configuration parameters
//!
//! All tunable parameters for one host ↔ controller link. Loaded from a
//! JSON file by the embedding application, or built in code from
//! [`LinkConfig::default`].

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::protocol::MAX_CHANNELS;

/// Which [`Transport`](crate::protocol::Transport) implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// A physical serial port (USB CDC or RS-232).
    #[default]
    Serial,
    /// An in-process simulated controller.
    Simulated,
}

/// Core link configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    // --- Controller ---
    /// Number of coil channels fitted to the controller
    pub channel_count: usize,
    /// Coil current represented by DAC/ADC code 4096 (mA)
    pub full_scale_milliamp: f64,

    // --- Timing ---
    /// Dispatch loop sleep between iterations (microseconds)
    pub poll_interval_us: u64,

    // --- Transport ---
    pub transport: TransportKind,
    /// Port to open at start-up; `None` waits for `Link::reconnect`
    pub port: Option<String>,
    /// Serial baud rate
    pub baud_rate: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            // Controller
            channel_count: 6,
            full_scale_milliamp: 320.0,

            // Timing
            poll_interval_us: 1_000, // 1 kHz

            // Transport
            transport: TransportKind::Serial,
            port: None,
            baud_rate: 115_200,
        }
    }
}

impl LinkConfig {
    /// Longest accepted dispatch sleep.
    pub const MAX_POLL_INTERVAL_US: u64 = 1_000_000;

    pub fn poll_interval(&self) -> core::time::Duration {
        core::time::Duration::from_micros(self.poll_interval_us)
    }

    /// Reject out-of-range values. Nothing is clamped.
    pub fn validate(&self) -> Result<(), Error> {
        if self.channel_count == 0 || self.channel_count > MAX_CHANNELS {
            return Err(Error::Config("channel_count must be 1..=15"));
        }
        if !self.full_scale_milliamp.is_finite() || self.full_scale_milliamp <= 0.0 {
            return Err(Error::Config("full_scale_milliamp must be positive"));
        }
        if self.poll_interval_us == 0 || self.poll_interval_us > Self::MAX_POLL_INTERVAL_US {
            return Err(Error::Config("poll_interval_us must be 1..=1000000"));
        }
        if self.baud_rate == 0 {
            return Err(Error::Config("baud_rate must be non-zero"));
        }
        if matches!(&self.port, Some(p) if p.trim().is_empty()) {
            return Err(Error::Config("port must not be empty"));
        }
        Ok(())
    }

    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("parsing link configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("loading {}", path.display()))
    }
}
