// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Per-device settings, normally loaded from a TOML file.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use sal::ChipFamily;
use sal::SwitchError;
use sal::SwitchResult;

use crate::poll::RetryPolicy;

/// Highest address a chip can be strapped to in multi-chip mode
pub const CHIP_ADDR_MAX: u8 = 31;

/// Everything a caller can tune about how a device is opened and driven.
/// Every field is optional; an empty config probes the chip and uses each
/// window's built-in retry bound.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Skip probing and drive the chip as this family.
    pub family: Option<ChipFamily>,

    /// If set, the chip is in multi-chip mode and answers only at this
    /// address.
    pub chip_addr: Option<u8>,

    /// Logical port n is driven through physical port `port_map[n]`.  When
    /// unset, logical and physical ports are the same.
    pub port_map: Option<Vec<u8>>,

    /// Override every window's bound on busy-bit polls.
    pub poll_attempts: Option<u32>,

    /// Delay between busy-bit polls
    pub poll_interval_us: u64,

    /// How long to wait for a window's lock.  If not set, wait indefinitely.
    pub lock_timeout_ms: Option<u64>,
}

impl DeviceConfig {
    pub fn from_toml(text: &str) -> SwitchResult<Self> {
        let config: DeviceConfig = toml::from_str(text)
            .map_err(|e| SwitchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> SwitchResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SwitchError::Config(format!("reading {}: {e}", path.display()))
        })?;
        DeviceConfig::from_toml(&text)
    }

    /// Check the settings that can be judged without knowing the chip.  The
    /// port map is checked against the family's port count when the device
    /// is opened.
    pub fn validate(&self) -> SwitchResult<()> {
        if let Some(addr) = self.chip_addr {
            if addr > CHIP_ADDR_MAX {
                return Err(SwitchError::Config(format!(
                    "chip_addr {addr} out of range (0..={CHIP_ADDR_MAX})"
                )));
            }
        }
        if self.poll_attempts == Some(0) {
            return Err(SwitchError::Config(
                "poll_attempts must be at least 1".to_string(),
            ));
        }
        if let Some(map) = &self.port_map {
            let mut sorted = map.clone();
            sorted.sort_unstable();
            sorted.dedup();
            if sorted.len() != map.len() {
                return Err(SwitchError::Config(
                    "port_map names a physical port more than once".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    /// The retry policy for a window whose built-in bound is
    /// `default_attempts`.
    pub fn retry_policy(&self, default_attempts: u32) -> SwitchResult<RetryPolicy> {
        let attempts = self.poll_attempts.unwrap_or(default_attempts);
        RetryPolicy::new(attempts, self.poll_interval())
    }
}
