//! Runtime configuration
//!
//! Loaded from a TOML file; every field has a default matching the hosted
//! product so a missing or partial file still yields a working setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Modified Fibonacci scale used for story-point estimates.
pub const DEFAULT_SCALE: &[f64] = &[0.0, 1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 20.0, 40.0, 100.0];

/// Configuration for estimation rooms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    /// Allowed estimate values, ascending.
    pub scale: Vec<f64>,
    /// Modal share (percent) at or above which a vote set counts as
    /// strong consensus. Product decision, not a derived constant.
    pub strong_consensus_pct: f64,
    /// Trailing-edge coalescing window for change notifications, in
    /// milliseconds.
    pub debounce_ms: u64,
    /// Hours of inactivity after which a room is swept.
    pub room_ttl_hours: i64,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE.to_vec(),
            strong_consensus_pct: 70.0,
            debounce_ms: 150,
            room_ttl_hours: 24,
        }
    }
}

impl EstimationConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| Error::Config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.scale.is_empty() {
            return Err(Error::Config("Estimation scale must not be empty".into()));
        }
        if self.scale.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Config(
                "Estimation scale must be strictly ascending".into(),
            ));
        }
        if !self.scale.iter().all(|v| v.is_finite() && *v >= 0.0) {
            return Err(Error::Config(
                "Estimation scale values must be finite and non-negative".into(),
            ));
        }
        if !(self.strong_consensus_pct > 0.0 && self.strong_consensus_pct <= 100.0) {
            return Err(Error::Config(
                "Strong consensus threshold must be in (0, 100]".into(),
            ));
        }
        if self.room_ttl_hours <= 0 {
            return Err(Error::Config("Room TTL must be positive".into()));
        }
        Ok(())
    }

    /// Debounce window as a [`Duration`].
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Room idle TTL as a [`chrono::Duration`].
    pub fn room_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.room_ttl_hours)
    }

    /// Default directory for the database file.
    pub fn default_data_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "pokerplan", "pokerplan")
            .map(|dirs| dirs.data_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        EstimationConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: EstimationConfig = toml::from_str("strong_consensus_pct = 80.0").unwrap();
        assert_eq!(config.strong_consensus_pct, 80.0);
        assert_eq!(config.scale, DEFAULT_SCALE);
        assert_eq!(config.debounce_ms, 150);
    }

    #[test]
    fn test_rejects_unsorted_scale() {
        let config = EstimationConfig {
            scale: vec![0.0, 5.0, 3.0],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_scale() {
        let config = EstimationConfig {
            scale: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
