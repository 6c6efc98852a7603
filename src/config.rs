//! Engine configuration
//!
//! All fields have defaults, so an empty TOML document is a valid config.
//!
//! ```toml
//! window_days = 7
//! min_delta = 10
//! cooldown_hours = 24
//! streak_cap_days = 365
//! utc_offset_minutes = -300
//! ```

use crate::decider::{DeciderPolicy, DEFAULT_COOLDOWN_HOURS, DEFAULT_MIN_DELTA};
use crate::error::EngineError;
use crate::score::DEFAULT_SCORE_WINDOW_DAYS;
use crate::streak::{StreakAnalyzer, DEFAULT_STREAK_CAP_DAYS};
use chrono::{Duration, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const MAX_OFFSET_MINUTES: i32 = 14 * 60;
const MAX_WINDOW_DAYS: u32 = 36_500;

/// Tunables for the wellness engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Days of entries the score is computed over
    pub window_days: u32,
    /// Minimum absolute score change worth a notification
    pub min_delta: u8,
    /// Hours between non-urgent notifications
    pub cooldown_hours: u32,
    /// Cap on the backward walk for the current streak
    pub streak_cap_days: u32,
    /// Offset of the users' local calendar from UTC, in minutes
    pub utc_offset_minutes: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_SCORE_WINDOW_DAYS,
            min_delta: DEFAULT_MIN_DELTA,
            cooldown_hours: DEFAULT_COOLDOWN_HOURS as u32,
            streak_cap_days: DEFAULT_STREAK_CAP_DAYS,
            utc_offset_minutes: 0,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML config
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.window_days == 0 {
            return Err(EngineError::Config("window_days must be at least 1".to_string()));
        }
        if self.window_days > MAX_WINDOW_DAYS {
            return Err(EngineError::Config(format!(
                "window_days {} is above {MAX_WINDOW_DAYS}",
                self.window_days
            )));
        }
        if self.streak_cap_days == 0 {
            return Err(EngineError::Config(
                "streak_cap_days must be at least 1".to_string(),
            ));
        }
        if self.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(EngineError::Config(format!(
                "utc_offset_minutes {} is outside +/-{MAX_OFFSET_MINUTES}",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }

    /// Local calendar offset, UTC if out of range
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn decider_policy(&self) -> DeciderPolicy {
        DeciderPolicy {
            min_delta: self.min_delta,
            cooldown: Duration::hours(i64::from(self.cooldown_hours)),
        }
    }

    pub fn streak_analyzer(&self) -> StreakAnalyzer {
        StreakAnalyzer::new(self.offset(), self.streak_cap_days)
    }
}
