//! Entry validation boundary
//!
//! Raw entries arrive as submitted by forms (mood level as a string, numeric
//! fields unchecked). This module turns them into [`MoodEntry`] values whose
//! ranges the engine can rely on. Nothing inside the engine re-validates.

use crate::error::EngineError;
use crate::types::{MoodEntry, MoodLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_LEVEL: i64 = 1;
pub const MAX_LEVEL: i64 = 10;
pub const MAX_SLEEP_HOURS: f64 = 24.0;

/// A mood entry as submitted, before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMoodEntry {
    pub user_id: String,
    pub mood_level: String,
    pub energy_level: i64,
    pub sleep_hours: f64,
    pub stress_level: i64,
    pub created_at: DateTime<Utc>,
}

impl RawMoodEntry {
    /// Validate and convert into a [`MoodEntry`]
    pub fn into_entry(self) -> Result<MoodEntry, EngineError> {
        if self.user_id.trim().is_empty() {
            return Err(EngineError::invalid("user_id", "must not be empty"));
        }
        let mood_level: MoodLevel = self.mood_level.parse()?;
        let energy_level = check_level("energy_level", self.energy_level)?;
        let stress_level = check_level("stress_level", self.stress_level)?;
        check_sleep(self.sleep_hours)?;

        Ok(MoodEntry {
            user_id: self.user_id,
            mood_level,
            energy_level,
            sleep_hours: self.sleep_hours,
            stress_level,
            created_at: self.created_at,
        })
    }
}

/// Check an already-typed entry's value ranges
pub fn validate_entry(entry: &MoodEntry) -> Result<(), EngineError> {
    if entry.user_id.trim().is_empty() {
        return Err(EngineError::invalid("user_id", "must not be empty"));
    }
    check_level("energy_level", i64::from(entry.energy_level))?;
    check_level("stress_level", i64::from(entry.stress_level))?;
    check_sleep(entry.sleep_hours)
}

fn check_level(field: &'static str, value: i64) -> Result<u8, EngineError> {
    if !(MIN_LEVEL..=MAX_LEVEL).contains(&value) {
        return Err(EngineError::invalid(
            field,
            format!("{value} is outside {MIN_LEVEL}-{MAX_LEVEL}"),
        ));
    }
    // In range, so it fits
    Ok(value as u8)
}

fn check_sleep(hours: f64) -> Result<(), EngineError> {
    if !hours.is_finite() || !(0.0..=MAX_SLEEP_HOURS).contains(&hours) {
        return Err(EngineError::invalid(
            "sleep_hours",
            format!("{hours} is outside 0-{MAX_SLEEP_HOURS}"),
        ));
    }
    Ok(())
}

/// Parse newline-delimited raw entries, skipping blank lines.
///
/// Fails on the first line that is not valid JSON; range checks are left to
/// [`RawMoodEntry::into_entry`].
pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawMoodEntry>, EngineError> {
    let mut entries = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<RawMoodEntry>(trimmed) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                return Err(EngineError::ParseError(format!(
                    "Failed to parse line {}: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }
    Ok(entries)
}
