//! Wellness score calculation
//!
//! Maps a window of mood entries to a single 0-100 wellness score. Each entry
//! contributes a composite of:
//! - mood base points
//! - energy bonus
//! - sleep bonus
//! - stress bonus (lower reported stress raises the score)

use crate::types::MoodEntry;

/// Score returned when there are no entries in the window
pub const NEUTRAL_SCORE: u8 = 50;

/// Default scoring window in days
pub const DEFAULT_SCORE_WINDOW_DAYS: u32 = 7;

/// Score calculator for windows of mood entries
pub struct ScoreCalculator;

impl ScoreCalculator {
    /// Compute the wellness score for entries already filtered to the window.
    pub fn compute(entries: &[MoodEntry]) -> u8 {
        if entries.is_empty() {
            return NEUTRAL_SCORE;
        }

        let total: i64 = entries.iter().map(|e| i64::from(entry_composite(e))).sum();
        let average = total as f64 / entries.len() as f64;

        average.clamp(0.0, 100.0).round() as u8
    }
}

/// Unclamped composite score for one entry
pub fn entry_composite(entry: &MoodEntry) -> i32 {
    entry.mood_level.base_points()
        + energy_bonus(entry.energy_level)
        + sleep_bonus(entry.sleep_hours)
        + stress_bonus(entry.stress_level)
}

fn energy_bonus(energy_level: u8) -> i32 {
    (i32::from(energy_level) - 5) * 2
}

fn sleep_bonus(sleep_hours: f64) -> i32 {
    if sleep_hours >= 7.0 {
        5
    } else if sleep_hours >= 6.0 {
        0
    } else {
        -5
    }
}

fn stress_bonus(stress_level: u8) -> i32 {
    10 - i32::from(stress_level)
}
