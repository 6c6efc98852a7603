//! Streak analysis
//!
//! Derives consecutive-day logging streaks from a user's full entry history.
//! Days are calendar days in the configured local offset; several entries on
//! the same day count once.

use crate::types::{MoodEntry, StreakMetrics};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, Offset, Utc};
use std::collections::BTreeSet;

/// Default cap on the backward walk for the current streak
pub const DEFAULT_STREAK_CAP_DAYS: u32 = 365;

/// Streak analyzer bound to a local calendar
#[derive(Debug, Clone, Copy)]
pub struct StreakAnalyzer {
    offset: FixedOffset,
    cap_days: u32,
}

impl Default for StreakAnalyzer {
    fn default() -> Self {
        Self::new(Utc.fix(), DEFAULT_STREAK_CAP_DAYS)
    }
}

impl StreakAnalyzer {
    pub fn new(offset: FixedOffset, cap_days: u32) -> Self {
        Self { offset, cap_days }
    }

    /// Local calendar date of a timestamp
    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.offset).date_naive()
    }

    /// Compute current and longest streaks as of `today`.
    ///
    /// The current streak stops at the cap; the longest streak scans the whole
    /// history and is never capped.
    pub fn compute(&self, entries: &[MoodEntry], today: NaiveDate) -> StreakMetrics {
        let days: BTreeSet<NaiveDate> = entries
            .iter()
            .map(|e| self.local_date(e.created_at))
            .collect();

        StreakMetrics {
            current_streak: self.current_streak(&days, today),
            longest_streak: longest_run(&days),
        }
    }

    fn current_streak(&self, days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
        let mut streak = 0;
        let mut day = today;

        while streak < self.cap_days && days.contains(&day) {
            streak += 1;
            match day.checked_sub_days(Days::new(1)) {
                Some(prev) => day = prev,
                None => break,
            }
        }

        streak
    }
}

fn longest_run(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for &day in days {
        run = match previous {
            Some(prev) if prev.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }

    longest
}
