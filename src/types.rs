//! Core types for the wellness engine
//!
//! This module defines the data that flows through each stage of the engine:
//! mood entries read from the store, derived metrics, decider state and the
//! notification records handed to the sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::EngineError;

/// Identifier assigned by a notification sink
pub type NotificationId = Uuid;

/// Self-reported mood level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodLevel {
    VeryLow,
    Low,
    Neutral,
    Good,
    Excellent,
}

impl MoodLevel {
    pub const ALL: [MoodLevel; 5] = [
        MoodLevel::VeryLow,
        MoodLevel::Low,
        MoodLevel::Neutral,
        MoodLevel::Good,
        MoodLevel::Excellent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MoodLevel::VeryLow => "very_low",
            MoodLevel::Low => "low",
            MoodLevel::Neutral => "neutral",
            MoodLevel::Good => "good",
            MoodLevel::Excellent => "excellent",
        }
    }

    /// Base points contributed to an entry's composite score
    pub fn base_points(&self) -> i32 {
        match self {
            MoodLevel::VeryLow => 20,
            MoodLevel::Low => 40,
            MoodLevel::Neutral => 60,
            MoodLevel::Good => 80,
            MoodLevel::Excellent => 100,
        }
    }
}

impl fmt::Display for MoodLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MoodLevel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoodLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| EngineError::invalid("mood_level", format!("unknown value '{s}'")))
    }
}

/// A single mood-log entry as stored by the entry store.
///
/// Entries are immutable once created. Value ranges are enforced at the
/// validation boundary (see [`crate::validate`]), not by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub user_id: String,
    pub mood_level: MoodLevel,
    /// 1-10
    pub energy_level: u8,
    /// 0-24
    pub sleep_hours: f64,
    /// 1-10, higher means more stress
    pub stress_level: u8,
    pub created_at: DateTime<Utc>,
}

/// Consecutive-day logging streaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakMetrics {
    /// Consecutive days ending today with at least one entry
    pub current_streak: u32,
    /// Longest run of consecutive days over the full history
    pub longest_streak: u32,
}

/// Coarse risk classification of a wellness score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }

    /// High risk bypasses notification cooldowns
    pub fn is_urgent(&self) -> bool {
        matches!(self, RiskTier::High)
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Improvement,
    Decline,
    Milestone,
    Alert,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Improvement => "improvement",
            NotificationKind::Decline => "decline",
            NotificationKind::Milestone => "milestone",
            NotificationKind::Alert => "alert",
        }
    }
}

/// Notification priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// A notification describing a score change, milestone or risk alert.
///
/// Immutable once composed, except for `read` which the sink toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub previous_score: u8,
    pub current_score: u8,
    pub score_change: i32,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

/// Output of the decider when a notification should be emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionContext {
    pub previous_score: u8,
    pub current_score: u8,
    /// `current_score - previous_score`
    pub delta: i32,
    /// Emitted because the score is in the high risk tier
    pub forced: bool,
}

impl DecisionContext {
    pub fn new(previous_score: u8, current_score: u8, forced: bool) -> Self {
        Self {
            previous_score,
            current_score,
            delta: i32::from(current_score) - i32::from(previous_score),
            forced,
        }
    }
}

/// Per-user decider state.
///
/// Advances only when a notification is actually emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWellnessState {
    pub last_known_score: u8,
    pub last_notification_at: DateTime<Utc>,
    /// Incremented on every state change, used for optimistic updates
    pub version: u64,
}

/// Read-only dashboard view of a user's wellness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellnessSummary {
    pub score: u8,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub risk_tier: RiskTier,
}
