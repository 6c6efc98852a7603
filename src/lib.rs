//! Wellness Pulse - wellness scoring and notification engine
//!
//! Pulse turns a user's mood-log entries into a rolling wellness score and
//! decides when a change is worth telling them about:
//! entry store → score / streaks / risk → notification decider → composer.
//!
//! ## Modules
//!
//! - **Scoring**: [`score`], [`streak`] and [`risk`] are pure functions over entries
//! - **Notifications**: [`decider`] holds per-user state and applies thresholds
//!   and cooldowns, [`composer`] builds the notification record
//! - **Integration**: [`engine`] wires the stages to an [`store::EntryStore`]

pub mod composer;
pub mod config;
pub mod decider;
pub mod engine;
pub mod error;
pub mod risk;
pub mod score;
pub mod store;
pub mod streak;
pub mod types;
pub mod validate;

pub use composer::NotificationComposer;
pub use config::EngineConfig;
pub use decider::{DeciderPolicy, NotificationDecider};
pub use engine::WellnessEngine;
pub use error::EngineError;
pub use risk::classify;
pub use score::ScoreCalculator;
pub use store::{Clock, EntryStore, NotificationSink};
pub use streak::StreakAnalyzer;
pub use types::{
    DecisionContext, MoodEntry, MoodLevel, Notification, NotificationKind, Priority, RiskTier,
    StreakMetrics, UserWellnessState, WellnessSummary,
};

/// Engine version
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");
