//! Engine orchestration
//!
//! This module provides the public API of the wellness engine. It wires the
//! stages together: entry store → score/streak/risk → decider → composer, and
//! leaves persistence of the result to the caller or a [`NotificationSink`].

use crate::composer::NotificationComposer;
use crate::config::EngineConfig;
use crate::decider::NotificationDecider;
use crate::error::EngineError;
use crate::risk::classify;
use crate::score::ScoreCalculator;
use crate::store::{Clock, EntryStore, NotificationSink, SystemClock};
use crate::streak::StreakAnalyzer;
use crate::types::{Notification, NotificationId, StreakMetrics, WellnessSummary};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Scoring and notification engine for one entry store.
///
/// Safe to share between request handlers; decisions for the same user are
/// serialized inside the decider.
pub struct WellnessEngine<S, C = SystemClock> {
    store: S,
    clock: C,
    config: EngineConfig,
    decider: NotificationDecider,
    streaks: StreakAnalyzer,
}

impl<S: EntryStore> WellnessEngine<S> {
    /// Create an engine on the system clock with default settings
    pub fn new(store: S) -> Self {
        let config = EngineConfig::default();
        Self {
            store,
            clock: SystemClock,
            decider: NotificationDecider::new(config.decider_policy()),
            streaks: config.streak_analyzer(),
            config,
        }
    }
}

impl<S: EntryStore, C: Clock> WellnessEngine<S, C> {
    /// Create an engine with an explicit clock and configuration
    pub fn with_config(store: S, clock: C, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let decider = NotificationDecider::new(config.decider_policy());
        Ok(Self::with_decider(store, clock, config, decider))
    }

    /// Create an engine around an existing decider and its state.
    ///
    /// The decider's own policy is used as-is.
    pub fn with_decider(
        store: S,
        clock: C,
        config: EngineConfig,
        decider: NotificationDecider,
    ) -> Self {
        Self {
            store,
            clock,
            streaks: config.streak_analyzer(),
            config,
            decider,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn decider(&self) -> &NotificationDecider {
        &self.decider
    }

    /// Run the full flow after a new entry has been persisted.
    ///
    /// Everything is read from the store before the decider is consulted, so a
    /// store failure never advances the user's state.
    pub fn on_new_entry_logged(&self, user_id: &str) -> Result<Option<Notification>, EngineError> {
        let now = self.clock.now();
        let score = self.score_at(user_id)?;
        let streak = self.streaks_at(user_id, now)?;
        let risk = classify(score);

        debug!(user_id, score, risk = %risk, current_streak = streak.current_streak, "scored");

        let Some(ctx) = self.decider.decide(user_id, score, now) else {
            return Ok(None);
        };

        let notification = NotificationComposer::compose(user_id, &ctx, &streak, now);
        info!(
            user_id,
            kind = notification.kind.as_str(),
            previous_score = ctx.previous_score,
            current_score = ctx.current_score,
            forced = ctx.forced,
            "notification composed"
        );
        Ok(Some(notification))
    }

    /// [`on_new_entry_logged`](Self::on_new_entry_logged) for callers whose
    /// primary write must not fail because of notification generation.
    pub fn on_new_entry_logged_best_effort(&self, user_id: &str) -> Option<Notification> {
        match self.on_new_entry_logged(user_id) {
            Ok(notification) => notification,
            Err(e) => {
                warn!(user_id, error = %e, "notification generation failed");
                None
            }
        }
    }

    /// Run the flow and hand any notification to `sink`.
    ///
    /// If the sink fails, the user's state has already advanced; the error is
    /// returned so the caller can retry the write at the persistence boundary.
    pub fn log_and_notify<K: NotificationSink + ?Sized>(
        &self,
        user_id: &str,
        sink: &K,
    ) -> Result<Option<NotificationId>, EngineError> {
        match self.on_new_entry_logged(user_id)? {
            Some(notification) => sink.persist(notification).map(Some),
            None => Ok(None),
        }
    }

    /// Read-only dashboard summary. Never touches decider state.
    pub fn get_wellness_summary(&self, user_id: &str) -> Result<WellnessSummary, EngineError> {
        let now = self.clock.now();
        let score = self.score_at(user_id)?;
        let streak = self.streaks_at(user_id, now)?;

        Ok(WellnessSummary {
            score,
            current_streak: streak.current_streak,
            longest_streak: streak.longest_streak,
            risk_tier: classify(score),
        })
    }

    fn score_at(&self, user_id: &str) -> Result<u8, EngineError> {
        let window = self.store.fetch_entries(user_id, self.config.window_days)?;
        Ok(ScoreCalculator::compute(&window))
    }

    fn streaks_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<StreakMetrics, EngineError> {
        let history = self.store.fetch_all_entries(user_id)?;
        Ok(self.streaks.compute(&history, self.streaks.local_date(now)))
    }

    /// Save decider state to JSON
    pub fn save_state(&self) -> Result<String, EngineError> {
        Ok(self.decider.to_json()?)
    }

    /// Load decider state from JSON
    pub fn load_state(&self, json: &str) -> Result<(), EngineError> {
        Ok(self.decider.load_json(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FixedClock, InMemoryEntryStore, InMemoryNotificationSink};
    use crate::types::{MoodEntry, MoodLevel, NotificationKind, RiskTier};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct Harness {
        clock: Arc<FixedClock>,
        store: Arc<InMemoryEntryStore>,
        engine: WellnessEngine<Arc<InMemoryEntryStore>, Arc<FixedClock>>,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, 9, 0, 0).unwrap()
    }

    fn harness() -> Harness {
        let clock = Arc::new(FixedClock::new(start()));
        let store = Arc::new(InMemoryEntryStore::new(clock.clone()));
        let engine =
            WellnessEngine::with_config(store.clone(), clock.clone(), EngineConfig::default())
                .unwrap();
        Harness {
            clock,
            store,
            engine,
        }
    }

    impl Harness {
        fn log(&self, mood: MoodLevel, energy: u8, sleep: f64, stress: u8) {
            self.store
                .append(MoodEntry {
                    user_id: "u1".to_string(),
                    mood_level: mood,
                    energy_level: energy,
                    sleep_hours: sleep,
                    stress_level: stress,
                    created_at: self.clock.now(),
                })
                .unwrap();
        }
    }

    struct DownStore;

    impl EntryStore for DownStore {
        fn fetch_entries(&self, _: &str, _: u32) -> Result<Vec<MoodEntry>, EngineError> {
            Err(EngineError::UpstreamUnavailable("entry store offline".to_string()))
        }

        fn fetch_all_entries(&self, _: &str) -> Result<Vec<MoodEntry>, EngineError> {
            Err(EngineError::UpstreamUnavailable("entry store offline".to_string()))
        }
    }

    struct DownSink;

    impl NotificationSink for DownSink {
        fn persist(&self, _: Notification) -> Result<NotificationId, EngineError> {
            Err(EngineError::UpstreamUnavailable("sink offline".to_string()))
        }
    }

    #[test]
    fn test_first_entry_emits_baseline() {
        let h = harness();
        h.log(MoodLevel::Good, 6, 7.5, 4);

        let n = h.engine.on_new_entry_logged("u1").unwrap().unwrap();
        // 80 + 2 + 5 + 6
        assert_eq!(n.current_score, 93);
        assert_eq!(n.previous_score, 93);
        assert_eq!(n.score_change, 0);
        assert_eq!(h.engine.decider().state("u1").unwrap().last_known_score, 93);
    }

    #[test]
    fn test_repeat_within_cooldown_is_quiet() {
        let h = harness();
        h.log(MoodLevel::Good, 6, 7.5, 4);
        h.engine.on_new_entry_logged("u1").unwrap();

        h.clock.advance(Duration::hours(2));
        h.log(MoodLevel::Good, 5, 7.0, 5);
        assert_eq!(h.engine.on_new_entry_logged("u1").unwrap(), None);
    }

    #[test]
    fn test_sharp_drop_alerts_inside_cooldown() {
        let h = harness();
        h.log(MoodLevel::Neutral, 5, 7.0, 5);
        h.engine.on_new_entry_logged("u1").unwrap();

        h.clock.advance(Duration::minutes(30));
        for _ in 0..4 {
            h.log(MoodLevel::VeryLow, 1, 3.0, 10);
        }
        let n = h.engine.on_new_entry_logged("u1").unwrap().unwrap();
        assert_eq!(n.kind, NotificationKind::Alert);
        assert!(n.current_score < 30);
    }

    #[test]
    fn test_summary_is_read_only() {
        let h = harness();
        h.log(MoodLevel::Low, 4, 5.0, 7);

        let summary = h.engine.get_wellness_summary("u1").unwrap();
        // 40 - 2 - 5 + 3
        assert_eq!(
            summary,
            WellnessSummary {
                score: 36,
                current_streak: 1,
                longest_streak: 1,
                risk_tier: RiskTier::Medium,
            }
        );
        assert_eq!(h.engine.decider().state("u1"), None);
    }

    #[test]
    fn test_summary_without_entries() {
        let h = harness();
        let summary = h.engine.get_wellness_summary("nobody").unwrap();
        assert_eq!(summary.score, 50);
        assert_eq!(summary.current_streak, 0);
        assert_eq!(summary.risk_tier, RiskTier::Low);
    }

    #[test]
    fn test_store_failure_propagates_without_state_change() {
        let engine = WellnessEngine::new(DownStore);
        let err = engine.on_new_entry_logged("u1").unwrap_err();
        assert!(matches!(err, EngineError::UpstreamUnavailable(_)));
        assert_eq!(engine.decider().state("u1"), None);

        assert_eq!(engine.on_new_entry_logged_best_effort("u1"), None);
    }

    #[test]
    fn test_log_and_notify_persists() {
        let h = harness();
        let sink = InMemoryNotificationSink::new();
        h.log(MoodLevel::Excellent, 8, 8.0, 2);

        let id = h.engine.log_and_notify("u1", &sink).unwrap().unwrap();
        let stored = sink.list("u1");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].0, id);

        h.clock.advance(Duration::hours(1));
        assert_eq!(h.engine.log_and_notify("u1", &sink).unwrap(), None);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_sink_failure_is_returned() {
        let h = harness();
        h.log(MoodLevel::Good, 5, 7.0, 5);
        let err = h.engine.log_and_notify("u1", &DownSink).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_state_round_trip_across_engines() {
        let h = harness();
        h.log(MoodLevel::Good, 6, 7.5, 4);
        h.engine.on_new_entry_logged("u1").unwrap();
        let saved = h.engine.save_state().unwrap();

        let restored = WellnessEngine::with_config(
            h.store.clone(),
            h.clock.clone(),
            EngineConfig::default(),
        )
        .unwrap();
        restored.load_state(&saved).unwrap();

        h.clock.advance(Duration::hours(1));
        assert_eq!(restored.on_new_entry_logged("u1").unwrap(), None);
    }

    #[test]
    fn test_config_policy_reaches_decider() {
        let config = EngineConfig::from_toml_str("min_delta = 5\ncooldown_hours = 6").unwrap();
        let clock = Arc::new(FixedClock::new(start()));
        let store = Arc::new(InMemoryEntryStore::new(clock.clone()));
        let engine = WellnessEngine::with_config(store.clone(), clock.clone(), config.clone())
            .unwrap();
        assert_eq!(engine.decider().policy(), &config.decider_policy());
        assert_eq!(engine.decider().policy().min_delta, 5);

        store
            .append(MoodEntry {
                user_id: "u1".to_string(),
                mood_level: MoodLevel::Good,
                energy_level: 5,
                sleep_hours: 7.0,
                stress_level: 5,
                created_at: start(),
            })
            .unwrap();
        engine.on_new_entry_logged("u1").unwrap().unwrap();

        // 90 then 83.5 rounds to 84: a 6 point drop clears the lower threshold
        clock.advance(Duration::hours(7));
        store
            .append(MoodEntry {
                user_id: "u1".to_string(),
                mood_level: MoodLevel::Good,
                energy_level: 5,
                sleep_hours: 5.0,
                stress_level: 8,
                created_at: clock.now(),
            })
            .unwrap();
        let n = engine.on_new_entry_logged("u1").unwrap().unwrap();
        assert_eq!(n.score_change, -6);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            window_days: 0,
            ..EngineConfig::default()
        };
        let result = WellnessEngine::with_config(DownStore, SystemClock, config);
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
