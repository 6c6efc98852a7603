//! Notification decision state machine
//!
//! Holds the per-user [`UserWellnessState`] and decides whether a freshly
//! computed score warrants a notification. A user starts `Unseen` and becomes
//! tracked after the first (baseline) decision.
//!
//! Decisions for one user are serialized behind that user's lock so the
//! read-decide-write cycle is atomic; different users never contend beyond a
//! short map lookup.
//!
//! State only advances when a notification is emitted. Suppressed checks leave
//! `last_known_score` untouched so a run of small moves in one direction still
//! adds up to a significant change.

use crate::error::EngineError;
use crate::risk::{HIGH_RISK_BELOW, MEDIUM_RISK_BELOW};
use crate::types::{DecisionContext, UserWellnessState};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Default minimum absolute score change that is worth a notification
pub const DEFAULT_MIN_DELTA: u8 = 10;

/// Default cooldown between non-urgent notifications, in hours
pub const DEFAULT_COOLDOWN_HOURS: i64 = 24;

/// Thresholds applied by the decider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeciderPolicy {
    pub min_delta: u8,
    pub cooldown: Duration,
}

impl Default for DeciderPolicy {
    fn default() -> Self {
        Self {
            min_delta: DEFAULT_MIN_DELTA,
            cooldown: Duration::hours(DEFAULT_COOLDOWN_HOURS),
        }
    }
}

/// Why a check produced no notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    BelowThreshold,
    Cooldown,
}

/// Outcome of evaluating one score against the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// First score seen for the user
    Baseline,
    Suppressed(Suppression),
    Emit { forced: bool },
}

/// Evaluate a score against a user's state without mutating anything.
pub fn evaluate(
    state: Option<&UserWellnessState>,
    current_score: u8,
    now: DateTime<Utc>,
    policy: &DeciderPolicy,
) -> Verdict {
    let Some(state) = state else {
        return Verdict::Baseline;
    };

    let delta = (i32::from(current_score) - i32::from(state.last_known_score)).abs();
    if delta < i32::from(policy.min_delta) && current_score >= HIGH_RISK_BELOW {
        return Verdict::Suppressed(Suppression::BelowThreshold);
    }

    let elapsed = now - state.last_notification_at;
    if elapsed < policy.cooldown && current_score >= MEDIUM_RISK_BELOW {
        return Verdict::Suppressed(Suppression::Cooldown);
    }

    Verdict::Emit {
        forced: current_score < HIGH_RISK_BELOW,
    }
}

type Slot = Arc<Mutex<Option<UserWellnessState>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // State stays consistent across a panic: it is only written after a decision completes.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stateful decider owning every user's wellness state
#[derive(Debug, Default)]
pub struct NotificationDecider {
    policy: DeciderPolicy,
    states: Mutex<HashMap<String, Slot>>,
}

impl NotificationDecider {
    pub fn new(policy: DeciderPolicy) -> Self {
        Self {
            policy,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &DeciderPolicy {
        &self.policy
    }

    fn slot(&self, user_id: &str) -> Slot {
        let mut states = lock(&self.states);
        states.entry(user_id.to_string()).or_default().clone()
    }

    /// Decide whether `current_score` warrants a notification for `user_id`.
    ///
    /// Returns the decision context when a notification should be emitted, in
    /// which case the user's state has already been advanced.
    pub fn decide(
        &self,
        user_id: &str,
        current_score: u8,
        now: DateTime<Utc>,
    ) -> Option<DecisionContext> {
        let slot = self.slot(user_id);
        let mut state = lock(&slot);
        self.apply(user_id, &mut state, current_score, now)
    }

    /// Like [`decide`](Self::decide), but only if the user's state version still
    /// matches `expected_version` (0 for a user that has never been seen).
    ///
    /// A mismatch means another update won the race; nothing is changed and the
    /// caller should retry with fresh state.
    pub fn decide_versioned(
        &self,
        user_id: &str,
        expected_version: u64,
        current_score: u8,
        now: DateTime<Utc>,
    ) -> Result<Option<DecisionContext>, EngineError> {
        let slot = self.slot(user_id);
        let mut state = lock(&slot);

        let actual = state.as_ref().map_or(0, |s| s.version);
        if actual != expected_version {
            return Err(EngineError::StateConflict {
                user_id: user_id.to_string(),
                expected: expected_version,
                actual,
            });
        }

        Ok(self.apply(user_id, &mut state, current_score, now))
    }

    fn apply(
        &self,
        user_id: &str,
        state: &mut Option<UserWellnessState>,
        current_score: u8,
        now: DateTime<Utc>,
    ) -> Option<DecisionContext> {
        let verdict = evaluate(state.as_ref(), current_score, now, &self.policy);

        let ctx = match verdict {
            Verdict::Baseline => DecisionContext::new(current_score, current_score, false),
            Verdict::Suppressed(reason) => {
                debug!(user_id, current_score, ?reason, "notification suppressed");
                return None;
            }
            Verdict::Emit { forced } => {
                let previous = state.as_ref().map_or(current_score, |s| s.last_known_score);
                DecisionContext::new(previous, current_score, forced)
            }
        };

        let version = state.as_ref().map_or(0, |s| s.version) + 1;
        *state = Some(UserWellnessState {
            last_known_score: current_score,
            last_notification_at: now,
            version,
        });

        debug!(
            user_id,
            previous_score = ctx.previous_score,
            current_score,
            delta = ctx.delta,
            forced = ctx.forced,
            "notification decided"
        );
        Some(ctx)
    }

    /// Snapshot of a user's state, `None` while the user is unseen
    pub fn state(&self, user_id: &str) -> Option<UserWellnessState> {
        let states = lock(&self.states);
        let slot = states.get(user_id)?;
        let state = lock(slot).clone();
        state
    }

    /// Reset a user back to unseen.
    ///
    /// The slot is cleared in place so a decision already holding it writes
    /// into live state.
    pub fn forget(&self, user_id: &str) {
        let states = lock(&self.states);
        if let Some(slot) = states.get(user_id) {
            *lock(slot) = None;
        }
    }

    /// Number of tracked users
    pub fn tracked_users(&self) -> usize {
        let states = lock(&self.states);
        states.values().filter(|slot| lock(slot).is_some()).count()
    }

    /// Copy of every tracked user's state
    pub fn snapshot(&self) -> HashMap<String, UserWellnessState> {
        let states = lock(&self.states);
        states
            .iter()
            .filter_map(|(user, slot)| lock(slot).clone().map(|s| (user.clone(), s)))
            .collect()
    }

    /// Replace all state with `snapshot`.
    ///
    /// Existing slots are overwritten in place; users missing from the
    /// snapshot become unseen.
    pub fn restore(&self, mut snapshot: HashMap<String, UserWellnessState>) {
        let mut states = lock(&self.states);
        for (user, slot) in states.iter() {
            *lock(slot) = snapshot.remove(user);
        }
        for (user, state) in snapshot {
            states.insert(user, Arc::new(Mutex::new(Some(state))));
        }
    }

    /// Serialize all tracked state to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.snapshot())
    }

    /// Load tracked state from JSON, replacing what is held
    pub fn load_json(&self, json: &str) -> Result<(), serde_json::Error> {
        let snapshot: HashMap<String, UserWellnessState> = serde_json::from_str(json)?;
        self.restore(snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap()
    }

    fn tracked(score: u8, last_at: DateTime<Utc>) -> UserWellnessState {
        UserWellnessState {
            last_known_score: score,
            last_notification_at: last_at,
            version: 1,
        }
    }

    fn decider_with(user: &str, state: UserWellnessState) -> NotificationDecider {
        let decider = NotificationDecider::default();
        decider.restore(HashMap::from([(user.to_string(), state)]));
        decider
    }

    #[test]
    fn test_first_score_is_baseline() {
        let decider = NotificationDecider::default();
        let ctx = decider.decide("u1", 64, t0()).unwrap();

        assert_eq!(ctx, DecisionContext::new(64, 64, false));
        assert_eq!(ctx.delta, 0);
        assert_eq!(
            decider.state("u1"),
            Some(UserWellnessState {
                last_known_score: 64,
                last_notification_at: t0(),
                version: 1,
            })
        );
    }

    #[test]
    fn test_baseline_is_not_forced_even_when_urgent() {
        let decider = NotificationDecider::default();
        let ctx = decider.decide("u1", 12, t0()).unwrap();
        assert!(!ctx.forced);
    }

    #[test]
    fn test_cooldown_suppression() {
        let now = t0();
        let state = tracked(52, now - Duration::hours(1));
        let decider = decider_with("u1", state.clone());

        assert_eq!(decider.decide("u1", 55, now), None);
        assert_eq!(decider.state("u1"), Some(state));
    }

    #[test]
    fn test_cooldown_blocks_large_good_news() {
        let now = t0();
        let state = tracked(60, now - Duration::hours(1));
        assert_eq!(
            evaluate(Some(&state), 75, now, &DeciderPolicy::default()),
            Verdict::Suppressed(Suppression::Cooldown)
        );
    }

    #[test]
    fn test_large_change_after_cooldown_emits() {
        let now = t0();
        let decider = decider_with("u1", tracked(60, now - Duration::hours(25)));

        let ctx = decider.decide("u1", 75, now).unwrap();
        assert_eq!(ctx, DecisionContext::new(60, 75, false));
        let state = decider.state("u1").unwrap();
        assert_eq!(state.last_known_score, 75);
        assert_eq!(state.last_notification_at, now);
        assert_eq!(state.version, 2);
    }

    #[test]
    fn test_urgent_bypass() {
        let now = t0();
        let decider = decider_with("u1", tracked(32, now - Duration::minutes(1)));

        let ctx = decider.decide("u1", 25, now).unwrap();
        assert!(ctx.forced);
        assert_eq!(ctx.previous_score, 32);
        assert_eq!(ctx.delta, -7);
    }

    #[test]
    fn test_medium_risk_bypasses_cooldown() {
        let now = t0();
        let decider = decider_with("u1", tracked(60, now - Duration::hours(1)));

        let ctx = decider.decide("u1", 45, now).unwrap();
        assert!(!ctx.forced);
        assert_eq!(ctx.delta, -15);
    }

    #[test]
    fn test_small_move_in_medium_tier_is_suppressed() {
        let now = t0();
        let state = tracked(45, now - Duration::hours(30));
        assert_eq!(
            evaluate(Some(&state), 40, now, &DeciderPolicy::default()),
            Verdict::Suppressed(Suppression::BelowThreshold)
        );
    }

    #[test]
    fn test_no_state_drift_on_suppression() {
        let now = t0();
        let decider = NotificationDecider::default();
        decider.decide("u1", 60, now).unwrap();
        let baseline = decider.state("u1");

        for (i, score) in [63u8, 64, 63].into_iter().enumerate() {
            let at = now + Duration::hours(30 * (i as i64 + 1));
            assert_eq!(decider.decide("u1", score, at), None);
        }

        assert_eq!(decider.state("u1"), baseline);
        assert_eq!(decider.state("u1").unwrap().last_known_score, 60);
    }

    #[test]
    fn test_small_moves_accumulate() {
        let now = t0();
        let decider = NotificationDecider::default();
        decider.decide("u1", 60, now).unwrap();

        let later = now + Duration::days(2);
        assert_eq!(decider.decide("u1", 64, later), None);
        assert_eq!(decider.decide("u1", 68, later), None);
        let ctx = decider.decide("u1", 71, later).unwrap();
        assert_eq!(ctx.previous_score, 60);
        assert_eq!(ctx.delta, 11);
    }

    #[test]
    fn test_versioned_conflict_leaves_state() {
        let now = t0();
        let decider = NotificationDecider::default();
        decider.decide("u1", 70, now).unwrap();

        let err = decider.decide_versioned("u1", 0, 20, now).unwrap_err();
        assert!(matches!(
            err,
            EngineError::StateConflict { expected: 0, actual: 1, .. }
        ));
        assert!(err.is_retryable());
        assert_eq!(decider.state("u1").unwrap().last_known_score, 70);

        let ctx = decider.decide_versioned("u1", 1, 20, now).unwrap().unwrap();
        assert_eq!(ctx.delta, -50);
        assert_eq!(decider.state("u1").unwrap().version, 2);
    }

    #[test]
    fn test_users_are_independent() {
        let now = t0();
        let decider = NotificationDecider::default();
        decider.decide("u1", 70, now).unwrap();
        assert!(decider.decide("u2", 70, now).is_some());
        assert_eq!(decider.tracked_users(), 2);

        decider.forget("u1");
        assert_eq!(decider.state("u1"), None);
        assert_eq!(decider.tracked_users(), 1);
    }

    #[test]
    fn test_held_slot_survives_forget_and_restore() {
        let now = t0();
        let decider = NotificationDecider::default();
        decider.decide("u1", 70, now).unwrap();

        // A decision that picked up the slot before the reset lands in live state
        let held = decider.slot("u1");
        decider.forget("u1");
        *lock(&held) = Some(tracked(40, now));
        assert_eq!(decider.state("u1").unwrap().last_known_score, 40);

        let held = decider.slot("u1");
        decider.restore(HashMap::from([("u2".to_string(), tracked(55, now))]));
        assert_eq!(decider.state("u1"), None);
        *lock(&held) = Some(tracked(33, now));
        assert_eq!(decider.state("u1").unwrap().last_known_score, 33);
        assert_eq!(decider.state("u2").unwrap().last_known_score, 55);
    }

    #[test]
    fn test_state_serialization() {
        let now = t0();
        let decider = NotificationDecider::default();
        decider.decide("u1", 58, now).unwrap();

        let json = decider.to_json().unwrap();
        let loaded = NotificationDecider::default();
        loaded.load_json(&json).unwrap();

        assert_eq!(loaded.state("u1"), decider.state("u1"));
    }

    #[test]
    fn test_concurrent_decisions_emit_baseline_once() {
        let decider = Arc::new(NotificationDecider::default());
        let now = t0();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let decider = Arc::clone(&decider);
                std::thread::spawn(move || decider.decide("u1", 66, now).is_some())
            })
            .collect();

        let emitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|emitted| *emitted)
            .count();
        assert_eq!(emitted, 1);
    }
}
