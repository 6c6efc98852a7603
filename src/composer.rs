//! Notification composition
//!
//! Turns an emitted decision into a notification record. Branches are checked
//! in precedence order and the first match wins; milestones outrank alerts,
//! which outrank plain improvement/decline messages.
//!
//! Every message carries the literal current score and change so the record can
//! be checked against the scores it was built from.

use crate::risk::{HIGH_RISK_BELOW, MEDIUM_RISK_BELOW};
use crate::types::{DecisionContext, Notification, NotificationKind, Priority, StreakMetrics};
use chrono::{DateTime, Utc};

/// Scores at or above this are "excellent"
pub const EXCELLENT_MILESTONE: u8 = 80;

/// Scores at or above this are "great progress"
pub const GREAT_MILESTONE: u8 = 70;

/// Absolute change considered significant
pub const SIGNIFICANT_CHANGE: i32 = 20;

/// Absolute change considered notable
pub const NOTABLE_CHANGE: i32 = 10;

/// Streak length that earns a mention in positive messages
pub const STREAK_MENTION_DAYS: u32 = 3;

/// Branch of the classification tree that produced a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    ExcellentMilestone,
    GreatProgressMilestone,
    CheckRequired,
    HereToHelp,
    SignificantImprovement,
    Improving,
    SignificantDecline,
    CheckingIn,
    General,
}

impl Template {
    /// Select the template for a decision.
    pub fn select(ctx: &DecisionContext) -> Self {
        let current = ctx.current_score;
        let previous = ctx.previous_score;
        let magnitude = ctx.delta.abs();

        if current >= EXCELLENT_MILESTONE && previous < EXCELLENT_MILESTONE {
            Template::ExcellentMilestone
        } else if current >= GREAT_MILESTONE && previous < GREAT_MILESTONE {
            Template::GreatProgressMilestone
        } else if current < HIGH_RISK_BELOW {
            Template::CheckRequired
        } else if current < MEDIUM_RISK_BELOW && previous >= MEDIUM_RISK_BELOW {
            Template::HereToHelp
        } else if ctx.delta > 0 && magnitude >= SIGNIFICANT_CHANGE {
            Template::SignificantImprovement
        } else if ctx.delta > 0 && magnitude >= NOTABLE_CHANGE {
            Template::Improving
        } else if ctx.delta < 0 && magnitude >= SIGNIFICANT_CHANGE {
            Template::SignificantDecline
        } else if ctx.delta < 0 && magnitude >= NOTABLE_CHANGE {
            Template::CheckingIn
        } else {
            Template::General
        }
    }

    pub fn kind(&self, delta: i32) -> NotificationKind {
        match self {
            Template::ExcellentMilestone | Template::GreatProgressMilestone => {
                NotificationKind::Milestone
            }
            Template::CheckRequired | Template::HereToHelp => NotificationKind::Alert,
            Template::SignificantImprovement | Template::Improving => NotificationKind::Improvement,
            Template::SignificantDecline | Template::CheckingIn => NotificationKind::Decline,
            Template::General if delta >= 0 => NotificationKind::Improvement,
            Template::General => NotificationKind::Decline,
        }
    }

    pub fn priority(&self) -> Priority {
        match self {
            Template::CheckRequired | Template::HereToHelp => Priority::High,
            Template::ExcellentMilestone
            | Template::GreatProgressMilestone
            | Template::SignificantImprovement
            | Template::SignificantDecline => Priority::Medium,
            Template::Improving | Template::CheckingIn | Template::General => Priority::Low,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Template::ExcellentMilestone => "Excellent Wellness Reached!",
            Template::GreatProgressMilestone => "Great Progress!",
            Template::CheckRequired => "Wellness Check Required",
            Template::HereToHelp => "We're Here to Help",
            Template::SignificantImprovement => "Significant Improvement!",
            Template::Improving => "You're Improving",
            Template::SignificantDecline => "Wellness Score Update",
            Template::CheckingIn => "Checking In",
            Template::General => "Wellness Update",
        }
    }

    fn message(&self, ctx: &DecisionContext) -> String {
        let current = ctx.current_score;
        let delta = ctx.delta;
        let magnitude = delta.abs();

        match self {
            Template::ExcellentMilestone => format!(
                "Congratulations! Your wellness score reached {current} ({delta:+} points). \
                 You're in excellent shape."
            ),
            Template::GreatProgressMilestone => format!(
                "Your wellness score climbed to {current} ({delta:+} points). \
                 Keep up the healthy habits."
            ),
            Template::CheckRequired => format!(
                "Your wellness score is {current} ({delta:+} points). Please consider reaching \
                 out to a counselor or someone you trust."
            ),
            Template::HereToHelp => format!(
                "Your wellness score dropped to {current} ({delta:+} points). Support resources \
                 are available whenever you need them."
            ),
            Template::SignificantImprovement => {
                format!("Your wellness score rose by {magnitude} points to {current}.")
            }
            Template::Improving => {
                format!("Your wellness score is up {magnitude} points to {current}.")
            }
            Template::SignificantDecline => format!(
                "Your wellness score dropped by {magnitude} points to {current}. \
                 Take some time for yourself today."
            ),
            Template::CheckingIn => format!(
                "Your wellness score is down {magnitude} points to {current}. How are you feeling?"
            ),
            Template::General => format!(
                "Your wellness score changed by {delta:+} points and is now {current}."
            ),
        }
    }

    fn is_positive(&self) -> bool {
        matches!(
            self,
            Template::ExcellentMilestone
                | Template::GreatProgressMilestone
                | Template::SignificantImprovement
                | Template::Improving
        )
    }
}

/// Composer for notification records
pub struct NotificationComposer;

impl NotificationComposer {
    /// Build the notification for an emitted decision.
    pub fn compose(
        user_id: &str,
        ctx: &DecisionContext,
        streak: &StreakMetrics,
        created_at: DateTime<Utc>,
    ) -> Notification {
        let template = Template::select(ctx);

        let mut message = template.message(ctx);
        if template.is_positive() && streak.current_streak >= STREAK_MENTION_DAYS {
            message.push_str(&format!(
                " You've logged {} days in a row.",
                streak.current_streak
            ));
        }

        Notification {
            user_id: user_id.to_string(),
            kind: template.kind(ctx.delta),
            title: template.title().to_string(),
            message,
            previous_score: ctx.previous_score,
            current_score: ctx.current_score,
            score_change: ctx.delta,
            priority: template.priority(),
            created_at,
            read: false,
        }
    }
}
