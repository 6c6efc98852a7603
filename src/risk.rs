//! Risk classification of wellness scores

use crate::types::RiskTier;

/// Scores below this are high risk and bypass notification cooldowns
pub const HIGH_RISK_BELOW: u8 = 30;

/// Scores below this (and at least [`HIGH_RISK_BELOW`]) are medium risk
pub const MEDIUM_RISK_BELOW: u8 = 50;

/// Map a wellness score to its risk tier.
pub fn classify(score: u8) -> RiskTier {
    if score < HIGH_RISK_BELOW {
        RiskTier::High
    } else if score < MEDIUM_RISK_BELOW {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}
