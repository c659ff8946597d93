//! Nudge escalation: text, then call, then in person.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::connection::{ConnectionHealth, LifecycleState};
use super::strength::StrengthTier;
use crate::action::ActionType;
use crate::error::ValidationError;

/// Escalation step suggested for a drifting connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeLevel {
    Text,
    Call,
    InPerson,
}

impl NudgeLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            NudgeLevel::Text => "text",
            NudgeLevel::Call => "call",
            NudgeLevel::InPerson => "in_person",
        }
    }

    /// Action the user is asked to take at this level.
    pub fn suggested_action(self) -> ActionType {
        match self {
            NudgeLevel::Text => ActionType::Text,
            NudgeLevel::Call => ActionType::Call,
            NudgeLevel::InPerson => ActionType::InPerson,
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            NudgeLevel::Text => "Send a quick text to check in",
            NudgeLevel::Call => "Give them a call this week",
            NudgeLevel::InPerson => "Make a plan to see them in person",
        }
    }
}

impl FromStr for NudgeLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(NudgeLevel::Text),
            "call" => Ok(NudgeLevel::Call),
            "in_person" => Ok(NudgeLevel::InPerson),
            _ => Err(ValidationError::UnknownLabel {
                kind: "nudge level",
                value: s.to_string(),
            }),
        }
    }
}

/// Suggest the next nudge, or `None` when the connection is healthy or archived.
///
/// Thinning asks for a text and decaying for a call. Decay lasting at least two
/// full cadences asks to meet in person. While decay continues the level never
/// drops below what was already suggested.
pub fn next_nudge(
    health: &ConnectionHealth,
    cadence_days: u32,
    now: DateTime<Utc>,
) -> Option<NudgeLevel> {
    if health.lifecycle_state == LifecycleState::Archived {
        return None;
    }

    let base = match health.current_strength {
        StrengthTier::Thinning => NudgeLevel::Text,
        StrengthTier::Decaying => {
            let long_decay = health
                .decay_days(now)
                .is_some_and(|d| d >= 2 * i64::from(cadence_days.max(1)));
            if long_decay {
                NudgeLevel::InPerson
            } else {
                NudgeLevel::Call
            }
        }
        _ => return None,
    };

    Some(health.last_nudge_level.map_or(base, |prev| prev.max(base)))
}

/// Record that a nudge went out; the connection now awaits an action.
pub fn mark_nudged(health: &mut ConnectionHealth, level: NudgeLevel, now: DateTime<Utc>) {
    health.last_nudge_level = Some(level);
    health.last_nudge_at = Some(now);
    if health.lifecycle_state == LifecycleState::Active {
        health.lifecycle_state = LifecycleState::PendingAction;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::RingTier;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn health_at(tier: StrengthTier) -> ConnectionHealth {
        let mut health = ConnectionHealth::new(Uuid::new_v4(), RingTier::Core);
        health.current_strength = tier;
        health
    }

    #[test]
    fn healthy_connections_get_no_nudge() {
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        assert_eq!(next_nudge(&health_at(StrengthTier::Stable), 7, now), None);
    }

    #[test]
    fn escalates_with_decay_length() {
        let now = Utc.with_ymd_and_hms(2024, 1, 30, 0, 0, 0).unwrap();
        assert_eq!(
            next_nudge(&health_at(StrengthTier::Thinning), 7, now),
            Some(NudgeLevel::Text)
        );

        let mut decaying = health_at(StrengthTier::Decaying);
        decaying.decay_started_at = Some(now - Duration::days(3));
        assert_eq!(next_nudge(&decaying, 7, now), Some(NudgeLevel::Call));

        decaying.decay_started_at = Some(now - Duration::days(14));
        assert_eq!(next_nudge(&decaying, 7, now), Some(NudgeLevel::InPerson));
    }

    #[test]
    fn never_de_escalates_and_archived_is_silent() {
        let now = Utc.with_ymd_and_hms(2024, 1, 30, 0, 0, 0).unwrap();
        let mut health = health_at(StrengthTier::Thinning);
        mark_nudged(&mut health, NudgeLevel::Call, now);
        assert_eq!(health.lifecycle_state, LifecycleState::PendingAction);
        assert_eq!(next_nudge(&health, 7, now), Some(NudgeLevel::Call));

        health.lifecycle_state = LifecycleState::Archived;
        assert_eq!(next_nudge(&health, 7, now), None);
    }
}
