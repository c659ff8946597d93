//! Achievement catalogue, progress signals and unlock evaluation.

pub mod definitions;
mod evaluator;
mod progress;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use definitions::{catalogue, find_definition};
pub use evaluator::{AchievementEvaluator, Evaluation};
pub use progress::{consecutive_cycles, ConnectionSnapshot, ProgressSignals};

/// Achievement category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    /// Global daily streak milestones
    Streak,
    /// Per-connection cadence cycles kept in a row
    Consistency,
    /// Pulling connections back out of decay
    Recovery,
    /// Depth and thoughtfulness of contact
    Quality,
}

/// What the threshold of a definition is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdType {
    /// Current streak length in days
    StreakDays,
    /// Consecutive cadence cycles met for one connection
    ConsecutiveCycles,
    /// Recoveries ever recorded
    RecoveryCount,
    /// Recoveries within the trailing window
    RecoveriesInWindow,
    /// Share of active connections at stable or better
    ForestHealthPercent,
    /// In-person actions within the trailing window
    InPersonActions,
    /// Actions carrying a memory note within the trailing window
    MemoryNotes,
    /// Distinct action types within the trailing window
    DistinctActionTypes,
}

impl ThresholdType {
    /// Trailing window the signal is measured over, if any.
    pub fn window_days(self) -> Option<i64> {
        match self {
            ThresholdType::RecoveriesInWindow
            | ThresholdType::InPersonActions
            | ThresholdType::MemoryNotes => Some(30),
            ThresholdType::DistinctActionTypes => Some(7),
            _ => None,
        }
    }
}

/// Static achievement definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AchievementDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: AchievementCategory,
    pub threshold_value: u32,
    pub threshold_type: ThresholdType,
    pub is_per_contact: bool,
}

/// A user's progress on one definition (optionally for one connection).
///
/// Unique on `(user_id, achievement_id, connection_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAchievement {
    pub user_id: Uuid,
    pub achievement_id: String,
    pub connection_id: Option<Uuid>,
    pub current_progress: u32,
    pub is_unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl UserAchievement {
    pub fn key(&self) -> (&str, Option<Uuid>) {
        (self.achievement_id.as_str(), self.connection_id)
    }

    /// Steps still needed ("2 more cycles to Rhythm Master").
    pub fn remaining(&self, definition: &AchievementDefinition) -> u32 {
        definition.threshold_value.saturating_sub(self.current_progress)
    }

    /// Get progress percentage (0..100)
    pub fn percentage(&self, definition: &AchievementDefinition) -> u32 {
        if self.is_unlocked || definition.threshold_value == 0 {
            return 100;
        }
        (self.current_progress * 100 / definition.threshold_value).min(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_and_percentage() {
        let def = find_definition("consistency_12").unwrap();
        let progress = UserAchievement {
            user_id: Uuid::new_v4(),
            achievement_id: def.id.to_string(),
            connection_id: Some(Uuid::new_v4()),
            current_progress: 10,
            is_unlocked: false,
            unlocked_at: None,
        };
        assert_eq!(progress.remaining(def), 2);
        assert_eq!(progress.percentage(def), 83);
    }
}
