//! Unlock evaluation against the static catalogue.
//!
//! The evaluator is a pure function of (signals, existing rows). Re-running it
//! against unchanged inputs produces an empty [`Evaluation`]. The store still
//! enforces uniqueness on `(user, achievement, connection)` when persisting.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use super::{catalogue, AchievementDefinition, ProgressSignals, UserAchievement};
use crate::error::{ensure_user, InvalidUserError};

/// Rows to write after one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    /// Rows not yet unlocked whose progress moved
    pub progress_updates: Vec<UserAchievement>,
    /// Rows unlocked by this evaluation
    pub unlocked: Vec<UserAchievement>,
}

impl Evaluation {
    pub fn is_empty(&self) -> bool {
        self.progress_updates.is_empty() && self.unlocked.is_empty()
    }
}

/// Evaluates a catalogue of definitions.
#[derive(Debug, Clone)]
pub struct AchievementEvaluator {
    definitions: &'static [AchievementDefinition],
}

impl Default for AchievementEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl AchievementEvaluator {
    /// Create an evaluator over the built-in catalogue
    pub fn new() -> Self {
        Self {
            definitions: catalogue(),
        }
    }

    pub fn with_definitions(definitions: &'static [AchievementDefinition]) -> Self {
        Self { definitions }
    }

    pub fn definitions(&self) -> &'static [AchievementDefinition] {
        self.definitions
    }

    /// Compare signals against every definition.
    ///
    /// # Errors
    /// Returns [`InvalidUserError::Missing`] for the nil user id.
    pub fn evaluate(
        &self,
        user_id: Uuid,
        signals: &ProgressSignals,
        existing: &[UserAchievement],
        now: DateTime<Utc>,
    ) -> Result<Evaluation, InvalidUserError> {
        let user_id = ensure_user(user_id)?;
        let existing: HashMap<(&str, Option<Uuid>), &UserAchievement> = existing
            .iter()
            .filter(|row| row.user_id == user_id)
            .map(|row| (row.key(), row))
            .collect();

        let mut evaluation = Evaluation::default();

        for definition in self.definitions {
            let candidates: Vec<(Option<Uuid>, u32)> = if definition.is_per_contact {
                signals
                    .cycles_by_connection
                    .iter()
                    .map(|(id, cycles)| (Some(*id), *cycles))
                    .collect()
            } else {
                signals
                    .global_value(definition.threshold_type)
                    .map(|value| vec![(None, value)])
                    .unwrap_or_default()
            };

            for (connection_id, value) in candidates {
                let prior = existing.get(&(definition.id, connection_id)).copied();
                if prior.is_some_and(|row| row.is_unlocked) {
                    continue;
                }

                let progress = value.min(definition.threshold_value);
                let row = UserAchievement {
                    user_id,
                    achievement_id: definition.id.to_string(),
                    connection_id,
                    current_progress: progress,
                    is_unlocked: false,
                    unlocked_at: None,
                };

                if value >= definition.threshold_value {
                    tracing::info!(
                        achievement = definition.id,
                        connection = ?connection_id,
                        "achievement unlocked"
                    );
                    evaluation.unlocked.push(UserAchievement {
                        is_unlocked: true,
                        unlocked_at: Some(now),
                        ..row
                    });
                } else if prior.map_or(true, |p| p.current_progress != progress) {
                    evaluation.progress_updates.push(row);
                }
            }
        }

        Ok(evaluation)
    }
}
