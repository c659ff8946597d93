//! Orchestration over an [`EngagementStore`].
//!
//! The computation modules are pure. This is where they meet storage: one
//! logged interaction updates the habit log, the streak, the connection's
//! health and the recovery log inside a single transaction, then re-evaluates
//! achievements outside it.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::achievements::{
    AchievementEvaluator, ConnectionSnapshot, Evaluation, ProgressSignals, UserAchievement,
};
use crate::action::{Action, Connection, RingTier};
use crate::error::{ensure_user, CoreError, InvalidUserError, Result, ValidationError};
use crate::habit::{score_day, DailyHabitLog};
use crate::health::{
    decay_days, effective_tier, mark_nudged, next_nudge, status_copy, ConnectionHealth,
    HealthTransition, LifecycleState, NudgeLevel, StrengthTier,
};
use crate::pattern::{analyze_week, WeeklyPattern, WINDOW_DAYS};
use crate::recency::{compare_catchup_urgency, days_since, days_until, Cadence};
use crate::repository::EngagementStore;
use crate::streak::{StreakOutcome, StreakTransition, UserStreak};
use crate::visual::RingVisualization;

/// Compare-and-swap attempts before a streak update gives up.
pub const MAX_STREAK_ATTEMPTS: u32 = 3;

/// What persisting one achievement evaluation achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AchievementOutcome {
    /// Rows unlocked by this call (already-unlocked rows never appear)
    pub unlocked: Vec<UserAchievement>,
    pub progress_updated: usize,
    /// Rows whose write failed; safe to retry by evaluating again
    pub pending_retry: Vec<UserAchievement>,
}

/// Result of [`EngagementEngine::log_interaction`].
#[derive(Debug, Clone, Serialize)]
pub struct InteractionOutcome {
    pub action: Action,
    pub daily_log: DailyHabitLog,
    /// `None` when the day did not qualify for the streak
    pub streak: Option<StreakTransition>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub health: HealthTransition,
    pub status: String,
    pub achievements: AchievementOutcome,
}

/// Result of [`EngagementEngine::sweep_health`].
#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    pub checked: usize,
    /// Only connections whose tier moved
    pub transitions: Vec<HealthTransition>,
    pub achievements: AchievementOutcome,
}

/// One connection as the home screen draws it.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionRing {
    pub connection_id: Uuid,
    pub name: String,
    pub ring_tier: RingTier,
    pub tier: StrengthTier,
    pub status: String,
    pub next_catchup_date: Option<NaiveDate>,
    pub days_until_catchup: Option<i64>,
    pub ring: RingVisualization,
}

#[derive(Debug, Clone, Serialize)]
pub struct NudgeSuggestion {
    pub connection_id: Uuid,
    pub name: String,
    pub tier: StrengthTier,
    pub level: NudgeLevel,
    pub prompt: &'static str,
}

/// Health row for `connection`, falling back to a freshly derived one.
fn health_or_derived(
    stored: Option<ConnectionHealth>,
    connection: &Connection,
    now: DateTime<Utc>,
) -> ConnectionHealth {
    stored.unwrap_or_else(|| {
        let mut health = ConnectionHealth::new(connection.id, connection.ring_tier);
        health.recompute(
            days_since(connection.last_interaction_date, now),
            connection.cadence_days(),
            now,
        );
        health
    })
}

/// Instant recorded as the connection's last interaction for `action`.
///
/// Same-day logs keep the time of logging. Backfilled days use midnight UTC.
fn interaction_instant(action_date: NaiveDate, now: DateTime<Utc>) -> DateTime<Utc> {
    if action_date == now.date_naive() {
        now
    } else {
        action_date.and_time(NaiveTime::MIN).and_utc()
    }
}

pub struct EngagementEngine<S: EngagementStore> {
    store: S,
    evaluator: AchievementEvaluator,
}

impl<S: EngagementStore> EngagementEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            evaluator: AchievementEvaluator::new(),
        }
    }

    pub fn with_evaluator(store: S, evaluator: AchievementEvaluator) -> Self {
        Self { store, evaluator }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reject nil and unknown users before anything is read.
    fn authorize(&self, user_id: Uuid) -> Result<Uuid> {
        let user_id = ensure_user(user_id)?;
        if !self.store.user_exists(user_id)? {
            return Err(InvalidUserError::Unknown(user_id).into());
        }
        Ok(user_id)
    }

    fn connection(&self, user_id: Uuid, connection_id: Uuid) -> Result<Connection> {
        self.store
            .get_connection(user_id, connection_id)?
            .ok_or_else(|| CoreError::NotFound {
                entity: "connection",
                id: connection_id.to_string(),
            })
    }

    pub fn register_user(&self, user_id: Uuid, display_name: &str) -> Result<()> {
        let user_id = ensure_user(user_id)?;
        self.store.create_user(user_id, display_name)?;
        tracing::info!(user = %user_id, "user registered");
        Ok(())
    }

    pub fn add_connection(
        &self,
        user_id: Uuid,
        name: &str,
        cadence: Cadence,
        ring_tier: RingTier,
        next_catchup_date: Option<NaiveDate>,
    ) -> Result<Connection> {
        let user_id = self.authorize(user_id)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".into(),
                message: "connection name must not be empty".into(),
            }
            .into());
        }

        let mut connection = Connection::new(user_id, name, cadence);
        connection.ring_tier = ring_tier;
        connection.next_catchup_date = next_catchup_date;
        self.store.insert_connection(&connection)?;
        tracing::debug!(connection = %connection.id, cadence = %cadence, "connection added");
        Ok(connection)
    }

    pub fn connections(&self, user_id: Uuid) -> Result<Vec<Connection>> {
        let user_id = self.authorize(user_id)?;
        self.store.list_connections(user_id)
    }

    /// A connection together with its current health.
    pub fn connection_health(
        &self,
        user_id: Uuid,
        connection_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(Connection, ConnectionHealth)> {
        let user_id = self.authorize(user_id)?;
        let connection = self.connection(user_id, connection_id)?;
        let health = health_or_derived(self.store.load_health(connection_id)?, &connection, now);
        Ok((connection, health))
    }

    /// Archive or restore a connection. Archived connections get no nudges
    /// and are left out of forest health.
    pub fn set_archived(
        &self,
        user_id: Uuid,
        connection_id: Uuid,
        archived: bool,
        now: DateTime<Utc>,
    ) -> Result<ConnectionHealth> {
        let (_, mut health) = self.connection_health(user_id, connection_id, now)?;
        health.lifecycle_state = if archived {
            LifecycleState::Archived
        } else {
            LifecycleState::Active
        };
        self.store.save_health(&health)?;
        Ok(health)
    }

    pub fn streak(&self, user_id: Uuid) -> Result<UserStreak> {
        let user_id = self.authorize(user_id)?;
        Ok(self.store.load_streak(user_id)?.unwrap_or_default())
    }

    /// Log one action and propagate it through every derived record.
    ///
    /// # Errors
    /// Unknown user, unknown connection, a future-dated action, a storage
    /// failure or a streak that kept changing underneath us. Achievement
    /// persistence problems are reported in the outcome instead.
    pub fn log_interaction(
        &self,
        user_id: Uuid,
        action: Action,
        now: DateTime<Utc>,
    ) -> Result<InteractionOutcome> {
        let user_id = self.authorize(user_id)?;
        let connection = self.connection(user_id, action.connection_id)?;
        let today = now.date_naive();
        if action.date > today {
            return Err(ValidationError::InvalidValue {
                field: "date".into(),
                message: format!("{} is in the future", action.date),
            }
            .into());
        }

        let (daily_log, streak, health) = self.store.in_transaction(|store| {
            store.insert_action(user_id, &action)?;

            let same_day = store.actions_between(user_id, action.date, action.date)?;
            let daily_log = score_day(&same_day, action.date);
            store.upsert_daily_log(user_id, &daily_log)?;

            let streak = if daily_log.is_valid_day {
                Some(advance_streak(store, user_id, action.date)?)
            } else {
                None
            };

            let at = interaction_instant(action.date, now);
            store.touch_last_interaction(connection.id, at)?;
            let last_interaction = connection.last_interaction_date.max(Some(at));

            let mut health = store
                .load_health(connection.id)?
                .unwrap_or_else(|| ConnectionHealth::new(connection.id, connection.ring_tier));
            health.record_action(&action);
            let transition = health.recompute(
                days_since(last_interaction, now),
                connection.cadence_days(),
                now,
            );
            store.save_health(&health)?;

            if transition.recovered {
                store.record_recovery(user_id, connection.id, today)?;
                tracing::info!(connection = %connection.id, "connection recovered");
            }
            if transition.changed() {
                tracing::debug!(
                    connection = %connection.id,
                    from = %transition.from,
                    to = %transition.to,
                    "strength changed"
                );
            }

            Ok((daily_log, streak, (health, transition)))
        })?;

        let (streak_transition, streak_state) = match streak {
            Some((transition, state)) => (Some(transition), state),
            None => (None, self.store.load_streak(user_id)?.unwrap_or_default()),
        };
        let (health, health_transition) = health;

        let achievements = self.evaluate_after_write(user_id, now);

        Ok(InteractionOutcome {
            status: health.status_copy(now),
            action,
            daily_log,
            streak: streak_transition,
            current_streak: streak_state.current_streak,
            longest_streak: streak_state.longest_streak,
            health: health_transition,
            achievements,
        })
    }

    /// Recompute every connection's health as of `now`.
    ///
    /// Intended for a scheduled job; tiers drift with time even when nothing
    /// is logged.
    pub fn sweep_health(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<SweepOutcome> {
        let user_id = self.authorize(user_id)?;
        let today = now.date_naive();
        let connections = self.store.list_connections(user_id)?;

        let transitions = self.store.in_transaction(|store| {
            let mut transitions = Vec::new();
            for connection in &connections {
                let mut health = store
                    .load_health(connection.id)?
                    .unwrap_or_else(|| ConnectionHealth::new(connection.id, connection.ring_tier));
                if health.lifecycle_state == LifecycleState::Archived {
                    continue;
                }

                let transition = health.recompute(
                    days_since(connection.last_interaction_date, now),
                    connection.cadence_days(),
                    now,
                );
                store.save_health(&health)?;

                if transition.recovered {
                    store.record_recovery(user_id, connection.id, today)?;
                }
                if transition.changed() {
                    tracing::debug!(
                        connection = %connection.id,
                        from = %transition.from,
                        to = %transition.to,
                        "strength changed during sweep"
                    );
                    transitions.push(transition);
                }
            }
            Ok(transitions)
        })?;

        Ok(SweepOutcome {
            checked: connections.len(),
            transitions,
            achievements: self.evaluate_after_write(user_id, now),
        })
    }

    /// Pattern over the seven days ending on `end`.
    pub fn weekly_pattern(&self, user_id: Uuid, end: NaiveDate) -> Result<WeeklyPattern> {
        let user_id = self.authorize(user_id)?;
        let start = end - Duration::days(WINDOW_DAYS as i64 - 1);
        let actions = self.store.actions_between(user_id, start, end)?;
        Ok(analyze_week(&actions, end))
    }

    /// Ring render parameters, most urgent catch-up first.
    pub fn ring_visualizations(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConnectionRing>> {
        let user_id = self.authorize(user_id)?;
        let today = now.date_naive();

        let mut rings = Vec::new();
        for connection in self.store.list_connections(user_id)? {
            let stored = self.store.load_health(connection.id)?;
            if stored
                .as_ref()
                .is_some_and(|h| h.lifecycle_state == LifecycleState::Archived)
            {
                continue;
            }

            let days = days_since(connection.last_interaction_date, now);
            let tier = effective_tier(stored.as_ref(), days, connection.cadence_days());
            let decay_anchor = stored.as_ref().and_then(|h| h.decay_started_at);
            let status = match &stored {
                Some(health) => status_copy(
                    tier,
                    decay_days(days, health.decay_started_at, now),
                    health.last_action_type,
                ),
                None => status_copy(tier, days, None),
            };

            rings.push(ConnectionRing {
                connection_id: connection.id,
                ring: RingVisualization::map(tier, days, decay_anchor, &connection.name),
                ring_tier: connection.ring_tier,
                tier,
                status,
                next_catchup_date: connection.next_catchup_date,
                days_until_catchup: days_until(connection.next_catchup_date, today),
                name: connection.name,
            });
        }

        rings.sort_by(|a, b| {
            compare_catchup_urgency(a.next_catchup_date, b.next_catchup_date, today)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(rings)
    }

    /// Connections that should be nudged now, with the escalation level.
    pub fn nudges(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<NudgeSuggestion>> {
        let user_id = self.authorize(user_id)?;

        let mut suggestions = Vec::new();
        for connection in self.store.list_connections(user_id)? {
            let health = health_or_derived(self.store.load_health(connection.id)?, &connection, now);
            if let Some(level) = next_nudge(&health, connection.cadence_days(), now) {
                suggestions.push(NudgeSuggestion {
                    connection_id: connection.id,
                    name: connection.name,
                    tier: health.current_strength,
                    level,
                    prompt: level.prompt(),
                });
            }
        }
        Ok(suggestions)
    }

    /// Remember that a nudge was sent so later ones only escalate.
    pub fn record_nudge(
        &self,
        user_id: Uuid,
        connection_id: Uuid,
        level: NudgeLevel,
        now: DateTime<Utc>,
    ) -> Result<ConnectionHealth> {
        let (_, mut health) = self.connection_health(user_id, connection_id, now)?;
        mark_nudged(&mut health, level, now);
        self.store.save_health(&health)?;
        tracing::debug!(connection = %connection_id, level = level.as_str(), "nudge recorded");
        Ok(health)
    }

    /// Signals every achievement threshold is compared against.
    pub fn progress_signals(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<ProgressSignals> {
        let user_id = self.authorize(user_id)?;
        let streak = self.store.load_streak(user_id)?.unwrap_or_default();
        let actions = self.store.actions_for_user(user_id)?;
        let recoveries = self.store.recovery_dates(user_id)?;

        let mut snapshots = Vec::new();
        for connection in self.store.list_connections(user_id)? {
            let stored = self.store.load_health(connection.id)?;
            let days = days_since(connection.last_interaction_date, now);
            snapshots.push(ConnectionSnapshot {
                connection_id: connection.id,
                cadence_days: connection.cadence_days(),
                tier: effective_tier(stored.as_ref(), days, connection.cadence_days()),
                archived: stored.is_some_and(|h| h.lifecycle_state == LifecycleState::Archived),
                contacted: connection.last_interaction_date.is_some(),
            });
        }

        Ok(ProgressSignals::gather(
            &streak,
            &actions,
            &snapshots,
            &recoveries,
            now.date_naive(),
        ))
    }

    /// Evaluate and persist achievements.
    ///
    /// # Errors
    /// Only for an invalid user or a failure while reading history. Write
    /// failures land in [`AchievementOutcome::pending_retry`].
    pub fn evaluate_achievements(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AchievementOutcome> {
        let signals = self.progress_signals(user_id, now)?;
        let existing = self.store.list_user_achievements(user_id)?;
        let evaluation = self.evaluator.evaluate(user_id, &signals, &existing, now)?;
        Ok(self.persist(evaluation))
    }

    /// Stored rows for a user, unlocked or not.
    pub fn achievements(&self, user_id: Uuid) -> Result<Vec<UserAchievement>> {
        let user_id = self.authorize(user_id)?;
        self.store.list_user_achievements(user_id)
    }

    pub fn evaluator(&self) -> &AchievementEvaluator {
        &self.evaluator
    }

    /// Achievement pass after a committed write; never fails the write.
    fn evaluate_after_write(&self, user_id: Uuid, now: DateTime<Utc>) -> AchievementOutcome {
        self.evaluate_achievements(user_id, now)
            .unwrap_or_else(|e| {
                tracing::warn!(user = %user_id, error = %e, "achievement evaluation failed");
                AchievementOutcome::default()
            })
    }

    fn persist(&self, evaluation: Evaluation) -> AchievementOutcome {
        let mut outcome = AchievementOutcome::default();

        for row in evaluation.progress_updates {
            match self.store.upsert_progress(&row) {
                Ok(()) => outcome.progress_updated += 1,
                Err(e) => {
                    tracing::warn!(achievement = %row.achievement_id, error = %e, "progress write failed");
                    outcome.pending_retry.push(row);
                }
            }
        }

        for row in evaluation.unlocked {
            match self.store.unlock_if_absent(&row) {
                Ok(true) => outcome.unlocked.push(row),
                Ok(false) => {
                    tracing::debug!(achievement = %row.achievement_id, "already unlocked");
                }
                Err(e) => {
                    tracing::warn!(achievement = %row.achievement_id, error = %e, "unlock write failed");
                    outcome.pending_retry.push(row);
                }
            }
        }

        outcome
    }
}

/// Apply `date` to the stored streak with compare-and-swap.
fn advance_streak<S: EngagementStore>(
    store: &S,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<(StreakTransition, UserStreak)> {
    for attempt in 1..=MAX_STREAK_ATTEMPTS {
        let stored = store.load_streak(user_id)?;
        let expected = stored.as_ref().and_then(|s| s.last_interaction_date);
        let mut streak = stored.unwrap_or_default();
        let transition = streak.apply(date);

        if transition.outcome == StreakOutcome::Backdated {
            tracing::debug!(%date, "backdated interaction leaves streak untouched");
            return Ok((transition, streak));
        }

        if store.compare_and_swap_streak(user_id, expected, &streak)? {
            tracing::debug!(
                outcome = ?transition.outcome,
                before = transition.streak_before,
                after = transition.streak_after,
                "streak updated"
            );
            return Ok((transition, streak));
        }
        tracing::debug!(attempt, "streak changed concurrently, retrying");
    }

    Err(CoreError::StreakConflict {
        user_id,
        attempts: MAX_STREAK_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionType;
    use crate::repository::{ActionRepository, ConnectionRepository};
    use crate::storage::Database;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
    }

    fn setup() -> (EngagementEngine<Database>, Uuid) {
        let engine = EngagementEngine::new(Database::open_memory().unwrap());
        let user = Uuid::new_v4();
        engine.register_user(user, "Sam").unwrap();
        (engine, user)
    }

    #[test]
    fn unknown_user_is_rejected() {
        let (engine, _) = setup();
        let stranger = Uuid::new_v4();
        let err = engine.weekly_pattern(stranger, at(3, 9).date_naive()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidUser(InvalidUserError::Unknown(id)) if id == stranger
        ));
        assert!(matches!(
            engine.streak(Uuid::nil()),
            Err(CoreError::InvalidUser(InvalidUserError::Missing))
        ));
    }

    #[test]
    fn future_action_is_rejected() {
        let (engine, user) = setup();
        let ada = engine
            .add_connection(user, "Ada", Cadence::Weekly, RingTier::Core, None)
            .unwrap();
        let action = Action::new(ada.id, ActionType::Call, at(5, 0).date_naive());
        let err = engine.log_interaction(user, action, at(3, 9)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(engine.store().actions_for_user(user).unwrap().is_empty());
    }

    #[test]
    fn interaction_updates_every_record() {
        let (engine, user) = setup();
        let ada = engine
            .add_connection(user, "Ada", Cadence::Weekly, RingTier::Core, None)
            .unwrap();

        let now = at(3, 18);
        let action = Action::new(ada.id, ActionType::InPerson, now.date_naive());
        let outcome = engine.log_interaction(user, action, now).unwrap();

        assert_eq!(outcome.daily_log.total_weight, 6);
        assert_eq!(outcome.current_streak, 1);
        assert_eq!(outcome.health.to, StrengthTier::Flourishing);
        assert_eq!(outcome.status, "Last met up today");

        let stored = engine.store().get_connection(user, ada.id).unwrap().unwrap();
        assert_eq!(stored.last_interaction_date, Some(now));
    }

    #[test]
    fn empty_name_is_rejected() {
        let (engine, user) = setup();
        assert!(engine
            .add_connection(user, "   ", Cadence::Weekly, RingTier::Outer, None)
            .is_err());
    }

    #[test]
    fn backfilled_day_anchors_at_midnight() {
        assert_eq!(
            interaction_instant(at(1, 0).date_naive(), at(3, 15)),
            at(1, 0)
        );
        assert_eq!(interaction_instant(at(3, 0).date_naive(), at(3, 15)), at(3, 15));
    }
}
