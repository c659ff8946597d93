//! Persisted per-connection health and its recompute rules.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::nudge::NudgeLevel;
use super::strength::{classify, StrengthTier, NEVER_CONTACTED_TIER};
use crate::action::{Action, ActionType, RingTier};
use crate::error::ValidationError;
use crate::recency::days_since;

/// Where a connection sits in the user's workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Active,
    /// A nudge was issued and no action has been logged since
    PendingAction,
    Archived,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Active => "active",
            LifecycleState::PendingAction => "pending_action",
            LifecycleState::Archived => "archived",
        }
    }
}

impl FromStr for LifecycleState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LifecycleState::Active),
            "pending_action" => Ok(LifecycleState::PendingAction),
            "archived" => Ok(LifecycleState::Archived),
            _ => Err(ValidationError::UnknownLabel {
                kind: "lifecycle state",
                value: s.to_string(),
            }),
        }
    }
}

/// Stored health row for one connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionHealth {
    pub connection_id: Uuid,
    pub ring_tier: RingTier,
    pub ring_position: u32,
    pub current_strength: StrengthTier,
    pub previous_strength: Option<StrengthTier>,
    pub strength_changed_at: Option<DateTime<Utc>>,
    pub days_since_action: Option<i64>,
    /// Anchor for "how long has this been failing"
    pub decay_started_at: Option<DateTime<Utc>>,
    pub last_action_date: Option<NaiveDate>,
    pub last_action_type: Option<ActionType>,
    pub lifecycle_state: LifecycleState,
    pub last_nudge_level: Option<NudgeLevel>,
    pub last_nudge_at: Option<DateTime<Utc>>,
    pub total_actions_logged: u32,
    pub total_weight_accumulated: u32,
}

/// Result of one recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthTransition {
    pub connection_id: Uuid,
    pub from: StrengthTier,
    pub to: StrengthTier,
    /// Moved from thinning/decaying back to stable or better
    pub recovered: bool,
    /// Decay anchor was set by this recompute
    pub decay_started: bool,
}

impl HealthTransition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

impl ConnectionHealth {
    pub fn new(connection_id: Uuid, ring_tier: RingTier) -> Self {
        Self {
            connection_id,
            ring_tier,
            ring_position: 0,
            current_strength: NEVER_CONTACTED_TIER,
            previous_strength: None,
            strength_changed_at: None,
            days_since_action: None,
            decay_started_at: None,
            last_action_date: None,
            last_action_type: None,
            lifecycle_state: LifecycleState::Active,
            last_nudge_level: None,
            last_nudge_at: None,
            total_actions_logged: 0,
            total_weight_accumulated: 0,
        }
    }

    /// Re-derive the tier and update the decay anchor.
    ///
    /// Entering thinning/decaying sets `decay_started_at` if it is unset;
    /// returning to stable or better clears it. Any tier change stamps
    /// `strength_changed_at` and moves the old tier into `previous_strength`.
    pub fn recompute(
        &mut self,
        days_since_action: Option<i64>,
        cadence_days: u32,
        now: DateTime<Utc>,
    ) -> HealthTransition {
        let from = self.current_strength;
        let to = classify(days_since_action, cadence_days);
        self.days_since_action = days_since_action;

        if to != from {
            self.previous_strength = Some(from);
            self.current_strength = to;
            self.strength_changed_at = Some(now);
        }

        let mut decay_started = false;
        if to.is_decaying() {
            if self.decay_started_at.is_none() {
                self.decay_started_at = Some(now);
                decay_started = true;
            }
        } else {
            self.decay_started_at = None;
        }

        HealthTransition {
            connection_id: self.connection_id,
            from,
            to,
            recovered: from.is_decaying() && to.is_healthy(),
            decay_started,
        }
    }

    /// Fold a newly logged action into the running totals.
    ///
    /// Backdated actions still count toward totals but never move the
    /// last-action fields backwards.
    pub fn record_action(&mut self, action: &Action) {
        self.total_actions_logged += 1;
        self.total_weight_accumulated += action.weight();

        let is_latest = self.last_action_date.map_or(true, |last| action.date >= last);
        if is_latest {
            self.last_action_date = Some(action.date);
            self.last_action_type = Some(action.action_type);
        }

        if self.lifecycle_state == LifecycleState::PendingAction {
            self.lifecycle_state = LifecycleState::Active;
        }
    }

    /// Days of decay to quote in copy, anchored when an anchor exists.
    pub fn decay_days(&self, now: DateTime<Utc>) -> Option<i64> {
        decay_days(self.days_since_action, self.decay_started_at, now)
    }

    pub fn status_copy(&self, now: DateTime<Utc>) -> String {
        status_copy(
            self.current_strength,
            self.decay_days(now),
            self.last_action_type,
        )
    }
}

/// Persisted tier wins when a health row exists; otherwise derive it.
pub fn effective_tier(
    persisted: Option<&ConnectionHealth>,
    days_since_action: Option<i64>,
    cadence_days: u32,
) -> StrengthTier {
    match persisted {
        Some(health) => health.current_strength,
        None => classify(days_since_action, cadence_days),
    }
}

/// Elapsed days since the decay anchor, or plain days-since-action.
pub fn decay_days(
    days_since_action: Option<i64>,
    decay_started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<i64> {
    match decay_started_at {
        Some(anchor) => days_since(Some(anchor), now),
        None => days_since_action,
    }
}

fn days_phrase(days: i64) -> String {
    match days {
        i64::MIN..=0 => "today".to_string(),
        1 => "yesterday".to_string(),
        n => format!("{n} days ago"),
    }
}

fn day_count(days: i64) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{days} days")
    }
}

/// User-facing status sentence.
pub fn status_copy(
    tier: StrengthTier,
    decay_days: Option<i64>,
    last_action_type: Option<ActionType>,
) -> String {
    let Some(days) = decay_days else {
        return "You haven't reached out yet".to_string();
    };

    let last = last_action_type
        .map(|t| format!("Last {} {}", t.past_tense(), days_phrase(days)))
        .unwrap_or_else(|| format!("Last contact {}", days_phrase(days)));

    match (tier, days) {
        (StrengthTier::Flourishing | StrengthTier::Strong | StrengthTier::Stable, _) => last,
        (StrengthTier::Thinning, i64::MIN..=0) => "Started thinning today".to_string(),
        (StrengthTier::Thinning, _) => format!("Thinning for {}", day_count(days)),
        (StrengthTier::Decaying, i64::MIN..=0) => {
            "Started fading today. Time to reach out".to_string()
        }
        (StrengthTier::Decaying, _) => {
            format!("Fading for {}. Time to reach out", day_count(days))
        }
    }
}
