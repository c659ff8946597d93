//! Progress signals derived from stored history.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::Uuid;

use super::ThresholdType;
use crate::action::{Action, ActionType};
use crate::health::StrengthTier;
use crate::streak::UserStreak;

/// What the evaluator needs to know about one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub connection_id: Uuid,
    pub cadence_days: u32,
    pub tier: StrengthTier,
    pub archived: bool,
    /// False until the first logged interaction.
    pub contacted: bool,
}

/// Every value an achievement threshold can be compared against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSignals {
    pub current_streak: u32,
    pub cycles_by_connection: BTreeMap<Uuid, u32>,
    pub total_recoveries: u32,
    pub recoveries_in_window: u32,
    pub forest_health_percent: u32,
    pub in_person_in_window: u32,
    pub memory_notes_in_window: u32,
    pub distinct_types_in_window: u32,
}

fn in_window(date: NaiveDate, today: NaiveDate, days: i64) -> bool {
    date <= today && date > today - Duration::days(days)
}

impl ProgressSignals {
    /// Derive signals from a user's streak, action history, connections and
    /// recovery dates, as of `today`.
    pub fn gather(
        streak: &UserStreak,
        actions: &[Action],
        connections: &[ConnectionSnapshot],
        recoveries: &[NaiveDate],
        today: NaiveDate,
    ) -> Self {
        let window = |t: ThresholdType| t.window_days().unwrap_or(0);
        let quality_window = window(ThresholdType::InPersonActions);
        let variety_window = window(ThresholdType::DistinctActionTypes);
        let recovery_window = window(ThresholdType::RecoveriesInWindow);

        let mut dates_by_connection: BTreeMap<Uuid, Vec<NaiveDate>> = BTreeMap::new();
        let mut in_person = 0;
        let mut notes = 0;
        let mut recent_types: HashSet<ActionType> = HashSet::new();

        for action in actions {
            dates_by_connection
                .entry(action.connection_id)
                .or_default()
                .push(action.date);

            if in_window(action.date, today, quality_window) {
                if action.action_type == ActionType::InPerson {
                    in_person += 1;
                }
                if action.has_memory_note() {
                    notes += 1;
                }
            }
            if in_window(action.date, today, variety_window) {
                recent_types.insert(action.action_type);
            }
        }

        let active: Vec<_> = connections.iter().filter(|c| !c.archived).collect();
        let cycles_by_connection = active
            .iter()
            .map(|c| {
                let dates = dates_by_connection
                    .get(&c.connection_id)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                (c.connection_id, consecutive_cycles(dates, c.cadence_days, today))
            })
            .collect();

        // Never-contacted connections have a default tier, not a measured one.
        let measured: Vec<_> = active.iter().filter(|c| c.contacted).collect();
        let healthy = measured.iter().filter(|c| c.tier.is_healthy()).count();
        let forest_health_percent = if measured.is_empty() {
            0
        } else {
            (healthy as f64 * 100.0 / measured.len() as f64).round() as u32
        };

        Self {
            current_streak: streak.current_streak,
            cycles_by_connection,
            total_recoveries: recoveries.len() as u32,
            recoveries_in_window: recoveries
                .iter()
                .filter(|d| in_window(**d, today, recovery_window))
                .count() as u32,
            forest_health_percent,
            in_person_in_window: in_person,
            memory_notes_in_window: notes,
            distinct_types_in_window: recent_types.len() as u32,
        }
    }

    /// Value for a global threshold type. Per-contact types read
    /// `cycles_by_connection` instead and return `None` here.
    pub fn global_value(&self, threshold_type: ThresholdType) -> Option<u32> {
        match threshold_type {
            ThresholdType::StreakDays => Some(self.current_streak),
            ThresholdType::ConsecutiveCycles => None,
            ThresholdType::RecoveryCount => Some(self.total_recoveries),
            ThresholdType::RecoveriesInWindow => Some(self.recoveries_in_window),
            ThresholdType::ForestHealthPercent => Some(self.forest_health_percent),
            ThresholdType::InPersonActions => Some(self.in_person_in_window),
            ThresholdType::MemoryNotes => Some(self.memory_notes_in_window),
            ThresholdType::DistinctActionTypes => Some(self.distinct_types_in_window),
        }
    }
}

/// Consecutive cadence periods, counting back from `today`, that contain at
/// least one action.
///
/// Period `k` covers the days `today - (k+1)*cadence + 1 ..= today - k*cadence`.
/// The current period is still in progress, so an empty one is skipped
/// instead of ending the run.
pub fn consecutive_cycles(dates: &[NaiveDate], cadence_days: u32, today: NaiveDate) -> u32 {
    let cadence = i64::from(cadence_days.max(1));
    let periods: BTreeSet<i64> = dates
        .iter()
        .map(|d| (today - *d).num_days())
        .filter(|age| *age >= 0)
        .map(|age| age / cadence)
        .collect();

    let mut k = if periods.contains(&0) { 0 } else { 1 };
    let mut run = 0;
    while periods.contains(&k) {
        run += 1;
        k += 1;
    }
    run
}
