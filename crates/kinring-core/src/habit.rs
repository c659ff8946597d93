//! Daily habit scoring.
//!
//! One [`DailyHabitLog`] per user per calendar day, rebuilt from that day's
//! actions whenever they change.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::action::{Action, ActionType};

/// Minimum summed weight for a day to count as valid.
///
/// Every action type weighs at least 1, so any logged action makes a day valid.
pub const VALID_DAY_THRESHOLD: u32 = 1;

/// Aggregated actions for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyHabitLog {
    pub date: NaiveDate,
    pub total_weight: u32,
    pub action_count: u32,
    pub is_valid_day: bool,
    pub highest_action: Option<ActionType>,
}

impl DailyHabitLog {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_weight: 0,
            action_count: 0,
            is_valid_day: false,
            highest_action: None,
        }
    }

    fn push(&mut self, action_type: ActionType) {
        self.total_weight += action_type.weight();
        self.action_count += 1;
        self.highest_action = Some(self.highest_action.map_or(action_type, |h| h.max(action_type)));
        self.is_valid_day = is_valid_day(self.total_weight);
    }
}

pub fn is_valid_day(total_weight: u32) -> bool {
    total_weight >= VALID_DAY_THRESHOLD
}

/// Score a single day from a (possibly wider) action history.
pub fn score_day(actions: &[Action], date: NaiveDate) -> DailyHabitLog {
    actions
        .iter()
        .filter(|a| a.date == date)
        .fold(DailyHabitLog::empty(date), |mut log, a| {
            log.push(a.action_type);
            log
        })
}

/// Group a history into per-day logs, ordered by date. Days without actions
/// are omitted.
pub fn score_days(actions: &[Action]) -> Vec<DailyHabitLog> {
    let mut by_day: BTreeMap<NaiveDate, DailyHabitLog> = BTreeMap::new();
    for action in actions {
        by_day
            .entry(action.date)
            .or_insert_with(|| DailyHabitLog::empty(action.date))
            .push(action.action_type);
    }
    by_day.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    #[test]
    fn text_plus_call_scores_four() {
        let conn = Uuid::new_v4();
        let actions = vec![
            Action::new(conn, ActionType::Text, day(3)),
            Action::new(conn, ActionType::Call, day(3)),
            Action::new(conn, ActionType::InPerson, day(4)),
        ];
        let log = score_day(&actions, day(3));
        assert_eq!(log.total_weight, 4);
        assert_eq!(log.action_count, 2);
        assert_eq!(log.highest_action, Some(ActionType::Call));
        assert!(log.is_valid_day);
        // valid under the alternative 0.5 cutoff as well
        assert!(f64::from(log.total_weight) >= 0.5);
    }

    #[test]
    fn empty_day_is_not_valid() {
        let log = score_day(&[], day(1));
        assert_eq!(log, DailyHabitLog::empty(day(1)));
        assert!(!log.is_valid_day);
    }

    #[test]
    fn single_text_makes_day_valid() {
        let actions = vec![Action::new(Uuid::new_v4(), ActionType::Text, day(2))];
        assert!(score_day(&actions, day(2)).is_valid_day);
    }

    #[test]
    fn score_days_groups_and_orders() {
        let conn = Uuid::new_v4();
        let actions = vec![
            Action::new(conn, ActionType::InPerson, day(9)),
            Action::new(conn, ActionType::Text, day(2)),
            Action::new(conn, ActionType::Text, day(9)),
        ];
        let logs = score_days(&actions);
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].date, day(2));
        assert_eq!(logs[1].total_weight, 7);
        assert_eq!(logs[1].highest_action, Some(ActionType::InPerson));
    }
}
