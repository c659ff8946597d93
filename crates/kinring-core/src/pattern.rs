//! Weekly behavioural pattern analysis.
//!
//! Scores a trailing 7-day window on three axes (all 0-100):
//! - **Depth**: share of weight coming from calls and in-person meetings
//! - **Variety**: how many of the three action types were used
//! - **Consistency**: how many valid days, and how evenly they are spread
//!
//! and picks one insight from a closed set.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionType};
use crate::habit::is_valid_day;

/// Length of the analysed window.
pub const WINDOW_DAYS: usize = 7;

const CONTACT_NOT_DEPTH_MAX_DEPTH: u32 = 30;
const CONTACT_NOT_DEPTH_MIN_ACTIONS: u32 = 4;
const SPORADIC_BELOW: u32 = 45;
const GOOD_DEPTH_MIN: u32 = 50;
const ESCALATION_FACTOR: u32 = 2;

const COVERAGE_SHARE: f64 = 0.7;
const EVENNESS_SHARE: f64 = 0.3;

/// Insight attached to a weekly pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    ContactNotDepth,
    GoodDepth,
    Sporadic,
    Consistent,
    Escalating,
}

impl InsightType {
    pub fn message(self) -> &'static str {
        match self {
            InsightType::ContactNotDepth => {
                "You're keeping in touch, but mostly by text. Try a call or a visit this week."
            }
            InsightType::GoodDepth => {
                "Great depth this week. Your calls and visits are building real closeness."
            }
            InsightType::Sporadic => {
                "Your contact came in bursts this week. A little each day goes further."
            }
            InsightType::Consistent => "Nice rhythm. You showed up steadily all week.",
            InsightType::Escalating => {
                "You're deepening your connections as the week goes on. Keep it up."
            }
        }
    }
}

/// Count and weight for one action type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTally {
    pub count: u32,
    pub weight: u32,
}

/// Per-type breakdown of the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBreakdown {
    pub text: TypeTally,
    pub call: TypeTally,
    pub in_person: TypeTally,
}

impl ActionBreakdown {
    fn tally_mut(&mut self, action_type: ActionType) -> &mut TypeTally {
        match action_type {
            ActionType::Text => &mut self.text,
            ActionType::Call => &mut self.call,
            ActionType::InPerson => &mut self.in_person,
        }
    }

    fn record(&mut self, action_type: ActionType) {
        let tally = self.tally_mut(action_type);
        tally.count += 1;
        tally.weight += action_type.weight();
    }

    pub fn total_count(&self) -> u32 {
        self.text.count + self.call.count + self.in_person.count
    }

    pub fn total_weight(&self) -> u32 {
        self.text.weight + self.call.weight + self.in_person.weight
    }

    pub fn deep_weight(&self) -> u32 {
        self.call.weight + self.in_person.weight
    }

    pub fn distinct_types(&self) -> u32 {
        [self.text, self.call, self.in_person]
            .iter()
            .filter(|t| t.count > 0)
            .count() as u32
    }
}

/// Result of analysing one week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyPattern {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub depth_score: u32,
    pub variety_score: u32,
    pub consistency_score: u32,
    pub valid_days: u32,
    pub breakdown: ActionBreakdown,
    pub insight_type: InsightType,
    pub message: String,
}

#[derive(Default)]
struct DaySlot {
    weight: u32,
    has_deep: bool,
}

/// Analyse the 7 days ending on `end` (inclusive).
pub fn analyze_week(actions: &[Action], end: NaiveDate) -> WeeklyPattern {
    let start = end - Duration::days(WINDOW_DAYS as i64 - 1);
    let mut slots: [DaySlot; WINDOW_DAYS] = Default::default();
    let mut breakdown = ActionBreakdown::default();

    for action in actions.iter().filter(|a| a.date >= start && a.date <= end) {
        let idx = (action.date - start).num_days() as usize;
        slots[idx].weight += action.weight();
        slots[idx].has_deep |= action.action_type.is_deep();
        breakdown.record(action.action_type);
    }

    let valid: Vec<bool> = slots.iter().map(|s| is_valid_day(s.weight)).collect();
    let valid_days = valid.iter().filter(|v| **v).count() as u32;

    let depth_score = depth_score(&breakdown);
    let variety_score = percent(breakdown.distinct_types(), ActionType::ALL.len() as u32);
    let consistency_score = consistency_score(&valid);

    let insight_type = if is_escalating(&slots) {
        InsightType::Escalating
    } else if depth_score < CONTACT_NOT_DEPTH_MAX_DEPTH
        && breakdown.total_count() >= CONTACT_NOT_DEPTH_MIN_ACTIONS
    {
        InsightType::ContactNotDepth
    } else if consistency_score < SPORADIC_BELOW {
        InsightType::Sporadic
    } else if depth_score >= GOOD_DEPTH_MIN {
        InsightType::GoodDepth
    } else {
        InsightType::Consistent
    };

    WeeklyPattern {
        window_start: start,
        window_end: end,
        depth_score,
        variety_score,
        consistency_score,
        valid_days,
        breakdown,
        insight_type,
        message: insight_type.message().to_string(),
    }
}

fn percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (f64::from(part) * 100.0 / f64::from(whole)).round() as u32
}

fn depth_score(breakdown: &ActionBreakdown) -> u32 {
    percent(breakdown.deep_weight(), breakdown.total_weight())
}

/// Coverage of valid days blended with how evenly they are spread.
///
/// Evenness compares the longest run of non-valid days against the shortest
/// run achievable for the same number of valid days, so three valid days in
/// a row followed by four empty ones scores lower than three spread out.
fn consistency_score(valid: &[bool]) -> u32 {
    let total = valid.len();
    let valid_count = valid.iter().filter(|v| **v).count();
    if valid_count == 0 {
        return 0;
    }

    let empty = total - valid_count;
    let longest_gap = valid
        .split(|v| *v)
        .map(<[bool]>::len)
        .max()
        .unwrap_or(0);
    let best_gap = empty.div_ceil(valid_count + 1);

    let evenness = if empty <= best_gap {
        1.0
    } else {
        1.0 - (longest_gap - best_gap) as f64 / (empty - best_gap) as f64
    };
    let coverage = valid_count as f64 / total as f64;

    (100.0 * (COVERAGE_SHARE * coverage + EVENNESS_SHARE * evenness)).round() as u32
}

/// Weight in the last three days at least doubles the first three, with a
/// call or visit among the later days.
fn is_escalating(slots: &[DaySlot]) -> bool {
    let half = slots.len() / 2;
    let early: u32 = slots[..half].iter().map(|s| s.weight).sum();
    let late_slots = &slots[slots.len() - half..];
    let late: u32 = late_slots.iter().map(|s| s.weight).sum();
    early > 0 && late >= ESCALATION_FACTOR * early && late_slots.iter().any(|s| s.has_deep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 9).unwrap()
    }

    /// Day index 0 is the first day of the window.
    fn at(idx: i64, action_type: ActionType) -> Action {
        let start = end() - Duration::days(6);
        Action::new(Uuid::nil(), action_type, start + Duration::days(idx))
    }

    #[test]
    fn empty_week_is_sporadic() {
        let pattern = analyze_week(&[], end());
        assert_eq!(pattern.valid_days, 0);
        assert_eq!(pattern.depth_score, 0);
        assert_eq!(pattern.consistency_score, 0);
        assert_eq!(pattern.insight_type, InsightType::Sporadic);
        assert_eq!(pattern.message, InsightType::Sporadic.message());
    }

    #[test]
    fn many_texts_is_contact_not_depth() {
        let actions: Vec<_> = (0..5).map(|i| at(i, ActionType::Text)).collect();
        let pattern = analyze_week(&actions, end());
        assert_eq!(pattern.depth_score, 0);
        assert_eq!(pattern.variety_score, 33);
        assert_eq!(pattern.insight_type, InsightType::ContactNotDepth);
        assert_eq!(pattern.breakdown.text, TypeTally { count: 5, weight: 5 });
    }

    #[test]
    fn spread_calls_are_good_depth() {
        let actions: Vec<_> = [0, 2, 4, 6].iter().map(|i| at(*i, ActionType::Call)).collect();
        let pattern = analyze_week(&actions, end());
        assert_eq!(pattern.depth_score, 100);
        assert_eq!(pattern.valid_days, 4);
        assert_eq!(pattern.consistency_score, 70);
        assert_eq!(pattern.insight_type, InsightType::GoodDepth);
    }

    #[test]
    fn daily_texts_with_a_call_are_consistent() {
        let mut actions: Vec<_> = (0..7).map(|i| at(i, ActionType::Text)).collect();
        actions.push(at(3, ActionType::Call));
        let pattern = analyze_week(&actions, end());
        assert_eq!(pattern.depth_score, 30);
        assert_eq!(pattern.consistency_score, 100);
        assert_eq!(pattern.variety_score, 67);
        assert_eq!(pattern.insight_type, InsightType::Consistent);
    }

    #[test]
    fn deeper_contact_late_in_week_is_escalating() {
        let actions = vec![
            at(0, ActionType::Text),
            at(5, ActionType::Call),
            at(6, ActionType::InPerson),
        ];
        let pattern = analyze_week(&actions, end());
        assert_eq!(pattern.variety_score, 100);
        assert_eq!(pattern.insight_type, InsightType::Escalating);
    }

    #[test]
    fn clustered_days_score_lower_than_spread_days() {
        let clustered: Vec<_> = (0..3).map(|i| at(i, ActionType::Call)).collect();
        let spread: Vec<_> = [1, 3, 5].iter().map(|i| at(*i, ActionType::Call)).collect();
        let c = analyze_week(&clustered, end());
        let s = analyze_week(&spread, end());
        assert!(c.consistency_score < s.consistency_score);
        assert_eq!(s.consistency_score, 60);
    }

    #[test]
    fn burst_of_visits_is_sporadic() {
        let actions = vec![at(0, ActionType::InPerson), at(1, ActionType::InPerson)];
        let pattern = analyze_week(&actions, end());
        assert_eq!(pattern.consistency_score, 20);
        assert_eq!(pattern.insight_type, InsightType::Sporadic);
    }

    #[test]
    fn actions_outside_window_are_ignored() {
        let actions = vec![at(-1, ActionType::InPerson), at(7, ActionType::Call)];
        let pattern = analyze_week(&actions, end());
        assert_eq!(pattern.breakdown.total_count(), 0);
    }
}
