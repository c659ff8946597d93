//! Daily contact streak with freezes and weekend flex.
//!
//! The streak counts consecutive days with a qualifying interaction. Two
//! forgiveness rules keep it alive across short gaps:
//! - **Freeze**: one missed day (gap of 2) is forgiven once per rolling week
//! - **Weekend flex**: Friday to Sunday is one window, so a gap of up to 3
//!   days that starts on Fri/Sat/Sun does not break the streak
//!
//! Persisting the result is a read-modify-write per user and must be
//! serialized by the store (see `StreakRepository::compare_and_swap_streak`).

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::recency::days_between;

/// Freezes available per rolling week.
pub const FREEZES_PER_WEEK: u32 = 1;

/// Days after which the weekly freeze allowance resets.
pub const FREEZE_WINDOW_DAYS: i64 = 7;

/// Longest gap (in days) bridged by weekend flex.
pub const WEEKEND_FLEX_MAX_GAP: i64 = 3;

/// Stored streak state for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStreak {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_interaction_date: Option<NaiveDate>,
    pub streak_started_at: Option<NaiveDate>,
    pub freezes_used_this_week: u32,
    pub week_freeze_reset_date: Option<NaiveDate>,
}

/// How an interaction affected the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakOutcome {
    /// First interaction ever
    Started,
    /// Already counted today
    SameDay,
    /// Dated before the last counted day; ignored
    Backdated,
    /// Next calendar day
    Continued,
    /// One missed day forgiven by spending a freeze
    FreezeUsed,
    /// Gap bridged by the Friday-Sunday window
    WeekendFlex,
    /// Gap too long; streak restarted at 1
    Broken,
}

impl StreakOutcome {
    /// Whether the streak counter moved up.
    pub fn extended(self) -> bool {
        matches!(
            self,
            StreakOutcome::Continued | StreakOutcome::FreezeUsed | StreakOutcome::WeekendFlex
        )
    }
}

/// Log entry for one applied interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakTransition {
    pub date: NaiveDate,
    pub outcome: StreakOutcome,
    pub streak_before: u32,
    pub streak_after: u32,
}

/// Friday, Saturday and Sunday form one contiguous contact window.
pub fn is_weekend_flex_day(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Fri | Weekday::Sat | Weekday::Sun)
}

impl UserStreak {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn freezes_remaining(&self) -> u32 {
        FREEZES_PER_WEEK.saturating_sub(self.freezes_used_this_week)
    }

    /// Apply a qualifying interaction dated `date`.
    pub fn apply(&mut self, date: NaiveDate) -> StreakTransition {
        let streak_before = self.current_streak;

        if let Some(last) = self.last_interaction_date {
            if date < last {
                return StreakTransition {
                    date,
                    outcome: StreakOutcome::Backdated,
                    streak_before,
                    streak_after: streak_before,
                };
            }
        }

        self.roll_freeze_week(date);

        let outcome = match self.last_interaction_date {
            None => {
                self.restart(date);
                StreakOutcome::Started
            }
            Some(last) if last == date => StreakOutcome::SameDay,
            Some(last) => {
                let gap = days_between(last, date);
                if gap == 1 {
                    self.current_streak += 1;
                    StreakOutcome::Continued
                } else if gap == 2 && self.freezes_used_this_week < FREEZES_PER_WEEK {
                    self.freezes_used_this_week += 1;
                    self.current_streak += 1;
                    StreakOutcome::FreezeUsed
                } else if gap <= WEEKEND_FLEX_MAX_GAP && is_weekend_flex_day(last) {
                    self.current_streak += 1;
                    StreakOutcome::WeekendFlex
                } else {
                    self.restart(date);
                    StreakOutcome::Broken
                }
            }
        };

        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_interaction_date = Some(date);

        StreakTransition {
            date,
            outcome,
            streak_before,
            streak_after: self.current_streak,
        }
    }

    fn roll_freeze_week(&mut self, date: NaiveDate) {
        let expired = self
            .week_freeze_reset_date
            .map_or(true, |reset| days_between(reset, date) >= FREEZE_WINDOW_DAYS);
        if expired {
            self.freezes_used_this_week = 0;
            self.week_freeze_reset_date = Some(date);
        }
    }

    fn restart(&mut self, date: NaiveDate) {
        self.current_streak = 1;
        self.streak_started_at = Some(date);
    }
}

/// Replay a sequence of interaction dates from an empty streak.
pub fn replay<I>(dates: I) -> (UserStreak, Vec<StreakTransition>)
where
    I: IntoIterator<Item = NaiveDate>,
{
    let mut streak = UserStreak::new();
    let transitions = dates.into_iter().map(|d| streak.apply(d)).collect();
    (streak, transitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // 2024-06-03 is a Monday
    fn june(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn first_interaction_starts_streak() {
        let mut streak = UserStreak::new();
        let t = streak.apply(june(3));
        assert_eq!(t.outcome, StreakOutcome::Started);
        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.longest_streak, 1);
        assert_eq!(streak.streak_started_at, Some(june(3)));
        assert_eq!(streak.week_freeze_reset_date, Some(june(3)));
    }

    #[test]
    fn same_day_is_deduplicated() {
        let (streak, transitions) = replay([june(3), june(3)]);
        assert_eq!(transitions[1].outcome, StreakOutcome::SameDay);
        assert_eq!(streak.current_streak, 1);
    }

    #[test]
    fn freeze_bridges_one_missed_day() {
        // Mon, Tue, (skip Wed), Thu
        let (streak, transitions) = replay([june(3), june(4), june(6)]);
        assert_eq!(transitions[2].outcome, StreakOutcome::FreezeUsed);
        assert_eq!(streak.current_streak, 3);
        assert_eq!(streak.freezes_used_this_week, 1);
    }

    #[test]
    fn friday_to_monday_is_weekend_flex() {
        let mut streak = UserStreak::new();
        streak.apply(june(7)); // Friday
        let t = streak.apply(june(10)); // Monday
        assert_eq!(t.outcome, StreakOutcome::WeekendFlex);
        assert_eq!(streak.current_streak, 2);
        assert_eq!(streak.freezes_used_this_week, 0);
    }

    #[test]
    fn second_freeze_in_same_week_breaks() {
        // Mon, Wed (freeze), Fri: gap of 2 from Wed with no freeze left,
        // and Wed is not a flex day.
        let (streak, transitions) = replay([june(3), june(5), june(7)]);
        assert_eq!(transitions[1].outcome, StreakOutcome::FreezeUsed);
        assert_eq!(transitions[2].outcome, StreakOutcome::Broken);
        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.streak_started_at, Some(june(7)));
        assert_eq!(streak.longest_streak, 2);
    }

    #[test]
    fn freeze_allowance_resets_after_a_week() {
        let (streak, transitions) = replay([
            june(3),
            june(5),  // freeze #1 (week anchored on the 3rd)
            june(6),
            june(7),
            june(8),
            june(9),
            june(10), // 7 days after the 3rd: allowance resets here
            june(12), // freeze again
        ]);
        assert_eq!(transitions[7].outcome, StreakOutcome::FreezeUsed);
        assert_eq!(streak.week_freeze_reset_date, Some(june(10)));
        assert_eq!(streak.current_streak, 8);
    }

    #[test]
    fn long_gap_breaks_even_after_weekend() {
        let (streak, transitions) = replay([june(7), june(11)]);
        assert_eq!(transitions[1].outcome, StreakOutcome::Broken);
        assert_eq!(streak.current_streak, 1);
    }

    #[test]
    fn backdated_interaction_is_ignored() {
        let (mut streak, _) = replay([june(3), june(4)]);
        let before = streak.clone();
        let t = streak.apply(june(1));
        assert_eq!(t.outcome, StreakOutcome::Backdated);
        assert_eq!(streak, before);
    }

    proptest! {
        #[test]
        fn longest_never_below_current(gaps in proptest::collection::vec(0i64..6, 1..60)) {
            let mut streak = UserStreak::new();
            let mut date = june(1);
            for gap in gaps {
                date += chrono::Duration::days(gap);
                streak.apply(date);
                prop_assert!(streak.longest_streak >= streak.current_streak);
                prop_assert!(streak.freezes_used_this_week <= FREEZES_PER_WEEK);
            }
        }
    }
}
