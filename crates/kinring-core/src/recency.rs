//! Day arithmetic and cadence lookup.
//!
//! `days_since` is time-of-day sensitive (floor of elapsed milliseconds over
//! one day) while `days_until` compares calendar dates only. The two are not
//! symmetric and callers should not mix them for the same comparison.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Cadence used when a label is missing or unmapped.
pub const DEFAULT_CADENCE_DAYS: u32 = 30;

/// Expected interval between catch-ups with a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Biannually,
    Annually,
}

impl Cadence {
    pub const ALL: [Cadence; 7] = [
        Cadence::Daily,
        Cadence::Weekly,
        Cadence::Biweekly,
        Cadence::Monthly,
        Cadence::Quarterly,
        Cadence::Biannually,
        Cadence::Annually,
    ];

    /// Number of days in one cadence period.
    pub fn days(self) -> u32 {
        match self {
            Cadence::Daily => 1,
            Cadence::Weekly => 7,
            Cadence::Biweekly => 14,
            Cadence::Monthly => 30,
            Cadence::Quarterly => 90,
            Cadence::Biannually => 180,
            Cadence::Annually => 365,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Cadence::Daily => "daily",
            Cadence::Weekly => "weekly",
            Cadence::Biweekly => "biweekly",
            Cadence::Monthly => "monthly",
            Cadence::Quarterly => "quarterly",
            Cadence::Biannually => "biannually",
            Cadence::Annually => "annually",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cadence {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cadence::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| ValidationError::UnknownLabel {
                kind: "cadence",
                value: s.to_string(),
            })
    }
}

/// Day count for a cadence label, falling back to 30 for anything unmapped.
pub fn cadence_days(label: &str) -> u32 {
    label
        .parse::<Cadence>()
        .map(Cadence::days)
        .unwrap_or(DEFAULT_CADENCE_DAYS)
}

/// Whole days elapsed since `at`, or `None` when there is no date.
///
/// Uses floor division so a contact 23 hours ago is still "0 days".
pub fn days_since(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    at.map(|at| (now - at).num_milliseconds().div_euclid(MILLIS_PER_DAY))
}

/// Calendar days remaining until `date` (negative when overdue).
pub fn days_until(date: Option<NaiveDate>, today: NaiveDate) -> Option<i64> {
    date.map(|d| (d - today).num_days())
}

/// Signed calendar-day distance from `from` to `to`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Ordering for "who should I reach out to first".
///
/// Most overdue catch-up first; connections with no scheduled catch-up sort
/// after every dated one.
pub fn compare_catchup_urgency(
    a: Option<NaiveDate>,
    b: Option<NaiveDate>,
    today: NaiveDate,
) -> Ordering {
    match (days_until(a, today), days_until(b, today)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn cadence_lookup_table() {
        let expected = [1, 7, 14, 30, 90, 180, 365];
        for (cadence, days) in Cadence::ALL.iter().zip(expected) {
            assert_eq!(cadence.days(), days);
            assert_eq!(cadence_days(cadence.as_str()), days);
        }
    }

    #[test]
    fn unmapped_cadence_falls_back_to_thirty() {
        assert_eq!(cadence_days("fortnightly-ish"), 30);
        assert_eq!(cadence_days(""), 30);
        assert_eq!(cadence_days(" Weekly "), 7);
    }

    #[test]
    fn days_since_floors_partial_days() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        assert_eq!(days_since(Some(now - Duration::hours(23)), now), Some(0));
        assert_eq!(days_since(Some(now - Duration::hours(25)), now), Some(1));
        assert_eq!(days_since(Some(now - Duration::days(10)), now), Some(10));
        assert_eq!(days_since(None, now), None);
    }

    #[test]
    fn days_until_ignores_time_of_day() {
        let today = d(2024, 3, 10);
        assert_eq!(days_until(Some(d(2024, 3, 12)), today), Some(2));
        assert_eq!(days_until(Some(d(2024, 3, 8)), today), Some(-2));
        assert_eq!(days_until(None, today), None);
    }

    #[test]
    fn urgency_puts_undated_last() {
        let today = d(2024, 3, 10);
        let mut dates = vec![None, Some(d(2024, 3, 20)), Some(d(2024, 3, 1)), None];
        dates.sort_by(|a, b| compare_catchup_urgency(*a, *b, today));
        assert_eq!(dates, vec![Some(d(2024, 3, 1)), Some(d(2024, 3, 20)), None, None]);
    }
}
