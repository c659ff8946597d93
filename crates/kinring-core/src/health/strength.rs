//! Five-tier strength classification.
//!
//! The derived path classifies `days_since / cadence_days` against fixed
//! ratio cutoffs. Boundary ratios belong to the better tier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Relationship strength, declared worst to best so `Ord` reads naturally
/// (`Flourishing > Decaying`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthTier {
    Decaying,
    Thinning,
    Stable,
    Strong,
    Flourishing,
}

/// Tier reported for a connection that has never been contacted.
///
/// Both the derived and the persisted path use this same value.
pub const NEVER_CONTACTED_TIER: StrengthTier = StrengthTier::Stable;

/// Upper ratio bound (inclusive) for each tier, best first.
const RATIO_CUTOFFS: [(f64, StrengthTier); 4] = [
    (0.5, StrengthTier::Flourishing),
    (1.0, StrengthTier::Strong),
    (1.5, StrengthTier::Stable),
    (2.5, StrengthTier::Thinning),
];

impl StrengthTier {
    pub const ALL: [StrengthTier; 5] = [
        StrengthTier::Flourishing,
        StrengthTier::Strong,
        StrengthTier::Stable,
        StrengthTier::Thinning,
        StrengthTier::Decaying,
    ];

    /// Thinning and decaying both count as "in decay".
    pub fn is_decaying(self) -> bool {
        self <= StrengthTier::Thinning
    }

    /// Stable or better.
    pub fn is_healthy(self) -> bool {
        self >= StrengthTier::Stable
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StrengthTier::Flourishing => "flourishing",
            StrengthTier::Strong => "strong",
            StrengthTier::Stable => "stable",
            StrengthTier::Thinning => "thinning",
            StrengthTier::Decaying => "decaying",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StrengthTier::Flourishing => "Flourishing",
            StrengthTier::Strong => "Strong",
            StrengthTier::Stable => "Stable",
            StrengthTier::Thinning => "Thinning",
            StrengthTier::Decaying => "Decaying",
        }
    }
}

impl fmt::Display for StrengthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrengthTier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrengthTier::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownLabel {
                kind: "strength tier",
                value: s.to_string(),
            })
    }
}

/// Contact ratio: elapsed days over expected cadence days.
///
/// A zero cadence is treated as one day.
pub fn contact_ratio(days_since: i64, cadence_days: u32) -> f64 {
    days_since as f64 / f64::from(cadence_days.max(1))
}

/// Stateless classification from recency and cadence.
pub fn classify(days_since: Option<i64>, cadence_days: u32) -> StrengthTier {
    let Some(days) = days_since else {
        return NEVER_CONTACTED_TIER;
    };
    let ratio = contact_ratio(days, cadence_days);
    RATIO_CUTOFFS
        .iter()
        .find(|(bound, _)| ratio <= *bound)
        .map(|(_, tier)| *tier)
        .unwrap_or(StrengthTier::Decaying)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn weekly_ten_days_is_stable() {
        assert!((contact_ratio(10, 7) - 1.4286).abs() < 1e-3);
        assert_eq!(classify(Some(10), 7), StrengthTier::Stable);
    }

    #[test]
    fn monthly_ninety_five_days_is_decaying() {
        assert!((contact_ratio(95, 30) - 3.1667).abs() < 1e-3);
        assert_eq!(classify(Some(95), 30), StrengthTier::Decaying);
    }

    #[test]
    fn boundaries_belong_to_better_tier() {
        // cadence 10 gives exact ratios 0.5 / 1.0 / 1.5 / 2.5
        assert_eq!(classify(Some(5), 10), StrengthTier::Flourishing);
        assert_eq!(classify(Some(10), 10), StrengthTier::Strong);
        assert_eq!(classify(Some(15), 10), StrengthTier::Stable);
        assert_eq!(classify(Some(25), 10), StrengthTier::Thinning);
        assert_eq!(classify(Some(26), 10), StrengthTier::Decaying);
    }

    #[test]
    fn never_contacted_is_neutral() {
        assert_eq!(classify(None, 7), StrengthTier::Stable);
        assert_eq!(classify(None, 365), NEVER_CONTACTED_TIER);
    }

    #[test]
    fn zero_cadence_does_not_divide_by_zero() {
        assert_eq!(classify(Some(0), 0), StrengthTier::Flourishing);
        assert_eq!(classify(Some(3), 0), StrengthTier::Decaying);
    }

    #[test]
    fn tier_ordering_and_labels_round_trip() {
        assert!(StrengthTier::Flourishing > StrengthTier::Strong);
        assert!(StrengthTier::Thinning.is_decaying());
        assert!(!StrengthTier::Stable.is_decaying());
        for tier in StrengthTier::ALL {
            assert_eq!(tier.as_str().parse::<StrengthTier>().unwrap(), tier);
        }
    }

    proptest! {
        #[test]
        fn tier_never_improves_with_more_days(
            days in 0i64..2_000,
            extra in 0i64..500,
            cadence in 1u32..400,
        ) {
            let earlier = classify(Some(days), cadence);
            let later = classify(Some(days + extra), cadence);
            prop_assert!(later <= earlier);
        }

        #[test]
        fn classification_is_deterministic(days in 0i64..2_000, cadence in 1u32..400) {
            prop_assert_eq!(classify(Some(days), cadence), classify(Some(days), cadence));
        }
    }
}
