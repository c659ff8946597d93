//! Achievement definitions.

use super::{AchievementCategory, AchievementDefinition, ThresholdType};

const fn def(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    category: AchievementCategory,
    threshold_type: ThresholdType,
    threshold_value: u32,
) -> AchievementDefinition {
    AchievementDefinition {
        id,
        name,
        description,
        category,
        threshold_value,
        threshold_type,
        is_per_contact: matches!(threshold_type, ThresholdType::ConsecutiveCycles),
    }
}

const CATALOGUE: &[AchievementDefinition] = &[
    // Streak
    def(
        "streak_7",
        "Week of Warmth",
        "Reach out to someone 7 days in a row",
        AchievementCategory::Streak,
        ThresholdType::StreakDays,
        7,
    ),
    def(
        "streak_30",
        "Month of Moments",
        "Keep your streak alive for 30 days",
        AchievementCategory::Streak,
        ThresholdType::StreakDays,
        30,
    ),
    def(
        "streak_90",
        "Season of Connection",
        "Keep your streak alive for 90 days",
        AchievementCategory::Streak,
        ThresholdType::StreakDays,
        90,
    ),
    def(
        "streak_180",
        "Half-Year Hearth",
        "Keep your streak alive for 180 days",
        AchievementCategory::Streak,
        ThresholdType::StreakDays,
        180,
    ),
    def(
        "streak_365",
        "Year of Showing Up",
        "Keep your streak alive for a full year",
        AchievementCategory::Streak,
        ThresholdType::StreakDays,
        365,
    ),
    // Consistency (per connection)
    def(
        "consistency_3",
        "Steady Beat",
        "Meet a connection's cadence 3 cycles in a row",
        AchievementCategory::Consistency,
        ThresholdType::ConsecutiveCycles,
        3,
    ),
    def(
        "consistency_6",
        "In the Groove",
        "Meet a connection's cadence 6 cycles in a row",
        AchievementCategory::Consistency,
        ThresholdType::ConsecutiveCycles,
        6,
    ),
    def(
        "consistency_12",
        "Rhythm Master",
        "Meet a connection's cadence 12 cycles in a row",
        AchievementCategory::Consistency,
        ThresholdType::ConsecutiveCycles,
        12,
    ),
    // Recovery
    def(
        "recovery_first",
        "Second Wind",
        "Bring a fading connection back to stable",
        AchievementCategory::Recovery,
        ThresholdType::RecoveryCount,
        1,
    ),
    def(
        "recovery_triple",
        "Comeback Season",
        "Recover 3 connections within 30 days",
        AchievementCategory::Recovery,
        ThresholdType::RecoveriesInWindow,
        3,
    ),
    def(
        "recovery_forest",
        "Thriving Forest",
        "Have 80% of your connections at stable or better",
        AchievementCategory::Recovery,
        ThresholdType::ForestHealthPercent,
        80,
    ),
    // Quality
    def(
        "quality_face_time",
        "Face Time",
        "Meet up in person 5 times within 30 days",
        AchievementCategory::Quality,
        ThresholdType::InPersonActions,
        5,
    ),
    def(
        "quality_memory_keeper",
        "Memory Keeper",
        "Add a memory note to 10 interactions within 30 days",
        AchievementCategory::Quality,
        ThresholdType::MemoryNotes,
        10,
    ),
    def(
        "quality_full_spectrum",
        "Full Spectrum",
        "Text, call and meet up all within one week",
        AchievementCategory::Quality,
        ThresholdType::DistinctActionTypes,
        3,
    ),
];

/// Get all achievement definitions
pub fn catalogue() -> &'static [AchievementDefinition] {
    CATALOGUE
}

pub fn find_definition(id: &str) -> Option<&'static AchievementDefinition> {
    CATALOGUE.iter().find(|d| d.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        let ids: HashSet<_> = catalogue().iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), catalogue().len());
    }

    #[test]
    fn streak_thresholds() {
        let thresholds: Vec<u32> = catalogue()
            .iter()
            .filter(|d| d.category == AchievementCategory::Streak)
            .map(|d| d.threshold_value)
            .collect();
        assert_eq!(thresholds, vec![7, 30, 90, 180, 365]);
    }

    #[test]
    fn only_consistency_is_per_contact() {
        for d in catalogue() {
            assert_eq!(d.is_per_contact, d.category == AchievementCategory::Consistency);
        }
    }
}
