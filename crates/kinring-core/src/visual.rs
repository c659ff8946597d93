//! Render parameters for a connection's ring.
//!
//! Pure mapping from strength tier and recency to fill, opacity, colours and
//! pulse state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::health::StrengthTier;

const MIN_FILL: f64 = 8.0;
const MAX_FILL: f64 = 100.0;
const MIN_OPACITY: f64 = 0.2;
const MAX_OPACITY: f64 = 1.0;
const OUTER_OPACITY_FACTOR: f64 = 0.55;

const BOOST_WINDOW_DAYS: i64 = 7;
const STALE_AFTER_DAYS: i64 = 14;
const MAX_FILL_BOOST: f64 = 10.0;
const FILL_PENALTY_PER_DAY: f64 = 0.75;
const MAX_FILL_PENALTY: f64 = 25.0;
const MAX_OPACITY_BOOST: f64 = 0.1;
const OPACITY_PENALTY_PER_DAY: f64 = 0.01;
const MAX_OPACITY_PENALTY: f64 = 0.3;

const PULSE_WITH_DECAY_DAYS: i64 = 3;
const PULSE_ALWAYS_DAYS: i64 = 21;

/// Inner/outer colour pair for a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColorPair {
    pub inner: &'static str,
    pub outer: &'static str,
}

const fn pair(inner: &'static str, outer: &'static str) -> ColorPair {
    ColorPair { inner, outer }
}

/// Palette for flourishing, strong and stable rings.
pub const HEALTHY_PALETTE: [ColorPair; 8] = [
    pair("#2f9e77", "#a7e3cf"),
    pair("#3b82f6", "#bfdbfe"),
    pair("#8b5cf6", "#ddd6fe"),
    pair("#0ea5e9", "#bae6fd"),
    pair("#14b8a6", "#99f6e4"),
    pair("#6366f1", "#c7d2fe"),
    pair("#22c55e", "#bbf7d0"),
    pair("#ec4899", "#fbcfe8"),
];

/// Palette for thinning and decaying rings.
pub const WARNING_PALETTE: [ColorPair; 3] = [
    pair("#f59e0b", "#fde68a"),
    pair("#f97316", "#fed7aa"),
    pair("#ef4444", "#fecaca"),
];

/// Render parameters for one ring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingVisualization {
    pub fill_percent: f64,
    pub inner_opacity: f64,
    pub outer_opacity: f64,
    pub colors: ColorPair,
    pub should_pulse: bool,
    pub status_label: String,
}

impl RingVisualization {
    pub fn map(
        tier: StrengthTier,
        days_since_action: Option<i64>,
        decay_started_at: Option<DateTime<Utc>>,
        contact_name: &str,
    ) -> Self {
        let (base_fill, base_opacity) = tier_base(tier);

        let (fill_percent, inner_opacity) = match days_since_action {
            Some(days) => (
                base_fill + recency_boost(days, MAX_FILL_BOOST)
                    - staleness_penalty(days, FILL_PENALTY_PER_DAY, MAX_FILL_PENALTY),
                base_opacity + recency_boost(days, MAX_OPACITY_BOOST)
                    - staleness_penalty(days, OPACITY_PENALTY_PER_DAY, MAX_OPACITY_PENALTY),
            ),
            None => (base_fill, base_opacity),
        };
        let fill_percent = fill_percent.clamp(MIN_FILL, MAX_FILL);
        let inner_opacity = inner_opacity.clamp(MIN_OPACITY, MAX_OPACITY);

        Self {
            fill_percent,
            inner_opacity,
            outer_opacity: inner_opacity * OUTER_OPACITY_FACTOR,
            colors: color_for(tier, contact_name),
            should_pulse: should_pulse(days_since_action, decay_started_at.is_some()),
            status_label: status_label(tier, days_since_action),
        }
    }
}

fn tier_base(tier: StrengthTier) -> (f64, f64) {
    match tier {
        StrengthTier::Flourishing => (90.0, 1.0),
        StrengthTier::Strong => (72.0, 0.9),
        StrengthTier::Stable => (55.0, 0.75),
        StrengthTier::Thinning => (35.0, 0.55),
        StrengthTier::Decaying => (18.0, 0.4),
    }
}

/// Linear boost from `max` on day 0 down to nothing on day 7.
fn recency_boost(days: i64, max: f64) -> f64 {
    if (0..BOOST_WINDOW_DAYS).contains(&days) {
        max * (BOOST_WINDOW_DAYS - days) as f64 / BOOST_WINDOW_DAYS as f64
    } else {
        0.0
    }
}

fn staleness_penalty(days: i64, per_day: f64, max: f64) -> f64 {
    if days > STALE_AFTER_DAYS {
        ((days - STALE_AFTER_DAYS) as f64 * per_day).min(max)
    } else {
        0.0
    }
}

fn should_pulse(days_since_action: Option<i64>, decay_anchored: bool) -> bool {
    match days_since_action {
        Some(days) => (decay_anchored && days >= PULSE_WITH_DECAY_DAYS) || days >= PULSE_ALWAYS_DAYS,
        None => false,
    }
}

fn status_label(tier: StrengthTier, days_since_action: Option<i64>) -> String {
    match days_since_action {
        None => "New".to_string(),
        Some(days) if days <= 0 => format!("{} · today", tier.label()),
        Some(days) => format!("{} · {}d", tier.label(), days),
    }
}

/// Stable index for `name` into a palette of `len` entries.
///
/// SHA-256 keeps the result identical across runs, platforms and releases.
/// Distinct names may share an index.
pub fn palette_index(name: &str, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let digest = Sha256::digest(name.trim().as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % len as u64) as usize
}

pub fn color_for(tier: StrengthTier, contact_name: &str) -> ColorPair {
    if tier.is_decaying() {
        WARNING_PALETTE[palette_index(contact_name, WARNING_PALETTE.len())]
    } else {
        HEALTHY_PALETTE[palette_index(contact_name, HEALTHY_PALETTE.len())]
    }
}
