//! Logged actions and the connections they belong to.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::recency::Cadence;

/// Kind of contact made with a connection.
///
/// Variants are declared lightest to heaviest so the derived ordering
/// matches weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Text,
    Call,
    InPerson,
}

impl ActionType {
    pub const ALL: [ActionType; 3] = [ActionType::Text, ActionType::Call, ActionType::InPerson];

    /// Fixed weight contributed by one action of this type.
    pub fn weight(self) -> u32 {
        match self {
            ActionType::Text => 1,
            ActionType::Call => 3,
            ActionType::InPerson => 6,
        }
    }

    /// Calls and in-person meetings count as "deep" contact.
    pub fn is_deep(self) -> bool {
        !matches!(self, ActionType::Text)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Text => "text",
            ActionType::Call => "call",
            ActionType::InPerson => "in_person",
        }
    }

    /// Past-tense verb for status copy ("Last called 4 days ago").
    pub fn past_tense(self) -> &'static str {
        match self {
            ActionType::Text => "texted",
            ActionType::Call => "called",
            ActionType::InPerson => "met up",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "text" => Ok(ActionType::Text),
            "call" => Ok(ActionType::Call),
            "in_person" => Ok(ActionType::InPerson),
            _ => Err(ValidationError::UnknownLabel {
                kind: "action type",
                value: s.to_string(),
            }),
        }
    }
}

/// A single logged contact.
///
/// Weight is not stored; it is always derived from `action_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub connection_id: Uuid,
    pub action_type: ActionType,
    /// Calendar day the contact happened on
    pub date: NaiveDate,
    /// Optional memory note attached by the user
    #[serde(default)]
    pub note: Option<String>,
}

impl Action {
    pub fn new(connection_id: Uuid, action_type: ActionType, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            connection_id,
            action_type,
            date,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        let note = note.into();
        self.note = if note.trim().is_empty() { None } else { Some(note) };
        self
    }

    pub fn weight(&self) -> u32 {
        self.action_type.weight()
    }

    pub fn has_memory_note(&self) -> bool {
        self.note.is_some()
    }
}

/// Core vs outer grouping of connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RingTier {
    Core,
    #[default]
    Outer,
}

impl RingTier {
    pub fn as_str(self) -> &'static str {
        match self {
            RingTier::Core => "core",
            RingTier::Outer => "outer",
        }
    }
}

impl FromStr for RingTier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "core" => Ok(RingTier::Core),
            "outer" => Ok(RingTier::Outer),
            _ => Err(ValidationError::UnknownLabel {
                kind: "ring tier",
                value: s.to_string(),
            }),
        }
    }
}

/// Read model for a tracked contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub cadence: Cadence,
    #[serde(default)]
    pub ring_tier: RingTier,
    pub last_interaction_date: Option<DateTime<Utc>>,
    pub next_catchup_date: Option<NaiveDate>,
}

impl Connection {
    pub fn new(user_id: Uuid, name: impl Into<String>, cadence: Cadence) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            cadence,
            ring_tier: RingTier::default(),
            last_interaction_date: None,
            next_catchup_date: None,
        }
    }

    pub fn cadence_days(&self) -> u32 {
        self.cadence.days()
    }
}
