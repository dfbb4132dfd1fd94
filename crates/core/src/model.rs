//! Habit, mark, and timeframe domain types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix carried by locally provisioned habit identifiers until a remote
/// create assigns a durable one.
pub const LOCAL_ID_PREFIX: &str = "local-";

pub const DEFAULT_OK_MARK: &str = "✅";
pub const DEFAULT_BAD_MARK: &str = "❌";

fn default_ok_mark() -> String {
    DEFAULT_OK_MARK.to_string()
}

fn default_bad_mark() -> String {
    DEFAULT_BAD_MARK.to_string()
}

/// Mint a provisional habit identifier.
pub fn new_local_id() -> String {
    format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4())
}

/// Normalize a habit name into its merge key. Local and remote habits whose
/// names normalize to the same key are treated as the same entity.
pub fn merge_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Boolean daily outcome for a habit on a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Done,
    Missed,
}

/// A tracked activity with its display configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub color: String,
    #[serde(default = "default_ok_mark")]
    pub ok_mark: String,
    #[serde(default = "default_bad_mark")]
    pub bad_mark: String,
    #[serde(default)]
    pub note_increment: bool,
    pub created_at: NaiveDate,
    /// True once the identifier is server-assigned.
    #[serde(default)]
    pub remote: bool,
}

impl Habit {
    /// Create a habit with a provisional local identifier.
    pub fn new_local(
        name: impl Into<String>,
        icon: impl Into<String>,
        color: impl Into<String>,
        created_at: NaiveDate,
    ) -> Self {
        Self {
            id: new_local_id(),
            name: name.into(),
            icon: icon.into(),
            color: color.into(),
            ok_mark: default_ok_mark(),
            bad_mark: default_bad_mark(),
            note_increment: false,
            created_at,
            remote: false,
        }
    }

    pub fn is_local(&self) -> bool {
        self.id.starts_with(LOCAL_ID_PREFIX)
    }

    /// Overwrite the mutable display fields.
    pub fn apply_patch(&mut self, patch: &HabitPatch) {
        self.icon = patch.icon.clone();
        self.color = patch.color.clone();
        self.ok_mark = patch.ok_mark.clone();
        self.bad_mark = patch.bad_mark.clone();
        self.note_increment = patch.note_increment;
    }

    /// Snapshot of the mutable display fields.
    pub fn patch(&self) -> HabitPatch {
        HabitPatch {
            icon: self.icon.clone(),
            color: self.color.clone(),
            ok_mark: self.ok_mark.clone(),
            bad_mark: self.bad_mark.clone(),
            note_increment: self.note_increment,
        }
    }
}

/// The mutable display fields of a habit, diffed during hydration and pushed
/// as a remote update when they differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitPatch {
    pub icon: String,
    pub color: String,
    pub ok_mark: String,
    pub bad_mark: String,
    pub note_increment: bool,
}

/// Persisted chart range selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
    #[default]
    #[serde(rename = "6m")]
    Last6Months,
    #[serde(rename = "12m")]
    Last12Months,
    #[serde(rename = "lastYear")]
    LastYear,
    #[serde(rename = "thisYear")]
    ThisYear,
}

impl Timeframe {
    /// Token persisted under the timeframe key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Last7Days => "7d",
            Self::Last30Days => "30d",
            Self::Last90Days => "90d",
            Self::Last6Months => "6m",
            Self::Last12Months => "12m",
            Self::LastYear => "lastYear",
            Self::ThisYear => "thisYear",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "7d" => Some(Self::Last7Days),
            "30d" => Some(Self::Last30Days),
            "90d" => Some(Self::Last90Days),
            "6m" => Some(Self::Last6Months),
            "12m" => Some(Self::Last12Months),
            "lastYear" => Some(Self::LastYear),
            "thisYear" => Some(Self::ThisYear),
            _ => None,
        }
    }
}
