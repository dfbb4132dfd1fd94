//! Wire types for the record API.
//!
//! The service exposes one collection per entity under
//! `/api/collections/{name}/records`, with paginated list responses.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use habitsync_core::{Habit, HabitPatch};

pub const HABITS_COLLECTION: &str = "habits";
pub const LOGS_COLLECTION: &str = "habit_logs";
pub const NOTES_COLLECTION: &str = "habit_notes";

/// One page of a collection listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordList<T> {
    pub page: i64,
    pub per_page: i64,
    pub total_items: i64,
    pub items: Vec<T>,
}

/// Error body returned by the record service.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// A habit record as stored remotely.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub ok_mark: Option<String>,
    #[serde(default)]
    pub bad_mark: Option<String>,
    #[serde(default)]
    pub note_increment: bool,
    /// Record creation timestamp, RFC 3339 date prefix.
    #[serde(default)]
    pub created: String,
}

impl HabitRecord {
    /// Calendar date out of the record's creation timestamp.
    pub fn created_date(&self) -> Option<NaiveDate> {
        parse_record_date(&self.created)
    }

    /// The mutable display fields as stored remotely, for diffing against a
    /// local habit before pushing an update.
    pub fn patch(&self) -> HabitPatch {
        HabitPatch {
            icon: self.icon.clone(),
            color: self.color.clone(),
            ok_mark: self
                .ok_mark
                .clone()
                .unwrap_or_else(|| habitsync_core::model::DEFAULT_OK_MARK.to_string()),
            bad_mark: self
                .bad_mark
                .clone()
                .unwrap_or_else(|| habitsync_core::model::DEFAULT_BAD_MARK.to_string()),
            note_increment: self.note_increment,
        }
    }
}

/// Payload for creating or updating a habit record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitPayload {
    pub name: String,
    pub icon: String,
    pub color: String,
    pub ok_mark: String,
    pub bad_mark: String,
    pub note_increment: bool,
    pub owner: String,
}

impl HabitPayload {
    pub fn from_habit(habit: &Habit, owner: &str) -> Self {
        Self {
            name: habit.name.clone(),
            icon: habit.icon.clone(),
            color: habit.color.clone(),
            ok_mark: habit.ok_mark.clone(),
            bad_mark: habit.bad_mark.clone(),
            note_increment: habit.note_increment,
            owner: owner.to_string(),
        }
    }
}

/// Payload for a habit field update.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitUpdatePayload {
    pub icon: String,
    pub color: String,
    pub ok_mark: String,
    pub bad_mark: String,
    pub note_increment: bool,
}

impl From<&HabitPatch> for HabitUpdatePayload {
    fn from(patch: &HabitPatch) -> Self {
        Self {
            icon: patch.icon.clone(),
            color: patch.color.clone(),
            ok_mark: patch.ok_mark.clone(),
            bad_mark: patch.bad_mark.clone(),
            note_increment: patch.note_increment,
        }
    }
}

/// A daily log record: `value` true is a Done mark, false a Missed mark.
#[derive(Debug, Clone, Deserialize)]
pub struct LogRecord {
    pub id: String,
    pub habit: String,
    pub date: String,
    pub value: bool,
}

impl LogRecord {
    pub fn date(&self) -> Option<NaiveDate> {
        parse_record_date(&self.date)
    }
}

/// Payload for creating a log record.
#[derive(Debug, Clone, Serialize)]
pub struct LogPayload {
    pub habit: String,
    pub date: String,
    pub value: bool,
    pub owner: String,
}

/// A note record for one habit and day.
#[derive(Debug, Clone, Deserialize)]
pub struct NoteRecord {
    pub id: String,
    pub habit: String,
    pub date: String,
    #[serde(default)]
    pub text: String,
}

impl NoteRecord {
    pub fn date(&self) -> Option<NaiveDate> {
        parse_record_date(&self.date)
    }
}

/// Payload for creating a note record.
#[derive(Debug, Clone, Serialize)]
pub struct NotePayload {
    pub habit: String,
    pub date: String,
    pub text: String,
    pub owner: String,
}

/// Date fields come back either as a plain `YYYY-MM-DD` or with a time
/// suffix; only the date prefix matters.
pub fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    let prefix = raw.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}
