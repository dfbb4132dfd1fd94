//! Deferred-write queue model.
//!
//! Remote writes that fail (or run while no session is authenticated) are
//! recorded as pending operations and replayed by the sync engine on the next
//! authenticated transition. Retries are bounded: each failure schedules the
//! entry further out with exponential backoff, and entries exceeding the cap
//! move to a dead-letter state that is surfaced but never retried.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Habit, HabitPatch};

/// Failures after which an entry is dead-lettered.
pub const MAX_PENDING_RETRIES: i32 = 8;

/// Exponential backoff in seconds with cap.
pub fn backoff_seconds(consecutive_failures: i32) -> i64 {
    const MAX_EXPONENT: i32 = 8;
    const BASE_DELAY_SECONDS: i64 = 5;

    let capped = consecutive_failures.clamp(0, MAX_EXPONENT);
    2_i64.pow(capped as u32) * BASE_DELAY_SECONDS
}

/// A deferred mutation awaiting replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingOp {
    CreateHabit {
        habit: Habit,
    },
    UpdateHabit {
        habit_id: String,
        patch: HabitPatch,
    },
    WriteLog {
        habit_id: String,
        date: NaiveDate,
        value: Option<bool>,
    },
    WriteNote {
        habit_id: String,
        date: NaiveDate,
        text: Option<String>,
    },
}

impl PendingOp {
    /// Habit the operation targets.
    pub fn habit_id(&self) -> &str {
        match self {
            Self::CreateHabit { habit } => &habit.id,
            Self::UpdateHabit { habit_id, .. } => habit_id,
            Self::WriteLog { habit_id, .. } => habit_id,
            Self::WriteNote { habit_id, .. } => habit_id,
        }
    }

    /// Rewrite the targeted habit identifier after a remap.
    pub fn remap_habit_id(&mut self, old_id: &str, new_id: &str) {
        match self {
            Self::CreateHabit { habit } => {
                if habit.id == old_id {
                    habit.id = new_id.to_string();
                    habit.remote = true;
                }
            }
            Self::UpdateHabit { habit_id, .. }
            | Self::WriteLog { habit_id, .. }
            | Self::WriteNote { habit_id, .. } => {
                if habit_id == old_id {
                    *habit_id = new_id.to_string();
                }
            }
        }
    }
}

/// Queue entry lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    Pending,
    Dead,
}

/// One queued deferred write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntry {
    pub op_id: String,
    pub op: PendingOp,
    pub status: PendingStatus,
    pub retry_count: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PendingEntry {
    pub fn new(op: PendingOp) -> Self {
        Self {
            op_id: Uuid::new_v4().to_string(),
            op,
            status: PendingStatus::Pending,
            retry_count: 0,
            next_retry_at: None,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the entry is eligible for replay at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == PendingStatus::Pending
            && self.next_retry_at.map(|at| at <= now).unwrap_or(true)
    }

    /// Record a failed replay: bump the retry count, schedule the next
    /// attempt with backoff, and dead-letter past the cap.
    pub fn record_failure(&mut self, now: DateTime<Utc>, error: String) {
        self.retry_count += 1;
        self.last_error = Some(error);
        if self.retry_count >= MAX_PENDING_RETRIES {
            self.status = PendingStatus::Dead;
            self.next_retry_at = None;
        } else {
            self.next_retry_at = Some(now + Duration::seconds(backoff_seconds(self.retry_count)));
        }
    }
}
