//! Load and save of the tracker state over a [`KvStore`].
//!
//! Each piece of state lives under its own versioned key and is parsed
//! independently; a missing or unparsable value falls back to that piece's
//! default so one corrupt key never blocks startup.

use std::sync::Arc;

use chrono::NaiveDate;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;

use habitsync_core::{PendingEntry, Timeframe, TrackerState};

use crate::error::Result;
use crate::keys;
use crate::kv::KvStore;

#[derive(Clone)]
pub struct StateStore {
    kv: Arc<dyn KvStore>,
}

impl StateStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    /// Reconstruct the tracker state. Seeds the default habits when none are
    /// persisted and points the active selection at the first habit.
    pub fn load(&self, today: NaiveDate) -> TrackerState {
        let mut state = TrackerState {
            habits: self.read_or_default(keys::HABITS),
            active_id: None,
            logs: self.read_or_default(keys::LOGS),
            neg_logs: self.read_or_default(keys::NEG_LOGS),
            notes: self.read_or_default(keys::NOTES),
            timeframe: self.read_timeframe(),
        };
        state.seed_defaults(today);
        state
    }

    /// Serialize the full state back, one key per piece. The active pointer
    /// is not persisted; it is recomputed on load.
    pub fn save(&self, state: &TrackerState) -> Result<()> {
        self.write(keys::HABITS, &state.habits)?;
        self.write(keys::LOGS, &state.logs)?;
        self.write(keys::NEG_LOGS, &state.neg_logs)?;
        self.write(keys::NOTES, &state.notes)?;
        self.kv.set(keys::TIMEFRAME, state.timeframe.as_str())?;
        Ok(())
    }

    pub fn load_pending(&self) -> Vec<PendingEntry> {
        self.read_or_default(keys::PENDING)
    }

    pub fn save_pending(&self, entries: &[PendingEntry]) -> Result<()> {
        self.write(keys::PENDING, &entries)
    }

    /// Credential written by the auth module. Empty string reads as absent.
    pub fn auth_token(&self) -> Option<String> {
        self.kv.get(keys::AUTH_TOKEN).filter(|t| !t.is_empty())
    }

    /// User id out of the auth module's persisted user record.
    pub fn auth_user_id(&self) -> Option<String> {
        let raw = self.kv.get(keys::AUTH_USER)?;
        let user: serde_json::Value = serde_json::from_str(&raw).ok()?;
        user.get("id")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }

    fn read_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let Some(raw) = self.kv.get(key) else {
            return T::default();
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("[HabitSync] Ignoring unreadable value under {key}: {e}");
                T::default()
            }
        }
    }

    fn read_timeframe(&self) -> Timeframe {
        self.kv
            .get(keys::TIMEFRAME)
            .and_then(|raw| Timeframe::parse(&raw))
            .unwrap_or_default()
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.kv.set(key, &raw)?;
        Ok(())
    }
}
