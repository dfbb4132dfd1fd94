//! In-memory tracker state and its mutations.
//!
//! All mutation goes through methods here; the sync engine and any UI layer
//! share one `TrackerState` behind the engine's lock.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::model::{merge_key, Habit, Mark, Timeframe};
use crate::notes::{shift_notes_forward, NoteShift};

pub type DateSet = BTreeSet<NaiveDate>;
pub type NotesByDate = BTreeMap<NaiveDate, String>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerState {
    pub habits: Vec<Habit>,
    pub active_id: Option<String>,
    /// Done marks per habit.
    pub logs: HashMap<String, DateSet>,
    /// Missed marks per habit.
    pub neg_logs: HashMap<String, DateSet>,
    pub notes: HashMap<String, NotesByDate>,
    pub timeframe: Timeframe,
}

impl TrackerState {
    /// Seed the two default habits when none are persisted, and point the
    /// active selection at the first habit.
    pub fn seed_defaults(&mut self, today: NaiveDate) {
        if self.habits.is_empty() {
            let mut study = Habit::new_local("Study", "📝", "primary", today);
            study.id = "local-1".to_string();
            let mut training = Habit::new_local("Training", "💪", "secondary", today);
            training.id = "local-2".to_string();
            self.habits.push(study);
            self.habits.push(training);
        }
        if self.active_id.is_none() {
            self.active_id = self.habits.first().map(|h| h.id.clone());
        }
    }

    pub fn habit(&self, id: &str) -> Option<&Habit> {
        self.habits.iter().find(|h| h.id == id)
    }

    pub fn habit_mut(&mut self, id: &str) -> Option<&mut Habit> {
        self.habits.iter_mut().find(|h| h.id == id)
    }

    /// Case-insensitive name lookup (the local/remote merge key).
    pub fn find_by_name(&self, name: &str) -> Option<&Habit> {
        let key = merge_key(name);
        self.habits.iter().find(|h| merge_key(&h.name) == key)
    }

    pub fn add_habit(&mut self, habit: Habit) {
        if self.active_id.is_none() {
            self.active_id = Some(habit.id.clone());
        }
        self.habits.push(habit);
    }

    /// Local-only removal: drops the habit and all of its entries.
    pub fn remove_habit(&mut self, id: &str) {
        self.habits.retain(|h| h.id != id);
        self.logs.remove(id);
        self.neg_logs.remove(id);
        self.notes.remove(id);
        if self.active_id.as_deref() == Some(id) {
            self.active_id = self.habits.first().map(|h| h.id.clone());
        }
    }

    /// Write the mark for (habit, date), replacing any prior entry for that
    /// key; `None` clears it. Returns whether the date was previously Missed
    /// (the note-increment cascade trigger).
    pub fn set_mark(&mut self, habit_id: &str, date: NaiveDate, mark: Option<Mark>) -> bool {
        let pos = self.logs.entry(habit_id.to_string()).or_default();
        pos.remove(&date);
        let neg = self.neg_logs.entry(habit_id.to_string()).or_default();
        let was_missed = neg.remove(&date);
        match mark {
            Some(Mark::Done) => {
                self.logs.entry(habit_id.to_string()).or_default().insert(date);
            }
            Some(Mark::Missed) => {
                self.neg_logs
                    .entry(habit_id.to_string())
                    .or_default()
                    .insert(date);
            }
            None => {}
        }
        was_missed
    }

    pub fn mark_at(&self, habit_id: &str, date: NaiveDate) -> Option<Mark> {
        if self.logs.get(habit_id).is_some_and(|s| s.contains(&date)) {
            return Some(Mark::Done);
        }
        if self.neg_logs.get(habit_id).is_some_and(|s| s.contains(&date)) {
            return Some(Mark::Missed);
        }
        None
    }

    /// Set or delete (empty text) the note for (habit, date).
    pub fn set_note(&mut self, habit_id: &str, date: NaiveDate, text: &str) {
        let text = text.trim();
        let notes = self.notes.entry(habit_id.to_string()).or_default();
        if text.is_empty() {
            notes.remove(&date);
        } else {
            notes.insert(date, text.to_string());
        }
    }

    pub fn note_at(&self, habit_id: &str, date: NaiveDate) -> Option<&str> {
        self.notes
            .get(habit_id)
            .and_then(|n| n.get(&date))
            .map(String::as_str)
    }

    /// Run the note-increment cascade for a habit, returning the moves for
    /// remote replication.
    pub fn shift_notes(&mut self, habit_id: &str, start: NaiveDate) -> Vec<NoteShift> {
        match self.notes.get_mut(habit_id) {
            Some(notes) => shift_notes_forward(notes, start),
            None => Vec::new(),
        }
    }

    /// Move a habit and all of its references to a durable identifier in one
    /// mutation: logs, negative logs, notes, and the active pointer.
    pub fn remap_habit_id(&mut self, old_id: &str, new_id: &str) {
        if old_id == new_id {
            return;
        }
        if let Some(habit) = self.habit_mut(old_id) {
            habit.id = new_id.to_string();
            habit.remote = true;
        }
        if let Some(set) = self.logs.remove(old_id) {
            self.logs.entry(new_id.to_string()).or_default().extend(set);
        }
        if let Some(set) = self.neg_logs.remove(old_id) {
            self.neg_logs
                .entry(new_id.to_string())
                .or_default()
                .extend(set);
        }
        if let Some(notes) = self.notes.remove(old_id) {
            let target = self.notes.entry(new_id.to_string()).or_default();
            for (date, text) in notes {
                target.entry(date).or_insert(text);
            }
        }
        if self.active_id.as_deref() == Some(old_id) {
            self.active_id = Some(new_id.to_string());
        }
    }

    /// Presence-only union of one remote log record. Never removes a local
    /// mark.
    pub fn union_remote_log(&mut self, habit_id: &str, date: NaiveDate, value: bool) {
        if value {
            self.logs.entry(habit_id.to_string()).or_default().insert(date);
        } else {
            self.neg_logs
                .entry(habit_id.to_string())
                .or_default()
                .insert(date);
        }
    }

    /// Union of one remote note record; an existing local note wins.
    pub fn union_remote_note(&mut self, habit_id: &str, date: NaiveDate, text: String) {
        if text.trim().is_empty() {
            return;
        }
        self.notes
            .entry(habit_id.to_string())
            .or_default()
            .entry(date)
            .or_insert(text);
    }
}
