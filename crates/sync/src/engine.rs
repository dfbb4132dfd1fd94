//! The sync engine: session polling, hydration, and best-effort replication.
//!
//! The engine owns the tracker state. Local edits land synchronously (state
//! plus store) and are replicated to the remote in the background of the
//! call; a failed or unauthenticated replication is queued, never surfaced.
//! A credential poll watches the shared auth keys, and the transition into an
//! authenticated session triggers a hydration pass: replay the deferred
//! queue, reconcile habits by name, then union logs and notes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, warn};
use serde::Serialize;
use tokio::sync::{watch, Mutex};

use chrono::NaiveDate;
use habitsync_core::model::{DEFAULT_BAD_MARK, DEFAULT_OK_MARK};
use habitsync_core::{
    merge_key, Habit, HabitPatch, Mark, PendingEntry, PendingOp, PendingStatus, Timeframe,
    TrackerState,
};
use habitsync_store::StateStore;

use crate::backend::RemoteBackend;
use crate::error::{FailKind, Result};
use crate::session::Session;
use crate::types::HabitRecord;

/// Credential poll cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Counts emitted by one hydration pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrateSummary {
    pub replayed_pending: usize,
    pub pushed_habits: usize,
    pub pulled_habits: usize,
    pub merged_logs: usize,
    pub merged_notes: usize,
    pub duration_ms: i64,
}

/// Result of a hydration trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HydrateOutcome {
    Completed(HydrateSummary),
    /// Another hydration was already in flight.
    Skipped,
}

pub struct SyncEngine {
    store: StateStore,
    backend: Arc<dyn RemoteBackend>,
    state: Mutex<TrackerState>,
    pending: Mutex<Vec<PendingEntry>>,
    session: Mutex<Option<Session>>,
    hydrating: AtomicBool,
    notes_disabled: AtomicBool,
    changed_tx: watch::Sender<u64>,
    poll_interval: Duration,
}

impl SyncEngine {
    pub fn new(store: StateStore, backend: Arc<dyn RemoteBackend>) -> Self {
        Self::with_poll_interval(store, backend, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(
        store: StateStore,
        backend: Arc<dyn RemoteBackend>,
        poll_interval: Duration,
    ) -> Self {
        let state = store.load(Utc::now().date_naive());
        let pending = store.load_pending();
        let (changed_tx, _) = watch::channel(0);
        Self {
            store,
            backend,
            state: Mutex::new(state),
            pending: Mutex::new(pending),
            session: Mutex::new(None),
            hydrating: AtomicBool::new(false),
            notes_disabled: AtomicBool::new(false),
            changed_tx,
            poll_interval,
        }
    }

    /// Change notifications: the value bumps whenever the tracker state
    /// changed and a re-render is warranted.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed_tx.subscribe()
    }

    fn notify(&self) {
        self.changed_tx.send_modify(|v| *v += 1);
    }

    pub async fn snapshot(&self) -> TrackerState {
        self.state.lock().await.clone()
    }

    pub async fn pending(&self) -> Vec<PendingEntry> {
        self.pending.lock().await.clone()
    }

    /// Entries that exhausted their retries and will never replay.
    pub async fn dead_letters(&self) -> Vec<PendingEntry> {
        self.pending
            .lock()
            .await
            .iter()
            .filter(|e| e.status == PendingStatus::Dead)
            .cloned()
            .collect()
    }

    pub async fn set_timeframe(&self, timeframe: Timeframe) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.timeframe = timeframe;
            self.store.save(&state)?;
        }
        self.notify();
        Ok(())
    }

    /// Add a habit locally and replicate the create. The returned id is the
    /// habit's current (possibly still provisional) identifier; it is
    /// remapped once the remote assigns a durable one.
    pub async fn add_habit(&self, habit: Habit) -> Result<String> {
        let id = habit.id.clone();
        {
            let mut state = self.state.lock().await;
            state.add_habit(habit.clone());
            self.store.save(&state)?;
        }
        self.notify();
        self.replicate(PendingOp::CreateHabit { habit }).await;
        Ok(id)
    }

    /// Update a habit's display fields locally and replicate.
    pub async fn update_habit(&self, habit_id: &str, patch: HabitPatch) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            let Some(habit) = state.habit_mut(habit_id) else {
                return Ok(());
            };
            habit.apply_patch(&patch);
            self.store.save(&state)?;
        }
        self.notify();
        self.replicate(PendingOp::UpdateHabit {
            habit_id: habit_id.to_string(),
            patch,
        })
        .await;
        Ok(())
    }

    /// Remove a habit locally. Deletion is never replicated; queued writes
    /// for the habit are dropped.
    pub async fn remove_habit(&self, habit_id: &str) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.remove_habit(habit_id);
            self.store.save(&state)?;
        }
        {
            let mut pending = self.pending.lock().await;
            pending.retain(|e| e.op.habit_id() != habit_id);
            self.store.save_pending(&pending)?;
        }
        self.notify();
        Ok(())
    }

    /// Write the mark for (habit, date); `None` clears it. The local write
    /// always lands. Marking a note-increment habit Missed on a day that was
    /// not already Missed runs the note cascade, and every resulting note
    /// move is replicated too.
    pub async fn set_mark(
        &self,
        habit_id: &str,
        date: NaiveDate,
        mark: Option<Mark>,
    ) -> Result<()> {
        let shifts = {
            let mut state = self.state.lock().await;
            let was_missed = state.set_mark(habit_id, date, mark);
            let cascade = mark == Some(Mark::Missed)
                && !was_missed
                && state
                    .habit(habit_id)
                    .map(|h| h.note_increment)
                    .unwrap_or(false);
            let shifts = if cascade {
                state.shift_notes(habit_id, date)
            } else {
                Vec::new()
            };
            self.store.save(&state)?;
            shifts
        };
        self.notify();

        let value = mark.map(|m| m == Mark::Done);
        self.replicate(PendingOp::WriteLog {
            habit_id: habit_id.to_string(),
            date,
            value,
        })
        .await;
        for shift in shifts {
            self.replicate(PendingOp::WriteNote {
                habit_id: habit_id.to_string(),
                date: shift.from,
                text: None,
            })
            .await;
            self.replicate(PendingOp::WriteNote {
                habit_id: habit_id.to_string(),
                date: shift.to,
                text: Some(shift.text),
            })
            .await;
        }
        Ok(())
    }

    /// Set or delete (empty text) the note for (habit, date), then replicate.
    pub async fn set_note(&self, habit_id: &str, date: NaiveDate, text: &str) -> Result<()> {
        let text = text.trim().to_string();
        {
            let mut state = self.state.lock().await;
            state.set_note(habit_id, date, &text);
            self.store.save(&state)?;
        }
        self.notify();
        self.replicate(PendingOp::WriteNote {
            habit_id: habit_id.to_string(),
            date,
            text: (!text.is_empty()).then_some(text),
        })
        .await;
        Ok(())
    }

    /// One credential poll step. Returns the hydration outcome when this step
    /// observed a transition into an authenticated session.
    ///
    /// The transition signature is (user id, credential presence): a token
    /// refresh for the same user is carried over without rehydrating.
    pub async fn poll_once(&self) -> Result<Option<HydrateOutcome>> {
        let current = Session::resolve(&self.store);
        {
            let mut held = self.session.lock().await;
            match (held.as_mut(), &current) {
                (None, None) => return Ok(None),
                (Some(held_session), Some(session))
                    if held_session.user_id == session.user_id =>
                {
                    held_session.token = session.token.clone();
                    return Ok(None);
                }
                _ => {}
            }
            if current.is_none() {
                debug!("[HabitSync] Session ended, sync paused");
                *held = None;
                return Ok(None);
            }
        }

        // Transition into an authenticated session: hydrate first, record the
        // session only afterwards so a failed pass retries on the next poll.
        let session = match current {
            Some(session) => session,
            None => return Ok(None),
        };
        match self.hydrate(&session).await {
            Ok(HydrateOutcome::Completed(summary)) => {
                *self.session.lock().await = Some(session);
                Ok(Some(HydrateOutcome::Completed(summary)))
            }
            Ok(HydrateOutcome::Skipped) => Ok(Some(HydrateOutcome::Skipped)),
            Err(e) => Err(e),
        }
    }

    /// Trigger a hydration pass against the current session, if any.
    pub async fn hydrate_now(&self) -> Result<HydrateOutcome> {
        let session = self.session.lock().await.clone();
        match session {
            Some(session) => self.hydrate(&session).await,
            None => Ok(HydrateOutcome::Skipped),
        }
    }

    /// Background loop: poll credentials at the configured cadence forever.
    pub async fn run(self: Arc<Self>) {
        loop {
            if let Err(e) = self.poll_once().await {
                warn!("[HabitSync] Sync poll failed: {}", e);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn hydrate(&self, session: &Session) -> Result<HydrateOutcome> {
        if self
            .hydrating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("[HabitSync] Hydration already in flight, skipping");
            return Ok(HydrateOutcome::Skipped);
        }
        let result = self.hydrate_inner(session).await;
        self.hydrating.store(false, Ordering::SeqCst);
        result.map(HydrateOutcome::Completed)
    }

    async fn hydrate_inner(&self, session: &Session) -> Result<HydrateSummary> {
        let started = Instant::now();

        let replayed_pending = self.flush_pending(session).await?;

        let remote_habits = self.backend.list_habits(session).await?;

        // Reconcile habits by name: remap matches, collect the pushes, pull
        // remote-only habits.
        let mut to_create: Vec<Habit> = Vec::new();
        let mut to_update: Vec<(String, HabitPatch)> = Vec::new();
        let mut pulled_habits = 0;
        {
            let mut state = self.state.lock().await;

            let mut remaps: Vec<(String, String)> = Vec::new();
            for habit in &state.habits {
                let matched = remote_habits
                    .iter()
                    .find(|r| merge_key(&r.name) == merge_key(&habit.name));
                match matched {
                    Some(record) => {
                        if habit.id != record.id {
                            remaps.push((habit.id.clone(), record.id.clone()));
                        }
                        let local = habit.patch();
                        if local != record.patch() {
                            to_update.push((record.id.clone(), local));
                        }
                    }
                    None => to_create.push(habit.clone()),
                }
            }
            for (old_id, new_id) in &remaps {
                state.remap_habit_id(old_id, new_id);
            }

            let today = Utc::now().date_naive();
            for record in &remote_habits {
                if state.find_by_name(&record.name).is_none() {
                    state.habits.push(habit_from_record(record, today));
                    pulled_habits += 1;
                }
            }
            if state.active_id.is_none() {
                state.active_id = state.habits.first().map(|h| h.id.clone());
            }

            if !remaps.is_empty() {
                let mut pending = self.pending.lock().await;
                for entry in pending.iter_mut() {
                    for (old_id, new_id) in &remaps {
                        entry.op.remap_habit_id(old_id, new_id);
                    }
                }
                self.store.save_pending(&pending)?;
            }
        }

        let mut pushed_habits = 0;
        for habit in to_create {
            match self.backend.create_habit(session, &habit).await {
                Ok(record) => {
                    self.apply_remap(&habit.id, &record.id).await;
                    pushed_habits += 1;
                }
                Err(e) => {
                    warn!("[HabitSync] Habit create failed, queued: {}", e);
                    self.enqueue(PendingOp::CreateHabit { habit }).await;
                }
            }
        }
        for (habit_id, patch) in to_update {
            match self.backend.update_habit(session, &habit_id, &patch).await {
                Ok(()) => pushed_habits += 1,
                Err(e) => {
                    warn!("[HabitSync] Habit update failed, queued: {}", e);
                    self.enqueue(PendingOp::UpdateHabit { habit_id, patch })
                        .await;
                }
            }
        }

        let logs = self.backend.list_logs(session).await?;
        let notes = if self.notes_disabled.load(Ordering::SeqCst) {
            Vec::new()
        } else {
            match self.backend.list_notes(session).await {
                Ok(notes) => notes,
                Err(e) if e.fail_kind() == FailKind::NotFound => {
                    warn!("[HabitSync] Notes collection missing, note sync disabled");
                    self.notes_disabled.store(true, Ordering::SeqCst);
                    Vec::new()
                }
                Err(e) => return Err(e),
            }
        };

        let mut merged_logs = 0;
        let mut merged_notes = 0;
        {
            let mut state = self.state.lock().await;
            for record in &logs {
                if let Some(date) = record.date() {
                    state.union_remote_log(&record.habit, date, record.value);
                    merged_logs += 1;
                }
            }
            for record in &notes {
                if let Some(date) = record.date() {
                    state.union_remote_note(&record.habit, date, record.text.clone());
                    merged_notes += 1;
                }
            }
            self.store.save(&state)?;
        }
        self.notify();

        Ok(HydrateSummary {
            replayed_pending,
            pushed_habits,
            pulled_habits,
            merged_logs,
            merged_notes,
            duration_ms: started.elapsed().as_millis() as i64,
        })
    }

    /// Replay the due queue entries in order. A replay failure re-queues the
    /// entry at the tail with its backoff schedule advanced; entries past the
    /// retry cap move to the dead-letter state. An unauthenticated failure
    /// stops the flush and leaves the remainder untouched.
    async fn flush_pending(&self, session: &Session) -> Result<usize> {
        let now = Utc::now();
        let mut due: VecDeque<PendingEntry> = {
            let mut pending = self.pending.lock().await;
            let mut rest = Vec::new();
            let mut due = VecDeque::new();
            for entry in pending.drain(..) {
                if entry.is_due(now) {
                    due.push_back(entry);
                } else {
                    rest.push(entry);
                }
            }
            *pending = rest;
            due
        };

        let mut replayed = 0;
        while let Some(mut entry) = due.pop_front() {
            match self.apply_op(session, &entry.op).await {
                Ok(remap) => {
                    replayed += 1;
                    if let Some((old_id, new_id)) = remap {
                        self.apply_remap(&old_id, &new_id).await;
                    }
                }
                Err(e) => match e.fail_kind() {
                    FailKind::Unauthenticated => {
                        warn!("[HabitSync] Session rejected during flush, stopping");
                        let mut pending = self.pending.lock().await;
                        pending.push(entry);
                        pending.extend(due);
                        break;
                    }
                    FailKind::NotFound if is_note_op(&entry.op) => {
                        warn!("[HabitSync] Notes collection missing, dropping queued note");
                        self.notes_disabled.store(true, Ordering::SeqCst);
                    }
                    _ => {
                        entry.record_failure(now, e.to_string());
                        if entry.status == PendingStatus::Dead {
                            warn!(
                                "[HabitSync] Pending op {} exhausted retries, dead-lettered",
                                entry.op_id
                            );
                        }
                        self.pending.lock().await.push(entry);
                    }
                },
            }
        }

        let pending = self.pending.lock().await;
        self.store.save_pending(&pending)?;
        Ok(replayed)
    }

    /// Execute one operation against the backend. A successful habit create
    /// returns the (provisional, durable) id pair to remap.
    async fn apply_op(
        &self,
        session: &Session,
        op: &PendingOp,
    ) -> Result<Option<(String, String)>> {
        match op {
            PendingOp::CreateHabit { habit } => {
                let record = self.backend.create_habit(session, habit).await?;
                Ok(Some((habit.id.clone(), record.id)))
            }
            PendingOp::UpdateHabit { habit_id, patch } => {
                self.backend.update_habit(session, habit_id, patch).await?;
                Ok(None)
            }
            PendingOp::WriteLog {
                habit_id,
                date,
                value,
            } => {
                self.backend
                    .upsert_log(session, habit_id, *date, *value)
                    .await?;
                Ok(None)
            }
            PendingOp::WriteNote {
                habit_id,
                date,
                text,
            } => {
                self.backend
                    .upsert_note(session, habit_id, *date, text.as_deref())
                    .await?;
                Ok(None)
            }
        }
    }

    /// Best-effort replication of one live edit. Failures queue a fresh
    /// entry; the caller never sees them.
    async fn replicate(&self, op: PendingOp) {
        if is_note_op(&op) && self.notes_disabled.load(Ordering::SeqCst) {
            return;
        }

        let session = self.session.lock().await.clone();
        let Some(session) = session else {
            self.enqueue(op).await;
            return;
        };

        match self.apply_op(&session, &op).await {
            Ok(Some((old_id, new_id))) => self.apply_remap(&old_id, &new_id).await,
            Ok(None) => {}
            Err(e) => {
                if e.fail_kind() == FailKind::NotFound && is_note_op(&op) {
                    warn!("[HabitSync] Notes collection missing, note sync disabled");
                    self.notes_disabled.store(true, Ordering::SeqCst);
                    return;
                }
                warn!("[HabitSync] Remote write failed, queued: {}", e);
                self.enqueue(op).await;
            }
        }
    }

    async fn enqueue(&self, op: PendingOp) {
        let mut pending = self.pending.lock().await;
        pending.push(PendingEntry::new(op));
        if let Err(e) = self.store.save_pending(&pending) {
            warn!("[HabitSync] Failed to persist pending queue: {}", e);
        }
    }

    /// Move a habit to its durable identifier everywhere: state, store, and
    /// queued operations.
    async fn apply_remap(&self, old_id: &str, new_id: &str) {
        {
            let mut state = self.state.lock().await;
            state.remap_habit_id(old_id, new_id);
            if let Err(e) = self.store.save(&state) {
                warn!("[HabitSync] Failed to persist remap: {}", e);
            }
        }
        {
            let mut pending = self.pending.lock().await;
            for entry in pending.iter_mut() {
                entry.op.remap_habit_id(old_id, new_id);
            }
            if let Err(e) = self.store.save_pending(&pending) {
                warn!("[HabitSync] Failed to persist pending queue: {}", e);
            }
        }
        self.notify();
    }
}

fn is_note_op(op: &PendingOp) -> bool {
    matches!(op, PendingOp::WriteNote { .. })
}

fn habit_from_record(record: &HabitRecord, fallback_created: NaiveDate) -> Habit {
    Habit {
        id: record.id.clone(),
        name: record.name.clone(),
        icon: record.icon.clone(),
        color: record.color.clone(),
        ok_mark: record
            .ok_mark
            .clone()
            .unwrap_or_else(|| DEFAULT_OK_MARK.to_string()),
        bad_mark: record
            .bad_mark
            .clone()
            .unwrap_or_else(|| DEFAULT_BAD_MARK.to_string()),
        note_increment: record.note_increment,
        created_at: record.created_date().unwrap_or(fallback_created),
        remote: true,
    }
}
