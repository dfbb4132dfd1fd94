//! Domain model and pure logic for the habit tracker sync core.
//!
//! This crate holds the habit/mark/note data model, the in-memory tracker
//! state and its mutations (including identifier remapping and the
//! note-increment cascade), the pending-operation model used by the sync
//! engine's deferred-write queue, and activity statistics. It has no I/O.

pub mod model;
pub mod notes;
pub mod pending;
pub mod state;
pub mod stats;

pub use model::{merge_key, new_local_id, Habit, HabitPatch, Mark, Timeframe, LOCAL_ID_PREFIX};
pub use notes::{shift_notes_forward, NoteShift, NOTE_JOIN};
pub use pending::{
    backoff_seconds, PendingEntry, PendingOp, PendingStatus, MAX_PENDING_RETRIES,
};
pub use state::TrackerState;
