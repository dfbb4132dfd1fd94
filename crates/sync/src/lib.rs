//! Remote client and sync engine for the habit tracker.
//!
//! The client wraps the hosted record API (collection-per-entity REST, Bearer
//! auth). The engine owns the tracker state, polls the shared credential keys
//! for session changes, hydrates local state from the remote on sign-in, and
//! replays the deferred-write queue. All remote replication of local edits is
//! best-effort: the local write always lands, and a failed remote write is
//! queued instead of surfaced.

pub mod backend;
pub mod client;
pub mod engine;
pub mod error;
pub mod session;
pub mod types;

pub use backend::RemoteBackend;
pub use client::RecordApiClient;
pub use engine::{HydrateOutcome, HydrateSummary, SyncEngine, DEFAULT_POLL_INTERVAL};
pub use error::{FailKind, Result, SyncError};
pub use session::Session;
