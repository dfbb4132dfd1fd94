//! Namespaced key-value persistence for the habit tracker.
//!
//! Values are JSON strings behind well-known keys; every save rewrites the
//! whole value for a key. The credential keys are read-only here, written by
//! the external auth module sharing the same store.

pub mod error;
pub mod keys;
pub mod kv;
pub mod state_store;

pub use error::{Result, StoreError};
pub use kv::{FileKvStore, KvStore, MemoryKvStore};
pub use state_store::StateStore;
