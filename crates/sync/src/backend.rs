//! Trait seam between the sync engine and the remote record API.

use async_trait::async_trait;
use chrono::NaiveDate;

use habitsync_core::{Habit, HabitPatch};

use crate::client::RecordApiClient;
use crate::error::Result;
use crate::session::Session;
use crate::types::{HabitRecord, LogRecord, NoteRecord};

/// Everything the engine needs from the remote side. Implemented by
/// [`RecordApiClient`] in production and by in-memory fakes in engine tests.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    async fn list_habits(&self, session: &Session) -> Result<Vec<HabitRecord>>;

    async fn create_habit(&self, session: &Session, habit: &Habit) -> Result<HabitRecord>;

    async fn update_habit(
        &self,
        session: &Session,
        habit_id: &str,
        patch: &HabitPatch,
    ) -> Result<()>;

    async fn list_logs(&self, session: &Session) -> Result<Vec<LogRecord>>;

    async fn upsert_log(
        &self,
        session: &Session,
        habit_id: &str,
        date: NaiveDate,
        value: Option<bool>,
    ) -> Result<()>;

    async fn list_notes(&self, session: &Session) -> Result<Vec<NoteRecord>>;

    async fn upsert_note(
        &self,
        session: &Session,
        habit_id: &str,
        date: NaiveDate,
        text: Option<&str>,
    ) -> Result<()>;
}

#[async_trait]
impl RemoteBackend for RecordApiClient {
    async fn list_habits(&self, session: &Session) -> Result<Vec<HabitRecord>> {
        RecordApiClient::list_habits(self, session).await
    }

    async fn create_habit(&self, session: &Session, habit: &Habit) -> Result<HabitRecord> {
        RecordApiClient::create_habit(self, session, habit).await
    }

    async fn update_habit(
        &self,
        session: &Session,
        habit_id: &str,
        patch: &HabitPatch,
    ) -> Result<()> {
        RecordApiClient::update_habit(self, session, habit_id, patch).await
    }

    async fn list_logs(&self, session: &Session) -> Result<Vec<LogRecord>> {
        RecordApiClient::list_logs(self, session).await
    }

    async fn upsert_log(
        &self,
        session: &Session,
        habit_id: &str,
        date: NaiveDate,
        value: Option<bool>,
    ) -> Result<()> {
        RecordApiClient::upsert_log(self, session, habit_id, date, value).await
    }

    async fn list_notes(&self, session: &Session) -> Result<Vec<NoteRecord>> {
        RecordApiClient::list_notes(self, session).await
    }

    async fn upsert_note(
        &self,
        session: &Session,
        habit_id: &str,
        date: NaiveDate,
        text: Option<&str>,
    ) -> Result<()> {
        RecordApiClient::upsert_note(self, session, habit_id, date, text).await
    }
}
