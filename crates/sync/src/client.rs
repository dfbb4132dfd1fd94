//! Record API client for the hosted habit collections.
//!
//! Endpoints follow the collection-record convention:
//! `GET/POST /api/collections/{name}/records`, `PATCH/DELETE .../{id}`.
//! Every call carries the session's bearer token; list calls are filtered to
//! the session's owner and paginated.

use std::time::Duration;

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use chrono::NaiveDate;
use habitsync_core::{Habit, HabitPatch};

use crate::error::{Result, SyncError};
use crate::session::Session;
use crate::types::*;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;
const LIST_PAGE_SIZE: i64 = 200;

/// Client for the hosted record API.
#[derive(Debug, Clone)]
pub struct RecordApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl RecordApiClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the record service (e.g., "https://pb.example.app")
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    /// Create headers for an API request.
    fn headers(&self, session: &Session) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", session.token))
            .map_err(|_| SyncError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        Ok(headers)
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "Failed to deserialize response. Body: {}, Error: {}",
                body,
                e
            );
            SyncError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    /// Check a response for success, discarding any body.
    async fn expect_success(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            debug!("API response status: {}", status);
            return Ok(());
        }
        let body = response.text().await?;
        Self::log_response(status, &body);
        Err(Self::api_error(status, &body))
    }

    fn api_error(status: reqwest::StatusCode, body: &str) -> SyncError {
        if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(body) {
            if !error.message.is_empty() {
                return SyncError::api(status.as_u16(), error.message);
            }
        }
        SyncError::api(status.as_u16(), format!("Request failed: {}", body))
    }

    fn records_url(&self, collection: &str) -> String {
        format!("{}/api/collections/{}/records", self.base_url, collection)
    }

    fn record_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}", self.records_url(collection), id)
    }

    fn owner_filter(session: &Session) -> String {
        format!(r#"owner="{}""#, session.user_id)
    }

    fn key_filter(session: &Session, habit_id: &str, date: NaiveDate) -> String {
        format!(
            r#"habit="{}" && date="{}" && owner="{}""#,
            habit_id,
            date.format("%Y-%m-%d"),
            session.user_id
        )
    }

    /// Fetch every record of a collection matching `filter`, following the
    /// service's pagination.
    async fn list_all<T: serde::de::DeserializeOwned>(
        &self,
        session: &Session,
        collection: &str,
        filter: &str,
        sort: &str,
    ) -> Result<Vec<T>> {
        let mut items: Vec<T> = Vec::new();
        let mut page = 1_i64;
        loop {
            let url = format!(
                "{}?page={}&perPage={}&filter={}&sort={}",
                self.records_url(collection),
                page,
                LIST_PAGE_SIZE,
                urlencoding::encode(filter),
                urlencoding::encode(sort),
            );

            let response = self
                .client
                .get(&url)
                .headers(self.headers(session)?)
                .send()
                .await?;
            let list: RecordList<T> = Self::parse_response(response).await?;

            let page_len = list.items.len();
            items.extend(list.items);
            if page_len == 0 || items.len() as i64 >= list.total_items {
                return Ok(items);
            }
            page += 1;
        }
    }

    async fn create_record<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        session: &Session,
        collection: &str,
        payload: &B,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.records_url(collection))
            .headers(self.headers(session)?)
            .json(payload)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn delete_record(&self, session: &Session, collection: &str, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.record_url(collection, id))
            .headers(self.headers(session)?)
            .send()
            .await?;
        Self::expect_success(response).await
    }

    /// List the session's habit records, oldest first.
    ///
    /// GET /api/collections/habits/records
    pub async fn list_habits(&self, session: &Session) -> Result<Vec<HabitRecord>> {
        self.list_all(
            session,
            HABITS_COLLECTION,
            &Self::owner_filter(session),
            "created",
        )
        .await
    }

    /// Create a habit record and return it (with its server-assigned id).
    ///
    /// POST /api/collections/habits/records
    pub async fn create_habit(&self, session: &Session, habit: &Habit) -> Result<HabitRecord> {
        let payload = HabitPayload::from_habit(habit, &session.user_id);
        debug!("[HabitSync] create_habit: {}", habit.name);
        self.create_record(session, HABITS_COLLECTION, &payload)
            .await
    }

    /// Push the mutable display fields of a habit.
    ///
    /// PATCH /api/collections/habits/records/{id}
    pub async fn update_habit(
        &self,
        session: &Session,
        habit_id: &str,
        patch: &HabitPatch,
    ) -> Result<()> {
        let payload = HabitUpdatePayload::from(patch);
        let response = self
            .client
            .patch(self.record_url(HABITS_COLLECTION, habit_id))
            .headers(self.headers(session)?)
            .json(&payload)
            .send()
            .await?;
        Self::expect_success(response).await
    }

    /// List the session's log records, oldest date first.
    ///
    /// GET /api/collections/habit_logs/records
    pub async fn list_logs(&self, session: &Session) -> Result<Vec<LogRecord>> {
        self.list_all(
            session,
            LOGS_COLLECTION,
            &Self::owner_filter(session),
            "date",
        )
        .await
    }

    /// Replace the log records for one (habit, date) key. Existing records
    /// are deleted first; `None` leaves the key empty (a cleared mark).
    pub async fn upsert_log(
        &self,
        session: &Session,
        habit_id: &str,
        date: NaiveDate,
        value: Option<bool>,
    ) -> Result<()> {
        let filter = Self::key_filter(session, habit_id, date);
        let existing: Vec<LogRecord> = self.list_all(session, LOGS_COLLECTION, &filter, "").await?;
        for record in &existing {
            self.delete_record(session, LOGS_COLLECTION, &record.id)
                .await?;
        }

        if let Some(value) = value {
            let payload = LogPayload {
                habit: habit_id.to_string(),
                date: date.format("%Y-%m-%d").to_string(),
                value,
                owner: session.user_id.clone(),
            };
            let _: serde_json::Value = self
                .create_record(session, LOGS_COLLECTION, &payload)
                .await?;
        }
        Ok(())
    }

    /// List the session's note records.
    ///
    /// GET /api/collections/habit_notes/records
    pub async fn list_notes(&self, session: &Session) -> Result<Vec<NoteRecord>> {
        self.list_all(
            session,
            NOTES_COLLECTION,
            &Self::owner_filter(session),
            "date",
        )
        .await
    }

    /// Replace the note records for one (habit, date) key, delete-then-create
    /// like [`upsert_log`](Self::upsert_log). `None` or blank text leaves the
    /// key empty (a deleted note).
    pub async fn upsert_note(
        &self,
        session: &Session,
        habit_id: &str,
        date: NaiveDate,
        text: Option<&str>,
    ) -> Result<()> {
        let filter = Self::key_filter(session, habit_id, date);
        let existing: Vec<NoteRecord> =
            self.list_all(session, NOTES_COLLECTION, &filter, "").await?;
        for record in &existing {
            self.delete_record(session, NOTES_COLLECTION, &record.id)
                .await?;
        }

        if let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) {
            let payload = NotePayload {
                habit: habit_id.to_string(),
                date: date.format("%Y-%m-%d").to_string(),
                text: text.to_string(),
                owner: session.user_id.clone(),
            };
            let _: serde_json::Value = self
                .create_record(session, NOTES_COLLECTION, &payload)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{HashMap, VecDeque};
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex as TokioMutex;

    use crate::error::FailKind;

    fn test_session() -> Session {
        Session {
            user_id: "u1".to_string(),
            token: "tok-1".to_string(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    fn api_error_body(code: i64, message: &str) -> String {
        format!(r#"{{"code":{},"message":"{}","data":{{}}}}"#, code, message)
    }

    fn list_body(per_page: i64, total: i64, page: i64, items: &[&str]) -> String {
        format!(
            r#"{{"page":{},"perPage":{},"totalItems":{},"items":[{}]}}"#,
            page,
            per_page,
            total,
            items.join(",")
        )
    }

    #[derive(Debug, Clone)]
    struct CapturedRequest {
        method: String,
        path: String,
        authorization: Option<String>,
        body: String,
    }

    #[derive(Debug, Clone)]
    enum MockOutcome {
        Respond { status: u16, body: String },
        DropConnection,
    }

    fn header_end_offset(buffer: &[u8]) -> Option<usize> {
        buffer.windows(4).position(|window| window == b"\r\n\r\n")
    }

    async fn read_http_request(
        stream: &mut tokio::net::TcpStream,
    ) -> Option<(String, String, HashMap<String, String>, String)> {
        let mut buffer = Vec::new();
        loop {
            let mut chunk = [0_u8; 2048];
            let read = stream.read(&mut chunk).await.ok()?;
            if read == 0 {
                return None;
            }
            buffer.extend_from_slice(&chunk[..read]);
            if header_end_offset(&buffer).is_some() {
                break;
            }
        }

        let header_end = header_end_offset(&buffer)?;
        let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
        let mut lines = head.lines();
        let request_line = lines.next()?.to_string();
        let mut parts = request_line.split_whitespace();
        let method = parts.next()?.to_string();
        let path = parts.next()?.to_string();

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        let content_length = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        let mut body = buffer[header_end + 4..].to_vec();
        while body.len() < content_length {
            let mut chunk = [0_u8; 2048];
            let read = stream.read(&mut chunk).await.ok()?;
            if read == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..read]);
        }

        Some((
            method,
            path,
            headers,
            String::from_utf8_lossy(&body).to_string(),
        ))
    }

    fn status_text(status: u16) -> &'static str {
        match status {
            200 => "OK",
            204 => "No Content",
            400 => "Bad Request",
            401 => "Unauthorized",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "Error",
        }
    }

    async fn write_http_response(
        stream: &mut tokio::net::TcpStream,
        status: u16,
        body: &str,
    ) -> std::io::Result<()> {
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            status_text(status),
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await?;
        stream.flush().await
    }

    async fn start_mock_server(
        outcomes: Vec<MockOutcome>,
    ) -> (
        String,
        Arc<TokioMutex<Vec<CapturedRequest>>>,
        tokio::task::JoinHandle<()>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let captured = Arc::new(TokioMutex::new(Vec::<CapturedRequest>::new()));
        let scripted = Arc::new(TokioMutex::new(VecDeque::from(outcomes)));
        let captured_clone = Arc::clone(&captured);
        let scripted_clone = Arc::clone(&scripted);

        let handle = tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(value) => value,
                    Err(_) => break,
                };
                let captured_inner = Arc::clone(&captured_clone);
                let scripted_inner = Arc::clone(&scripted_clone);
                tokio::spawn(async move {
                    let Some((method, path, headers, body)) =
                        read_http_request(&mut stream).await
                    else {
                        return;
                    };
                    captured_inner.lock().await.push(CapturedRequest {
                        method,
                        path,
                        authorization: headers.get("authorization").cloned(),
                        body,
                    });

                    let outcome =
                        scripted_inner
                            .lock()
                            .await
                            .pop_front()
                            .unwrap_or(MockOutcome::Respond {
                                status: 500,
                                body: api_error_body(500, "unexpected request"),
                            });

                    match outcome {
                        MockOutcome::DropConnection => {}
                        MockOutcome::Respond { status, body } => {
                            let _ = write_http_response(&mut stream, status, &body).await;
                        }
                    }
                });
            }
        });

        (format!("http://{}", addr), captured, handle)
    }

    #[tokio::test]
    async fn list_habits_follows_pagination_and_sends_bearer() {
        let page_one = list_body(
            200,
            3,
            1,
            &[
                r#"{"id":"h1","name":"Study","icon":"📝","color":"primary","created":"2026-01-01 09:00:00.000Z"}"#,
                r#"{"id":"h2","name":"Training","icon":"💪","color":"secondary","created":"2026-01-02 09:00:00.000Z"}"#,
            ],
        );
        let page_two = list_body(
            200,
            3,
            2,
            &[r#"{"id":"h3","name":"Reading","icon":"📚","color":"accent","created":"2026-01-03 09:00:00.000Z"}"#],
        );
        let (base_url, captured, server) = start_mock_server(vec![
            MockOutcome::Respond {
                status: 200,
                body: page_one,
            },
            MockOutcome::Respond {
                status: 200,
                body: page_two,
            },
        ])
        .await;

        let client = RecordApiClient::new(&base_url);
        let habits = client
            .list_habits(&test_session())
            .await
            .expect("list habits");

        assert_eq!(habits.len(), 3);
        assert_eq!(habits[0].id, "h1");
        assert_eq!(
            habits[0].created_date(),
            NaiveDate::from_ymd_opt(2026, 1, 1)
        );

        let requests = captured.lock().await.clone();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, "GET");
        assert!(requests[0].path.starts_with("/api/collections/habits/records?page=1"));
        assert!(requests[1].path.contains("page=2"));
        // Owner filter travels URL-encoded.
        assert!(requests[0].path.contains("owner%3D%22u1%22"));
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer tok-1"));

        server.abort();
    }

    #[tokio::test]
    async fn upsert_log_deletes_existing_then_creates() {
        let existing = list_body(
            200,
            1,
            1,
            &[r#"{"id":"old1","habit":"h1","date":"2026-05-10 00:00:00.000Z","value":false}"#],
        );
        let (base_url, captured, server) = start_mock_server(vec![
            MockOutcome::Respond {
                status: 200,
                body: existing,
            },
            MockOutcome::Respond {
                status: 204,
                body: String::new(),
            },
            MockOutcome::Respond {
                status: 200,
                body: r#"{"id":"new1","habit":"h1","date":"2026-05-10","value":true}"#.to_string(),
            },
        ])
        .await;

        let client = RecordApiClient::new(&base_url);
        client
            .upsert_log(&test_session(), "h1", day(10), Some(true))
            .await
            .expect("upsert log");

        let requests = captured.lock().await.clone();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].method, "GET");
        assert!(requests[0].path.contains("habit_logs"));
        assert_eq!(requests[1].method, "DELETE");
        assert_eq!(requests[1].path, "/api/collections/habit_logs/records/old1");
        assert_eq!(requests[2].method, "POST");
        let created: serde_json::Value = serde_json::from_str(&requests[2].body).unwrap();
        assert_eq!(created["habit"], "h1");
        assert_eq!(created["date"], "2026-05-10");
        assert_eq!(created["value"], true);
        assert_eq!(created["owner"], "u1");

        server.abort();
    }

    #[tokio::test]
    async fn clearing_a_mark_skips_the_create() {
        let existing = list_body(
            200,
            1,
            1,
            &[r#"{"id":"old1","habit":"h1","date":"2026-05-10","value":true}"#],
        );
        let (base_url, captured, server) = start_mock_server(vec![
            MockOutcome::Respond {
                status: 200,
                body: existing,
            },
            MockOutcome::Respond {
                status: 204,
                body: String::new(),
            },
        ])
        .await;

        let client = RecordApiClient::new(&base_url);
        client
            .upsert_log(&test_session(), "h1", day(10), None)
            .await
            .expect("clear log");

        let requests = captured.lock().await.clone();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, "DELETE");

        server.abort();
    }

    #[tokio::test]
    async fn rejected_token_classifies_as_unauthenticated() {
        let (base_url, _captured, server) = start_mock_server(vec![MockOutcome::Respond {
            status: 401,
            body: api_error_body(401, "The request requires valid record authorization token."),
        }])
        .await;

        let client = RecordApiClient::new(&base_url);
        let err = client
            .list_habits(&test_session())
            .await
            .expect_err("should fail");
        assert_eq!(err.fail_kind(), FailKind::Unauthenticated);
        assert_eq!(err.status_code(), Some(401));

        server.abort();
    }

    #[tokio::test]
    async fn missing_collection_classifies_as_not_found() {
        let (base_url, _captured, server) = start_mock_server(vec![MockOutcome::Respond {
            status: 404,
            body: api_error_body(404, "Missing collection context."),
        }])
        .await;

        let client = RecordApiClient::new(&base_url);
        let err = client
            .list_notes(&test_session())
            .await
            .expect_err("should fail");
        assert_eq!(err.fail_kind(), FailKind::NotFound);

        server.abort();
    }

    #[tokio::test]
    async fn dropped_connection_classifies_as_request_failed() {
        let (base_url, _captured, server) =
            start_mock_server(vec![MockOutcome::DropConnection]).await;

        let client = RecordApiClient::new(&base_url);
        let err = client
            .list_logs(&test_session())
            .await
            .expect_err("should fail");
        assert_eq!(err.fail_kind(), FailKind::RequestFailed);

        server.abort();
    }
}
