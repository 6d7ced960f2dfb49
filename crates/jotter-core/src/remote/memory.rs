//! In-memory notes store for tests and `--offline` sessions.
//!
//! Behaves like the real API as far as the client can observe: it assigns
//! `id`/`createdAt`, checks the bearer token, filters `GET /notes` by title
//! substring and inclusive date bounds. Every request is recorded.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use jotter_shared::{Note, NoteBody, NoteId, NotesQuery};
use parking_lot::Mutex;
use tokio::sync::{RwLock, Semaphore};
use tracing::debug;
use uuid::Uuid;

use super::{NotesRemote, RemoteError};

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    List { token: String, query: Option<NotesQuery> },
    Create { token: String, body: NoteBody },
    Update { token: String, id: NoteId, body: NoteBody },
    Delete { token: String, id: NoteId },
}

/// Holds every request at the door until released.
#[derive(Debug, Clone)]
pub struct RemoteGate(Arc<Semaphore>);

impl RemoteGate {
    pub fn release(&self) {
        self.0.close();
    }
}

pub struct MemoryNotesRemote {
    token: String,
    notes: RwLock<Vec<Note>>,
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<VecDeque<RemoteError>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MemoryNotesRemote {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            notes: RwLock::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            gate: Mutex::new(None),
        }
    }

    /// Inserts a note directly, bypassing request recording.
    pub async fn seed(&self, title: &str, description: &str, created_at: DateTime<Utc>) -> Note {
        let note = new_note(title, description, created_at);
        self.notes.write().await.push(note.clone());
        note
    }

    pub async fn snapshot(&self) -> Vec<Note> {
        self.notes.read().await.clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// The next request fails with `err` after being recorded.
    pub fn fail_next(&self, err: RemoteError) {
        self.failures.lock().push_back(err);
    }

    pub fn hold_requests(&self) -> RemoteGate {
        let semaphore = Arc::new(Semaphore::new(0));
        *self.gate.lock() = Some(semaphore.clone());
        RemoteGate(semaphore)
    }

    async fn enter(&self, token: &str, call: RecordedCall) -> Result<(), RemoteError> {
        debug!(?call, "memory remote request");
        self.calls.lock().push(call);

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            let _ = gate.acquire().await;
        }

        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        if token != self.token {
            return Err(RemoteError::Unauthorized { status: 401 });
        }
        Ok(())
    }
}

#[async_trait]
impl NotesRemote for MemoryNotesRemote {
    async fn list(&self, token: &str, query: Option<&NotesQuery>) -> Result<Vec<Note>, RemoteError> {
        self.enter(
            token,
            RecordedCall::List {
                token: token.to_string(),
                query: query.cloned(),
            },
        )
        .await?;

        let notes = self.notes.read().await;
        let Some(query) = query else {
            return Ok(notes.clone());
        };
        let matcher = QueryMatcher::new(query)?;
        Ok(notes.iter().filter(|note| matcher.matches(note)).cloned().collect())
    }

    async fn create(&self, token: &str, body: &NoteBody) -> Result<Note, RemoteError> {
        self.enter(
            token,
            RecordedCall::Create {
                token: token.to_string(),
                body: body.clone(),
            },
        )
        .await?;

        if body.title.trim().is_empty() || body.description.trim().is_empty() {
            return Err(RemoteError::Status {
                status: 400,
                body: "title and description are required".to_string(),
            });
        }
        let note = new_note(&body.title, &body.description, Utc::now());
        self.notes.write().await.push(note.clone());
        Ok(note)
    }

    async fn update(&self, token: &str, id: &NoteId, body: &NoteBody) -> Result<Note, RemoteError> {
        self.enter(
            token,
            RecordedCall::Update {
                token: token.to_string(),
                id: id.clone(),
                body: body.clone(),
            },
        )
        .await?;

        let mut notes = self.notes.write().await;
        let note = notes
            .iter_mut()
            .find(|note| &note.id == id)
            .ok_or_else(|| not_found(id))?;
        note.title = body.title.clone();
        note.description = body.description.clone();
        Ok(note.clone())
    }

    async fn delete(&self, token: &str, id: &NoteId) -> Result<(), RemoteError> {
        self.enter(
            token,
            RecordedCall::Delete {
                token: token.to_string(),
                id: id.clone(),
            },
        )
        .await?;

        let mut notes = self.notes.write().await;
        let before = notes.len();
        notes.retain(|note| &note.id != id);
        if notes.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }
}

fn new_note(title: &str, description: &str, created_at: DateTime<Utc>) -> Note {
    Note {
        id: NoteId::new(Uuid::new_v4().simple().to_string()),
        title: title.to_string(),
        description: description.to_string(),
        created_at: Some(created_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        extra: Default::default(),
    }
}

fn not_found(id: &NoteId) -> RemoteError {
    RemoteError::Status {
        status: 404,
        body: format!("note {id} not found"),
    }
}

struct QueryMatcher {
    title: String,
    from: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
}

impl QueryMatcher {
    fn new(query: &NotesQuery) -> Result<Self, RemoteError> {
        let from = parse_bound(&query.from_date)?.and_then(|d| d.and_hms_opt(0, 0, 0));
        let until = parse_bound(&query.end_date)?.and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999));
        Ok(Self {
            title: query.title.to_lowercase(),
            from: from.map(|dt| dt.and_utc()),
            until: until.map(|dt| dt.and_utc()),
        })
    }

    fn matches(&self, note: &Note) -> bool {
        if !note.title.to_lowercase().contains(&self.title) {
            return false;
        }
        if self.from.is_none() && self.until.is_none() {
            return true;
        }

        let Some(created) = note
            .created_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
        else {
            return false;
        };

        self.from.is_none_or(|from| created >= from) && self.until.is_none_or(|until| created <= until)
    }
}

fn parse_bound(raw: &str) -> Result<Option<NaiveDate>, RemoteError> {
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| RemoteError::Status {
            status: 400,
            body: format!("invalid date: {raw}"),
        })
}
