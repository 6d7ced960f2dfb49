//! The remote notes store as seen from the client.

pub mod http;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use jotter_shared::{Note, NoteBody, NoteId, NotesQuery};
use thiserror::Error;

pub use http::HttpNotesRemote;
pub use memory::MemoryNotesRemote;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote store rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("remote store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 401 || status == 403 {
            Self::Unauthorized { status }
        } else {
            Self::Status { status, body }
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// CRUD surface of the notes API. Every call carries the bearer token.
#[async_trait]
pub trait NotesRemote: Send + Sync {
    /// `GET /notes`, optionally narrowed by `query`.
    async fn list(&self, token: &str, query: Option<&NotesQuery>) -> Result<Vec<Note>, RemoteError>;

    /// `POST /notes`
    async fn create(&self, token: &str, body: &NoteBody) -> Result<Note, RemoteError>;

    /// `PUT /notes/{id}`
    async fn update(&self, token: &str, id: &NoteId, body: &NoteBody) -> Result<Note, RemoteError>;

    /// `DELETE /notes/{id}`
    async fn delete(&self, token: &str, id: &NoteId) -> Result<(), RemoteError>;
}

#[async_trait]
impl<T: NotesRemote + ?Sized> NotesRemote for Arc<T> {
    async fn list(&self, token: &str, query: Option<&NotesQuery>) -> Result<Vec<Note>, RemoteError> {
        (**self).list(token, query).await
    }

    async fn create(&self, token: &str, body: &NoteBody) -> Result<Note, RemoteError> {
        (**self).create(token, body).await
    }

    async fn update(&self, token: &str, id: &NoteId, body: &NoteBody) -> Result<Note, RemoteError> {
        (**self).update(token, id, body).await
    }

    async fn delete(&self, token: &str, id: &NoteId) -> Result<(), RemoteError> {
        (**self).delete(token, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::RemoteError;

    #[test]
    fn auth_statuses_classify_as_unauthorized() {
        assert!(RemoteError::from_status(401, String::new()).is_auth());
        assert!(RemoteError::from_status(403, String::new()).is_auth());
        assert!(!RemoteError::from_status(500, "boom".to_string()).is_auth());
        assert!(!RemoteError::Transport("refused".to_string()).is_auth());
    }
}
