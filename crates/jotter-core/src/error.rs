use jotter_shared::NoteId;
use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum NotesError {
    /// No token, or the remote store rejected the session.
    #[error("not authenticated")]
    Unauthenticated,

    #[error("{field} must not be empty")]
    Validation { field: &'static str },

    #[error("another request is still in flight")]
    Busy,

    #[error("no note is being edited")]
    NotEditing,

    #[error("note {0} is not in the current collection")]
    UnknownNote(NoteId),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl NotesError {
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }
}
