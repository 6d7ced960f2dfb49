use std::collections::BTreeMap;

use jotter_shared::{Note, NoteBody, NoteId};

use crate::error::NotesError;
use crate::filter::FilterState;

pub const TITLE_FIELD: &str = "title";
pub const DESCRIPTION_FIELD: &str = "description";

/// A note form as the user filled it in. Any named field may be set,
/// but only `title` and `description` ever leave the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormDraft {
    fields: BTreeMap<String, String>,
}

impl FormDraft {
    pub fn new(title: &str, description: &str) -> Self {
        let mut draft = Self::default();
        draft.set_field(TITLE_FIELD, title);
        draft.set_field(DESCRIPTION_FIELD, description);
        draft
    }

    pub fn from_note(note: &Note) -> Self {
        Self::new(&note.title, &note.description)
    }

    pub fn set_field(&mut self, name: &str, value: &str) {
        self.fields.insert(name.to_string(), value.to_string());
    }

    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }

    pub fn title(&self) -> &str {
        self.field(TITLE_FIELD)
    }

    pub fn description(&self) -> &str {
        self.field(DESCRIPTION_FIELD)
    }

    pub fn is_blank(&self) -> bool {
        self.fields.values().all(|value| value.is_empty())
    }

    pub fn reset(&mut self) {
        self.fields.clear();
    }

    /// Request body built from the two required fields only.
    pub fn body(&self) -> NoteBody {
        NoteBody {
            title: self.title().to_string(),
            description: self.description().to_string(),
        }
    }

    pub fn validated_body(&self) -> Result<NoteBody, NotesError> {
        if self.title().trim().is_empty() {
            return Err(NotesError::Validation { field: TITLE_FIELD });
        }
        if self.description().trim().is_empty() {
            return Err(NotesError::Validation {
                field: DESCRIPTION_FIELD,
            });
        }
        Ok(self.body())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    pub id: NoteId,
    pub form: FormDraft,
}

#[derive(Debug, Clone)]
pub struct CollectionState {
    /// Server truth as of the last successful fetch or search.
    pub notes: Vec<Note>,
    pub draft_create: FormDraft,
    pub draft_edit: Option<EditDraft>,
    pub filter: FilterState,
    /// 1-based.
    pub page: usize,
    /// Set once a fetch or search has answered; an empty `notes` with
    /// `loaded` set is a real empty result.
    pub loaded: bool,
    pub loading: bool,
    /// Message for the user after a failed create.
    pub alert: Option<String>,
}

impl Default for CollectionState {
    fn default() -> Self {
        Self {
            notes: Vec::new(),
            draft_create: FormDraft::default(),
            draft_edit: None,
            filter: FilterState::default(),
            page: 1,
            loaded: false,
            loading: false,
            alert: None,
        }
    }
}

impl CollectionState {
    pub fn find(&self, id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| &note.id == id)
    }

    /// Replaces any existing edit target.
    pub fn begin_edit(&mut self, note: &Note) {
        self.draft_edit = Some(EditDraft {
            id: note.id.clone(),
            form: FormDraft::from_note(note),
        });
    }

    pub fn cancel_edit(&mut self) {
        self.draft_edit = None;
    }

    pub fn editing(&self) -> Option<&NoteId> {
        self.draft_edit.as_ref().map(|draft| &draft.id)
    }
}

#[cfg(test)]
mod tests {
    use jotter_shared::{Note, NoteId};

    use super::{CollectionState, FormDraft};
    use crate::error::NotesError;

    fn note(id: &str, title: &str) -> Note {
        Note {
            id: NoteId::new(id),
            title: title.to_string(),
            description: format!("{title} body"),
            created_at: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn body_ignores_stray_fields() {
        let mut draft = FormDraft::new("t", "d");
        draft.set_field("id", "forged");
        draft.set_field("createdAt", "2020-01-01");

        let body = draft.body();
        assert_eq!(body.title, "t");
        assert_eq!(body.description, "d");
        assert_eq!(draft.field("id"), "forged");
    }

    #[test]
    fn whitespace_only_fields_fail_validation() {
        let draft = FormDraft::new("  ", "d");
        assert!(matches!(
            draft.validated_body(),
            Err(NotesError::Validation { field: "title" })
        ));

        let draft = FormDraft::new("t", "");
        assert!(matches!(
            draft.validated_body(),
            Err(NotesError::Validation {
                field: "description"
            })
        ));
    }

    #[test]
    fn selecting_another_note_replaces_edit_target() {
        let mut state = CollectionState::default();
        let a = note("a", "A");
        let b = note("b", "B");
        state.notes = vec![a.clone(), b.clone()];

        state.begin_edit(&b);
        state.begin_edit(&a);
        assert_eq!(state.editing(), Some(&NoteId::new("a")));
        assert_eq!(
            state.draft_edit.as_ref().map(|d| d.form.title()),
            Some("A")
        );

        state.cancel_edit();
        assert_eq!(state.editing(), None);
        assert_eq!(state.notes, vec![a, b]);
    }

    #[test]
    fn defaults_to_first_page() {
        let state = CollectionState::default();
        assert_eq!(state.page, 1);
        assert!(!state.loading);
        assert!(state.draft_create.is_blank());
    }
}
