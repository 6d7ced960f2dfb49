//! The note collection controller.
//!
//! Owns the client's view of the user's notes and keeps it in step with the
//! remote store. Every remote call passes the session guard first; every
//! successful mutation is followed by a full `refresh`, so `notes` is always
//! a verbatim copy of some server response and never a local patch.
//!
//! At most one remote operation runs at a time. `loading` doubles as the
//! single-flight flag: an operation started while another is in flight fails
//! with [`NotesError::Busy`] before doing any I/O.

use jotter_shared::{Note, NoteId};
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::error::NotesError;
use crate::filter::FilterState;
use crate::paginate::{DEFAULT_PAGE_SIZE, PageWindow};
use crate::remote::NotesRemote;
use crate::session::{CredentialStore, Navigator, SessionGuard};
use crate::state::CollectionState;

pub const CREATE_FAILED_ALERT: &str = "Failed to create note.";

pub struct NoteController<R, C, N> {
    remote: R,
    session: SessionGuard<C, N>,
    page_size: usize,
    state: Mutex<CollectionState>,
}

/// Clears `loading` however the operation ends.
struct FlightGuard<'a> {
    state: &'a Mutex<CollectionState>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().loading = false;
    }
}

impl<R, C, N> NoteController<R, C, N>
where
    R: NotesRemote,
    C: CredentialStore,
    N: Navigator,
{
    pub fn new(remote: R, session: SessionGuard<C, N>) -> Self {
        Self {
            remote,
            session,
            page_size: DEFAULT_PAGE_SIZE,
            state: Mutex::new(CollectionState::default()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn session(&self) -> &SessionGuard<C, N> {
        &self.session
    }

    pub fn snapshot(&self) -> CollectionState {
        self.state.lock().clone()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.state.lock().notes.clone()
    }

    /// Whether `notes` holds a server answer yet.
    pub fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn take_alert(&self) -> Option<String> {
        self.state.lock().alert.take()
    }

    fn begin(&self) -> Result<FlightGuard<'_>, NotesError> {
        let mut state = self.state.lock();
        if state.loading {
            warn!("rejecting overlapping request");
            return Err(NotesError::Busy);
        }
        state.loading = true;
        Ok(FlightGuard { state: &self.state })
    }

    /// Replaces `notes` with the full, unfiltered collection.
    async fn refresh(&self, token: &str) -> Result<(), NotesError> {
        match self.remote.list(token, None).await {
            Ok(notes) => {
                debug!(count = notes.len(), "collection refreshed");
                let mut state = self.state.lock();
                state.notes = notes;
                state.loaded = true;
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "failed to fetch notes");
                Err(self.session.on_failure(err))
            }
        }
    }

    // ---------------------------------------------------------------------
    // Sync engine
    // ---------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn fetch_all(&self) -> Result<(), NotesError> {
        let token = self.session.token()?;
        let _flight = self.begin()?;
        self.refresh(&token).await
    }

    pub fn set_create_field(&self, name: &str, value: &str) {
        self.state.lock().draft_create.set_field(name, value);
    }

    /// Submits the create form. Only `title` and `description` are sent;
    /// on failure the form is kept and an alert is raised.
    #[instrument(skip(self))]
    pub async fn create(&self) -> Result<(), NotesError> {
        let body = self.state.lock().draft_create.validated_body()?;
        let token = self.session.token()?;
        let _flight = self.begin()?;

        match self.remote.create(&token, &body).await {
            Ok(created) => {
                info!(id = %created.id, "note created");
                {
                    let mut state = self.state.lock();
                    state.draft_create.reset();
                    state.alert = None;
                }
                self.refresh(&token).await
            }
            Err(err) => {
                error!(error = %err, "failed to create note");
                self.state.lock().alert = Some(format!("{CREATE_FAILED_ALERT} {err}"));
                Err(self.session.on_failure(err))
            }
        }
    }

    /// Puts `id` in edit mode, replacing any other note being edited.
    #[instrument(skip(self), fields(id = %id))]
    pub fn select_for_edit(&self, id: &NoteId) -> Result<(), NotesError> {
        let mut state = self.state.lock();
        let note = state
            .find(id)
            .cloned()
            .ok_or_else(|| NotesError::UnknownNote(id.clone()))?;
        if let Some(previous) = state.editing()
            && previous != id
        {
            debug!(previous = %previous, "replacing edit target");
        }
        state.begin_edit(&note);
        Ok(())
    }

    pub fn set_edit_field(&self, name: &str, value: &str) -> Result<(), NotesError> {
        let mut state = self.state.lock();
        let draft = state.draft_edit.as_mut().ok_or(NotesError::NotEditing)?;
        draft.form.set_field(name, value);
        Ok(())
    }

    pub fn cancel_edit(&self) {
        self.state.lock().cancel_edit();
    }

    /// Saves the note in edit mode. A failed save is logged and leaves the
    /// edit form open.
    #[instrument(skip(self))]
    pub async fn update(&self) -> Result<(), NotesError> {
        let (id, body) = {
            let state = self.state.lock();
            let draft = state.draft_edit.as_ref().ok_or(NotesError::NotEditing)?;
            (draft.id.clone(), draft.form.validated_body()?)
        };
        let token = self.session.token()?;
        let _flight = self.begin()?;

        match self.remote.update(&token, &id, &body).await {
            Ok(_) => {
                info!(id = %id, "note updated");
                self.state.lock().cancel_edit();
                self.refresh(&token).await
            }
            Err(err) => {
                error!(id = %id, error = %err, "failed to update note");
                Err(self.session.on_failure(err))
            }
        }
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete(&self, id: &NoteId) -> Result<(), NotesError> {
        let token = self.session.token()?;
        let _flight = self.begin()?;

        match self.remote.delete(&token, id).await {
            Ok(()) => {
                info!("note deleted");
                self.refresh(&token).await
            }
            Err(err) => {
                error!(error = %err, "failed to delete note");
                Err(self.session.on_failure(err))
            }
        }
    }

    // ---------------------------------------------------------------------
    // Filter engine
    // ---------------------------------------------------------------------

    pub fn filter(&self) -> FilterState {
        self.state.lock().filter.clone()
    }

    pub fn set_filter(&self, filter: FilterState) {
        self.state.lock().filter = filter;
    }

    /// Runs the current filter against the server and jumps to page 1.
    #[instrument(skip(self))]
    pub async fn search(&self) -> Result<(), NotesError> {
        let token = self.session.token()?;
        let _flight = self.begin()?;
        let query = self.state.lock().filter.to_query();

        match self.remote.list(&token, Some(&query)).await {
            Ok(notes) => {
                debug!(
                    count = notes.len(),
                    title = %query.title,
                    unfiltered = query.is_unfiltered(),
                    "search finished"
                );
                let mut state = self.state.lock();
                state.notes = notes;
                state.loaded = true;
                state.page = 1;
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "search failed");
                Err(self.session.on_failure(err))
            }
        }
    }

    pub async fn search_with(&self, filter: FilterState) -> Result<(), NotesError> {
        self.set_filter(filter);
        self.search().await
    }

    /// Empties the filter and reloads everything. The current page is left
    /// as it was.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), NotesError> {
        self.state.lock().filter.reset();
        self.fetch_all().await
    }

    // ---------------------------------------------------------------------
    // Paginator
    // ---------------------------------------------------------------------

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page(&self) -> usize {
        self.state.lock().page
    }

    pub fn window(&self) -> PageWindow {
        let state = self.state.lock();
        PageWindow::new(state.page, self.page_size, state.notes.len())
    }

    pub fn total_pages(&self) -> usize {
        self.window().total_pages()
    }

    pub fn visible(&self) -> Vec<Note> {
        let state = self.state.lock();
        let window = PageWindow::new(state.page, self.page_size, state.notes.len());
        window.slice(&state.notes).to_vec()
    }

    pub fn next_page(&self) -> usize {
        let mut state = self.state.lock();
        let window = PageWindow::new(state.page, self.page_size, state.notes.len());
        state.page = window.next();
        state.page
    }

    pub fn prev_page(&self) -> usize {
        let mut state = self.state.lock();
        let window = PageWindow::new(state.page, self.page_size, state.notes.len());
        state.page = window.prev();
        state.page
    }

    /// Jumps to `page` when it exists. Returns whether the page changed.
    pub fn go_to_page(&self, page: usize) -> bool {
        let mut state = self.state.lock();
        let total = PageWindow::new(state.page, self.page_size, state.notes.len()).total_pages();
        if page == 0 || page > total {
            debug!(page, total, "ignoring out-of-range page");
            return false;
        }
        state.page = page;
        true
    }

    // ---------------------------------------------------------------------
    // Session
    // ---------------------------------------------------------------------

    /// Forgets the token and the whole view state, then goes to login.
    #[instrument(skip(self))]
    pub fn logout(&self) -> anyhow::Result<()> {
        self.session.logout()?;
        *self.state.lock() = CollectionState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use super::NoteController;
    use crate::error::NotesError;
    use crate::remote::MemoryNotesRemote;
    use crate::session::{MemoryTokenStore, RecordingNavigator, SessionGuard, SessionPolicy};

    type Controller =
        NoteController<MemoryNotesRemote, Arc<MemoryTokenStore>, Arc<RecordingNavigator>>;

    async fn controller_with(count: usize) -> Controller {
        let remote = MemoryNotesRemote::new("tok");
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        for i in 0..count {
            remote
                .seed(&format!("note {i}"), "body", base + Duration::days(i as i64))
                .await;
        }
        let session = SessionGuard::new(
            Arc::new(MemoryTokenStore::with_token("tok")),
            Arc::new(RecordingNavigator::new()),
            SessionPolicy::AuthOnly,
        );
        NoteController::new(remote, session)
    }

    #[tokio::test]
    async fn loading_is_cleared_after_failure() {
        let controller = controller_with(1).await;
        controller
            .remote()
            .fail_next(crate::remote::RemoteError::Transport("down".to_string()));

        let err = controller.fetch_all().await.expect_err("fetch should fail");
        assert!(matches!(err, NotesError::Remote(_)));
        assert!(!controller.is_loading());
    }

    #[tokio::test]
    async fn go_to_page_stays_in_bounds() {
        let controller = controller_with(7).await;
        controller.fetch_all().await.expect("fetch");

        assert!(!controller.go_to_page(0));
        assert!(!controller.go_to_page(3));
        assert!(controller.go_to_page(2));
        assert_eq!(controller.visible().len(), 2);
    }

    #[tokio::test]
    async fn select_for_edit_requires_known_note() {
        let controller = controller_with(1).await;
        let err = controller
            .select_for_edit(&jotter_shared::NoteId::new("missing"))
            .expect_err("unknown note");
        assert!(matches!(err, NotesError::UnknownNote(_)));
        assert!(matches!(
            controller.set_edit_field("title", "x"),
            Err(NotesError::NotEditing)
        ));
    }

    #[tokio::test]
    async fn empty_search_still_counts_as_loaded() {
        let controller = controller_with(3).await;
        assert!(!controller.is_loaded());

        controller
            .search_with(crate::filter::FilterState {
                title: "nothing matches".to_string(),
                ..Default::default()
            })
            .await
            .expect("search");
        assert!(controller.is_loaded());
        assert!(controller.notes().is_empty());

        controller.logout().expect("logout");
        assert!(!controller.is_loaded());
    }

    #[tokio::test]
    async fn page_size_is_at_least_one() {
        let controller = controller_with(3).await.with_page_size(0);
        controller.fetch_all().await.expect("fetch");
        assert_eq!(controller.page_size(), 1);
        assert_eq!(controller.total_pages(), 3);
    }
}
