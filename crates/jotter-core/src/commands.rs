use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use jotter_shared::NoteId;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::cli::{Invocation, split_words};
use crate::controller::NoteController;
use crate::error::NotesError;
use crate::filter::FilterState;
use crate::remote::NotesRemote;
use crate::render::Renderer;
use crate::session::{CredentialStore, Navigator, Route};
use crate::state::{DESCRIPTION_FIELD, TITLE_FIELD};

pub type AppController =
    NoteController<Arc<dyn NotesRemote>, Arc<dyn CredentialStore>, TerminalNavigator>;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "list", "show", "add", "edit", "delete", "search", "clear", "next", "prev", "page",
        "refresh", "filter", "draft", "create", "select", "set", "save", "cancel", "token",
        "logout", "shell", "quit", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Navigator for a terminal session: there is no page to switch to, so a
/// redirect to login becomes a hint on stderr.
#[derive(Debug, Default)]
pub struct TerminalNavigator {
    current: Mutex<Option<Route>>,
}

impl TerminalNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Route> {
        *self.current.lock()
    }
}

impl Navigator for TerminalNavigator {
    fn go_to(&self, route: Route) {
        info!(%route, "navigating");
        if route == Route::Login {
            eprintln!("Not signed in. Store a token with `jotter token <value>`.");
        }
        *self.current.lock() = Some(route);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One command per process; every read starts with a fetch.
    OneShot,
    /// A long-lived view; state carries over between lines.
    Shell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// A one-shot `shell` command; the caller takes over stdin.
    EnterShell,
    Quit,
}

pub struct App {
    pub controller: AppController,
    pub renderer: Renderer,
}

impl App {
    pub fn new(controller: AppController, renderer: Renderer) -> Self {
        Self {
            controller,
            renderer,
        }
    }

    fn print_page<W: Write + ?Sized>(&self, out: &mut W) -> anyhow::Result<()> {
        let state = self.controller.snapshot();
        let visible = self.controller.visible();
        self.renderer
            .write_page(out, &visible, self.controller.window(), state.editing())
    }

    fn report_alert(&self) {
        if let Some(alert) = self.controller.take_alert() {
            self.renderer.alert(&alert);
        }
    }
}

#[instrument(skip(app, out, inv), fields(command = %inv.command))]
pub async fn dispatch<W: Write + ?Sized>(
    app: &App,
    inv: &Invocation,
    mode: Mode,
    out: &mut W,
) -> anyhow::Result<Flow> {
    debug!(positional = ?inv.positional, named = ?inv.named, ?mode, "dispatching command");
    let ctl = &app.controller;

    match inv.command.as_str() {
        "list" => {
            ctl.fetch_all().await?;
            if let Some(page) = inv.page()?
                && !ctl.go_to_page(page)
            {
                warn!(page, "page out of range");
            }
            app.print_page(out)?;
        }
        "refresh" => {
            ctl.fetch_all().await?;
            app.print_page(out)?;
        }
        "show" => {
            ensure_loaded(ctl, mode).await?;
            let id = resolve_target(ctl, inv)?;
            let note = ctl
                .snapshot()
                .find(&id)
                .cloned()
                .ok_or(NotesError::UnknownNote(id))?;
            app.renderer.write_note_info(&mut *out, &note)?;
        }
        "add" => {
            apply_form_args(inv, |name, value| {
                ctl.set_create_field(name, value);
                Ok(())
            })?;
            let result = ctl.create().await;
            app.report_alert();
            result?;
            writeln!(out, "Created note.")?;
            if mode == Mode::Shell {
                app.print_page(out)?;
            }
        }
        "draft" => {
            apply_form_args(inv, |name, value| {
                ctl.set_create_field(name, value);
                Ok(())
            })?;
            let draft = ctl.snapshot().draft_create;
            writeln!(out, "draft: title={:?} description={:?}", draft.title(), draft.description())?;
        }
        "create" => {
            let result = ctl.create().await;
            app.report_alert();
            result?;
            writeln!(out, "Created note.")?;
            app.print_page(out)?;
        }
        "edit" => {
            ensure_loaded(ctl, mode).await?;
            let id = resolve_target(ctl, inv)?;
            ctl.select_for_edit(&id)?;
            apply_form_args(inv, |name, value| Ok(ctl.set_edit_field(name, value)?))?;
            ctl.update().await?;
            writeln!(out, "Updated note {id}.")?;
            if mode == Mode::Shell {
                app.print_page(out)?;
            }
        }
        "select" => {
            ensure_loaded(ctl, mode).await?;
            let id = resolve_target(ctl, inv)?;
            ctl.select_for_edit(&id)?;
            app.print_page(out)?;
        }
        "set" => {
            apply_form_args(inv, |name, value| Ok(ctl.set_edit_field(name, value)?))?;
        }
        "save" => {
            ctl.update().await?;
            writeln!(out, "Saved.")?;
            app.print_page(out)?;
        }
        "cancel" => {
            ctl.cancel_edit();
            app.print_page(out)?;
        }
        "delete" => {
            ensure_loaded(ctl, mode).await?;
            let id = resolve_target(ctl, inv)?;
            ctl.delete(&id).await?;
            writeln!(out, "Deleted note {id}.")?;
            if mode == Mode::Shell {
                app.print_page(out)?;
            }
        }
        "filter" => {
            let filter = filter_from_args(app, inv, ctl.filter())?;
            ctl.set_filter(filter.clone());
            writeln!(
                out,
                "filter: title={:?} from={:?} to={:?}",
                filter.title, filter.from_date, filter.to_date
            )?;
        }
        "search" => {
            let filter = filter_from_args(app, inv, ctl.filter())?;
            ctl.search_with(filter).await?;
            if let Some(page) = inv.page()? {
                ctl.go_to_page(page);
            }
            app.print_page(out)?;
        }
        "clear" => {
            ctl.clear().await?;
            app.print_page(out)?;
        }
        "next" => {
            ensure_loaded(ctl, mode).await?;
            ctl.next_page();
            app.print_page(out)?;
        }
        "prev" => {
            ensure_loaded(ctl, mode).await?;
            ctl.prev_page();
            app.print_page(out)?;
        }
        "page" => {
            ensure_loaded(ctl, mode).await?;
            let raw = inv
                .positional
                .first()
                .map(String::as_str)
                .or(inv.get("page"))
                .ok_or_else(|| anyhow!("usage: page <n>"))?;
            let page: usize = raw.parse().with_context(|| format!("invalid page: {raw}"))?;
            if !ctl.go_to_page(page) {
                return Err(anyhow!("page {page} does not exist"));
            }
            app.print_page(out)?;
        }
        "token" => {
            let token = inv
                .positional
                .first()
                .ok_or_else(|| anyhow!("usage: token <value>"))?;
            ctl.session().sign_in(token)?;
            writeln!(out, "Token stored.")?;
        }
        "logout" => {
            ctl.logout()?;
            writeln!(out, "Logged out.")?;
        }
        "shell" => {
            if mode == Mode::Shell {
                writeln!(out, "Already in the shell.")?;
            } else {
                return Ok(Flow::EnterShell);
            }
        }
        "quit" => return Ok(Flow::Quit),
        "help" => print_help(out)?,
        "version" => writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?,
        other => return Err(anyhow!("unknown command: {other}")),
    }

    Ok(Flow::Continue)
}

/// Reads commands line by line against one controller until `quit` or EOF.
#[instrument(skip_all)]
pub async fn run_shell<R: BufRead, W: Write + ?Sized>(
    app: &App,
    input: R,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("starting shell");
    match app.controller.fetch_all().await {
        Ok(()) => app.print_page(out)?,
        Err(err) => writeln!(out, "error: {err}")?,
    }

    for line in input.lines() {
        let line = line.context("failed reading shell input")?;
        let words = match split_words(&line) {
            Ok(words) if words.is_empty() => continue,
            Ok(words) => words,
            Err(err) => {
                writeln!(out, "error: {err}")?;
                continue;
            }
        };

        let flow = match Invocation::from_tokens(&words) {
            Ok(inv) => dispatch(app, &inv, Mode::Shell, out).await,
            Err(err) => Err(err),
        };
        match flow {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue | Flow::EnterShell) => {}
            Err(err) => writeln!(out, "error: {err:#}")?,
        }
        out.flush()?;
    }

    info!("shell finished");
    Ok(())
}

/// One-shot commands always start from a fresh copy of the collection;
/// the shell reuses whatever the last fetch or search returned, even when
/// that was nothing.
async fn ensure_loaded(ctl: &AppController, mode: Mode) -> Result<(), NotesError> {
    if mode == Mode::OneShot || !ctl.is_loaded() {
        ctl.fetch_all().await?;
    }
    Ok(())
}

/// A row number on the visible page, or a note id from the collection.
fn resolve_target(ctl: &AppController, inv: &Invocation) -> anyhow::Result<NoteId> {
    let raw = inv
        .positional
        .first()
        .ok_or_else(|| anyhow!("missing note: give a row number or an id"))?;

    if let Ok(row) = raw.parse::<usize>() {
        let visible = ctl.visible();
        if row >= 1
            && let Some(note) = visible.get(row - 1)
        {
            return Ok(note.id.clone());
        }
    }

    let id = NoteId::new(raw.as_str());
    if ctl.snapshot().find(&id).is_some() {
        Ok(id)
    } else {
        Err(NotesError::UnknownNote(id).into())
    }
}

fn apply_form_args<F>(inv: &Invocation, mut apply: F) -> anyhow::Result<()>
where
    F: FnMut(&str, &str) -> anyhow::Result<()>,
{
    for key in [TITLE_FIELD, DESCRIPTION_FIELD] {
        if let Some(value) = inv.get(key) {
            apply(key, value)?;
        }
    }
    Ok(())
}

fn filter_from_args(app: &App, inv: &Invocation, current: FilterState) -> anyhow::Result<FilterState> {
    let today = app.renderer.zone().today();
    let mut filter = if inv.named.is_empty() {
        current
    } else {
        FilterState::default()
    };
    if let Some(title) = inv.get("title") {
        filter.set_title(title);
    }
    if let Some(from) = inv.get("from") {
        filter.set_from(from, today)?;
    }
    if let Some(to) = inv.get("to") {
        filter.set_to(to, today)?;
    }
    Ok(filter)
}

fn print_help<W: Write + ?Sized>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "\
usage: jotter [options] <command> [args]

commands:
  list [page:N]                          fetch notes and show a page
  show <row|id>                          show one note in full
  add title:T description:D              create a note
  edit <row|id> [title:T] [description:D]
  delete <row|id>
  search [title:T] [from:DATE] [to:DATE] [page:N]
  token <value>                          store the bearer token
  logout                                 forget the token
  shell                                  interactive session

shell only:
  next | prev | page N | refresh | clear
  filter [title:T] [from:DATE] [to:DATE]
  draft [title:T] [description:D], create
  select <row|id>, set [title:T] [description:D], save, cancel
  quit

DATE is YYYY-MM-DD, today, yesterday, tomorrow, or an offset like -7d, +2w, -1m."
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{expand_command_abbrev, known_command_names};

    #[test]
    fn abbreviations_resolve_when_unambiguous() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("del", &known), Some("delete"));
        assert_eq!(expand_command_abbrev("ne", &known), Some("next"));
        assert_eq!(expand_command_abbrev("s", &known), None);
        assert_eq!(expand_command_abbrev("list", &known), Some("list"));
    }
}
