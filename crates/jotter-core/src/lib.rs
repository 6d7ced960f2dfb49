pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod datastore;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod paginate;
pub mod remote;
pub mod render;
pub mod session;
pub mod state;

use std::ffi::OsString;
use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::commands::{
  App,
  AppController,
  Flow,
  Mode,
  TerminalNavigator
};
use crate::remote::NotesRemote;
use crate::session::{
  CredentialStore,
  SessionGuard
};

const OFFLINE_TOKEN: &str = "offline";

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    offline = cli.offline,
    "starting jotter CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.jotterrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );
  debug!(
    files = ?cfg.loaded_files(),
    "configuration loaded"
  );

  let (remote, credentials): (
    Arc<dyn NotesRemote>,
    Arc<dyn CredentialStore>
  ) = if cli.offline {
    info!("running against in-memory notes");
    (
      Arc::new(
        remote::MemoryNotesRemote::new(
          OFFLINE_TOKEN
        )
      ),
      Arc::new(
        session::MemoryTokenStore::with_token(
          OFFLINE_TOKEN
        )
      )
    )
  } else {
    let data_dir = cfg
      .data_dir(cli.data.as_deref())
      .context(
        "failed to resolve data \
         directory"
      )?;

    let store =
      datastore::DataStore::open(
        &data_dir
      )
      .with_context(|| {
        format!(
          "failed to open datastore at \
           {}",
          data_dir.display()
        )
      })?;

    (
      Arc::new(
        remote::HttpNotesRemote::from_config(
          &cfg
        )?
      ),
      Arc::new(store)
    )
  };

  let session = SessionGuard::new(
    credentials,
    TerminalNavigator::new(),
    cfg.session_policy()?
  );
  debug!(
    policy = ?session.policy(),
    "session policy"
  );
  let controller: AppController =
    controller::NoteController::new(
      remote, session
    )
    .with_page_size(cfg.page_size()?);
  let app = App::new(
    controller,
    render::Renderer::new(&cfg)?
  );

  let inv =
    cli::Invocation::parse(cli.rest)?;

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  runtime.block_on(async {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let flow = commands::dispatch(
      &app,
      &inv,
      Mode::OneShot,
      &mut out
    )
    .await?;

    if flow == Flow::EnterShell {
      let stdin = std::io::stdin();
      commands::run_shell(
        &app,
        stdin.lock(),
        &mut out
      )
      .await?;
    }
    out.flush()?;
    anyhow::Ok(())
  })?;

  info!("done");
  Ok(())
}
