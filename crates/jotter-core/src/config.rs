use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::paginate::DEFAULT_PAGE_SIZE;
use crate::remote::http::DEFAULT_BASE_URL;
use crate::session::SessionPolicy;

const RC_ENV_VAR: &str = "JOTTERRC";
const RC_FILE_NAME: &str = ".jotterrc";
const DEFAULT_DATA_DIR: &str =
  "~/.jotter";

/// Every key jotter reads, with its
/// default.
const DEFAULTS: &[(&str, &str)] = &[
  ("api.base_url", DEFAULT_BASE_URL),
  ("data.location", DEFAULT_DATA_DIR),
  ("page.size", "5"),
  ("session.invalidate", "auth"),
  ("display.timezone", "local"),
  ("color", "on")
];

#[derive(Debug, Clone)]
pub struct Config {
  map:          HashMap<String, String>,
  loaded_files: Vec<PathBuf>
}

/// One meaningful line of a jotterrc.
#[derive(Debug, PartialEq, Eq)]
enum RcLine<'a> {
  Include(&'a str),
  Setting(&'a str, &'a str)
}

impl Default for Config {
  fn default() -> Self {
    Self {
      map:          DEFAULTS
        .iter()
        .map(|(k, v)| {
          (k.to_string(), v.to_string())
        })
        .collect(),
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    match rc_override
      .map(Path::to_path_buf)
      .or_else(find_rc_file)
    {
      | Some(path) => {
        info!(jotterrc = %path.display(), "loading jotterrc");
        cfg.read_file(&path)?;
      }
      | None => {
        debug!("no jotterrc; defaults only")
      }
    }

    Ok(cfg)
  }

  /// `rc.key` and plain `key` both
  /// name `key`.
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k);
      self.set(key, v.trim());
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn loaded_files(
    &self
  ) -> &[PathBuf] {
    &self.loaded_files
  }

  pub fn page_size(
    &self
  ) -> anyhow::Result<usize> {
    let Some(raw) = self.get("page.size")
    else {
      return Ok(DEFAULT_PAGE_SIZE);
    };
    match raw.trim().parse::<usize>() {
      | Ok(0) => {
        Err(anyhow!(
          "page.size must be at least 1"
        ))
      }
      | Ok(size) => Ok(size),
      | Err(_) => {
        Err(anyhow!(
          "invalid page.size: {raw}"
        ))
      }
    }
  }

  pub fn session_policy(
    &self
  ) -> anyhow::Result<SessionPolicy> {
    match self.get("session.invalidate") {
      | Some(raw) => raw.parse(),
      | None => {
        Ok(SessionPolicy::default())
      }
    }
  }

  /// Directory for the stored token:
  /// `--data` wins over
  /// `data.location`. Created on
  /// demand.
  #[tracing::instrument(skip(self))]
  pub fn data_dir(
    &self,
    override_dir: Option<&Path>
  ) -> anyhow::Result<PathBuf> {
    let dir = match override_dir {
      | Some(path) => path.to_path_buf(),
      | None => {
        let raw = self
          .get("data.location")
          .unwrap_or_else(|| {
            DEFAULT_DATA_DIR.to_string()
          });
        expand_tilde(&raw)
      }
    };

    if !dir.exists() {
      info!(dir = %dir.display(), "creating data directory");
      fs::create_dir_all(&dir)
        .with_context(|| {
          format!(
            "failed to create {}",
            dir.display()
          )
        })?;
    }
    Ok(dir)
  }

  fn set(
    &mut self,
    key: &str,
    value: &str
  ) {
    if !DEFAULTS
      .iter()
      .any(|(known, _)| *known == key)
    {
      warn!(key, "ignoring unknown config key");
      return;
    }
    trace!(key, value, "config key set");
    self
      .map
      .insert(key.to_string(), value.to_string());
  }

  fn read_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    if self
      .loaded_files
      .iter()
      .any(|seen| seen == path)
    {
      warn!(file = %path.display(), "include cycle; skipping");
      return Ok(());
    }
    let text =
      fs::read_to_string(path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    self
      .loaded_files
      .push(path.to_path_buf());

    let dir = path
      .parent()
      .unwrap_or_else(|| Path::new("."));

    for (idx, raw) in
      text.lines().enumerate()
    {
      let parsed = parse_rc_line(raw)
        .with_context(|| {
          format!(
            "{}:{}",
            path.display(),
            idx + 1
          )
        })?;
      match parsed {
        | None => {}
        | Some(RcLine::Setting(k, v)) => {
          self.set(k, v)
        }
        | Some(RcLine::Include(target)) => {
          let target =
            dir.join(expand_tilde(target));
          if target.exists() {
            self.read_file(&target)?;
          } else {
            warn!(include = %target.display(), "include file does not exist; skipping");
          }
        }
      }
    }

    Ok(())
  }
}

/// `None` for blank and comment lines.
/// A ` #` starts a trailing comment.
fn parse_rc_line(
  raw: &str
) -> anyhow::Result<Option<RcLine<'_>>>
{
  let line = raw
    .split_once(" #")
    .map_or(raw, |(body, _)| body)
    .trim();
  if line.is_empty()
    || line.starts_with('#')
  {
    return Ok(None);
  }

  if let Some(target) =
    line.strip_prefix("include ")
  {
    let target = target.trim();
    if target.is_empty() {
      return Err(anyhow!(
        "include needs a path"
      ));
    }
    return Ok(Some(RcLine::Include(
      target
    )));
  }

  let (k, v) =
    line.split_once('=').ok_or_else(
      || {
        anyhow!(
          "expected key = value, got: \
           {line}"
        )
      }
    )?;
  Ok(Some(RcLine::Setting(
    k.trim(),
    v.trim()
  )))
}

fn find_rc_file() -> Option<PathBuf> {
  if let Ok(env) =
    std::env::var(RC_ENV_VAR)
  {
    return (env != "/dev/null")
      .then(|| PathBuf::from(env));
  }
  let candidate =
    dirs::home_dir()?.join(RC_FILE_NAME);
  candidate
    .exists()
    .then_some(candidate)
}

fn expand_tilde(
  raw: impl AsRef<Path>
) -> PathBuf {
  let path = raw.as_ref();
  match (
    path.strip_prefix("~"),
    dirs::home_dir()
  ) {
    | (Ok(rest), Some(home)) => {
      home.join(rest)
    }
    | _ => path.to_path_buf()
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::{
    Config,
    RcLine,
    parse_rc_line
  };
  use crate::session::SessionPolicy;

  #[test]
  fn defaults_match_documented_values()
  {
    let cfg = Config::default();
    assert_eq!(
      cfg.get("api.base_url").as_deref(),
      Some("http://localhost:5002/api")
    );
    assert_eq!(
      cfg.page_size().expect("size"),
      5
    );
    assert_eq!(
      cfg
        .session_policy()
        .expect("policy"),
      SessionPolicy::AuthOnly
    );
    assert_eq!(
      cfg.get("color").as_deref(),
      Some("on")
    );
  }

  #[test]
  fn parses_rc_lines() {
    assert_eq!(
      parse_rc_line("  # comment")
        .expect("comment"),
      None
    );
    assert_eq!(
      parse_rc_line(
        "page.size = 3 # small"
      )
      .expect("setting"),
      Some(RcLine::Setting(
        "page.size",
        "3"
      ))
    );
    assert_eq!(
      parse_rc_line("include ~/more")
        .expect("include"),
      Some(RcLine::Include("~/more"))
    );
    assert!(
      parse_rc_line("page.size").is_err()
    );
    assert!(
      parse_rc_line("include ").is_err()
    );
  }

  #[test]
  fn loads_file_with_includes_and_comments()
   {
    let temp = tempdir().expect("tempdir");
    let extra = temp.path().join("extra");
    fs::write(
      &extra,
      "session.invalidate = any\ninclude jotterrc\n"
    )
    .expect("write include");
    let rc = temp.path().join("jotterrc");
    fs::write(
      &rc,
      "# notes client\napi.base_url = https://notes.example.com/api #prod\npage.size=10\nfavourite.colour=blue\ninclude extra\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(rc.as_path()))
      .expect("load config");

    assert_eq!(
      cfg.get("api.base_url").as_deref(),
      Some("https://notes.example.com/api")
    );
    assert_eq!(
      cfg.page_size().expect("size"),
      10
    );
    assert_eq!(
      cfg
        .session_policy()
        .expect("policy"),
      SessionPolicy::AnyFailure
    );
    assert_eq!(
      cfg.get("favourite.colour"),
      None
    );
    assert_eq!(cfg.loaded_files().len(), 2);
  }

  #[test]
  fn rejects_malformed_lines() {
    let temp = tempdir().expect("tempdir");
    let rc = temp.path().join("jotterrc");
    fs::write(&rc, "page.size\n")
      .expect("write rc");
    let err = Config::load(Some(rc.as_path()))
      .expect_err("malformed");
    assert!(
      format!("{err:#}").contains(":1")
    );
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "rc.page.size".to_string(),
      "0".to_string()
    )]);
    assert!(cfg.page_size().is_err());
  }

  #[test]
  fn data_dir_prefers_explicit_override()
  {
    let temp = tempdir().expect("tempdir");
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "data.location".to_string(),
      temp
        .path()
        .join("from-config")
        .display()
        .to_string()
    )]);

    let configured = cfg
      .data_dir(None)
      .expect("configured dir");
    assert!(
      configured.ends_with("from-config")
    );
    assert!(configured.is_dir());

    let explicit = temp.path().join("cli");
    assert_eq!(
      cfg
        .data_dir(Some(explicit.as_path()))
        .expect("explicit dir"),
      explicit
    );
  }
}
