use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

use crate::session::CredentialStore;

/// Local state kept between runs. Only the credential token lives here;
/// notes are never persisted on the client.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub token_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let token_path = data_dir.join("token");

        info!(
            data_dir = %data_dir.display(),
            token = %token_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            token_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_token(&self) -> anyhow::Result<Option<String>> {
        if !self.token_path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.token_path)
            .with_context(|| format!("failed reading {}", self.token_path.display()))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_string()))
        }
    }

    #[tracing::instrument(skip(self, token))]
    pub fn save_token(&self, token: &str) -> anyhow::Result<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(anyhow!("token cannot be empty"));
        }
        write_atomic(&self.token_path, token).context("failed to save token")
    }

    #[tracing::instrument(skip(self))]
    pub fn remove_token(&self) -> anyhow::Result<()> {
        if self.token_path.exists() {
            fs::remove_file(&self.token_path)
                .with_context(|| format!("failed removing {}", self.token_path.display()))?;
        }
        Ok(())
    }
}

impl CredentialStore for DataStore {
    fn get_token(&self) -> Option<String> {
        match self.load_token() {
            Ok(token) => token,
            Err(err) => {
                error!(error = %err, "failed to read stored token");
                None
            }
        }
    }

    fn set_token(&self, token: &str) -> anyhow::Result<()> {
        self.save_token(token)
    }

    fn clear_token(&self) -> anyhow::Result<()> {
        self.remove_token()
    }
}

#[tracing::instrument(skip(path, payload))]
fn write_atomic(path: &Path, payload: &str) -> anyhow::Result<()> {
    debug!(file = %path.display(), "writing atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    writeln!(temp, "{payload}")?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
