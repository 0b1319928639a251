//! Credential store adapter: the persist hook and loader for `creds.json`.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use super::types::CredentialBundle;
use super::workspace::Workspace;
use crate::kernel::CredentialState;

#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn for_workspace(workspace: &Workspace) -> Self {
        Self {
            path: workspace.credentials_path(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted credentials, or a fresh document when nothing is stored yet.
    pub async fn load(&self) -> Result<CredentialState> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("Corrupt credentials file {}", self.path.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(CredentialState::fresh()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read credentials {}", self.path.display())),
        }
    }

    /// Persist `state`, replacing the previous file atomically.
    pub async fn save(&self, state: &CredentialState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state).context("Failed to serialize credentials")?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(bytes = bytes.len(), "credentials persisted");
        Ok(())
    }

    /// Current credential bytes, exactly as stored.
    pub async fn read_bundle(&self) -> Result<CredentialBundle> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read credentials {}", self.path.display()))?;
        Ok(CredentialBundle::new(bytes))
    }
}
