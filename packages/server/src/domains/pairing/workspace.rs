//! Per-session scratch directories for authentication material.
//!
//! Every request gets `<root>/<session_id>/`, created empty and removed on
//! every controller exit path. Dropping an unreleased [`Workspace`] removes
//! it as well, so an aborted task cannot leak credentials to disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::errors::PairingError;
use super::types::SessionId;

/// File the messaging library's credential document is stored in.
pub const CREDENTIALS_FILE: &str = "creds.json";

#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    root: PathBuf,
}

impl WorkspaceRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if missing.
    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// Remove leftover session directories from a previous process.
    pub fn purge_stale(&self) -> io::Result<usize> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Create a fresh, empty workspace for `session_id`.
    ///
    /// Fails if the directory already exists: identifiers are unique per
    /// request, so an existing directory means something else owns it.
    pub fn acquire(&self, session_id: &SessionId) -> Result<Workspace, PairingError> {
        let dir = self.root.join(session_id.as_str());

        fs::create_dir_all(&self.root).map_err(PairingError::Allocation)?;
        fs::create_dir(&dir).map_err(PairingError::Allocation)?;

        debug!(session_id = %session_id, path = %dir.display(), "workspace acquired");
        Ok(Workspace {
            session_id: session_id.clone(),
            dir,
            released: false,
        })
    }

    /// Handle for `session_id` without touching the disk.
    pub fn handle_for(&self, session_id: &SessionId) -> Workspace {
        Workspace {
            session_id: session_id.clone(),
            dir: self.root.join(session_id.as_str()),
            released: false,
        }
    }
}

#[derive(Debug)]
pub struct Workspace {
    session_id: SessionId,
    dir: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Remove the directory and everything in it. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!(session_id = %self.session_id, "workspace released"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                session_id = %self.session_id,
                path = %self.dir.display(),
                error = %e,
                "failed to remove workspace"
            ),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.released {
            warn!(session_id = %self.session_id, "workspace dropped without release");
            self.release();
        }
    }
}
