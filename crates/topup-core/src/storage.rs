//! Files kept in the data directory: `state.json` and `cookies.json`.

use crate::page::SessionState;
use crate::types::{PersistedState, StoreError};
use std::fs;
use std::path::{Path, PathBuf};

pub const STATE_FILE: &str = "state.json";
pub const COOKIE_FILE: &str = "cookies.json";
/// Touched when the agent starts; the health probe's grace window hangs off it.
pub const START_MARKER_FILE: &str = "agent.started";

/// Write `bytes` next to `path` and rename over it.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// The last observed volume.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state, falling back to zero on a missing or corrupt file.
    pub fn load(&self) -> PersistedState {
        match self.read() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("state file {} unusable ({e}), resetting", self.path.display());
                PersistedState::default()
            }
        }
    }

    /// Like [`load`](Self::load), but rewrites an unusable file with the default.
    pub fn load_or_reset(&self) -> PersistedState {
        match self.read() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("state file {} unusable ({e}), resetting", self.path.display());
                let state = PersistedState::default();
                if let Err(e) = self.save(&state) {
                    tracing::error!("could not recreate {}: {e}", self.path.display());
                }
                state
            }
        }
    }

    fn read(&self) -> Result<PersistedState, StoreError> {
        let raw = fs::read_to_string(&self.path)?;
        let state: PersistedState = serde_json::from_str(&raw)?;
        if !state.is_valid() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid last_gb {}", state.last_quantity),
            )));
        }
        Ok(state)
    }

    pub fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        let json = serde_json::to_vec(state)?;
        write_atomic(&self.path, &json)
    }
}

/// Persisted cookie jar for skipping the interactive login.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(COOKIE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<SessionState>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    pub fn save(&self, state: &SessionState) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.path, &json)
    }

    /// Delete the saved jar. Missing files are fine.
    pub fn discard(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Record that the agent has started.
pub fn touch_start_marker(data_dir: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(data_dir)?;
    fs::write(
        data_dir.join(START_MARKER_FILE),
        std::process::id().to_string(),
    )?;
    Ok(())
}
