//! Sim-state persistence.
//!
//! Saves axis positions and encoder angles across sim restarts so a
//! development session can resume where it left off. A missing or corrupt
//! state file is logged and ignored — persistence must never block
//! startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Error type for persistence operations.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem error.
    #[error("state file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error.
    #[error("state file format error: {0}")]
    Format(#[from] serde_json::Error),

    /// State file version not understood.
    #[error("unsupported state version {0}")]
    UnsupportedVersion(u32),
}

/// Persisted state of one axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedAxisState {
    /// Axis name (matched against config on restore).
    pub name: String,
    /// Motor position in steps.
    pub position: i32,
    /// Encoder ground-truth angle in degrees.
    pub angle_deg: f64,
}

/// Persisted rig state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    /// Format version.
    pub version: u32,
    /// Per-axis state.
    pub axes: Vec<PersistedAxisState>,
}

impl PersistedState {
    /// Current format version.
    pub const CURRENT_VERSION: u32 = 1;
}

/// Loads and saves [`PersistedState`] at a fixed path.
pub struct StatePersistence {
    path: PathBuf,
}

impl StatePersistence {
    /// Create a persistence manager for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load persisted state.
    ///
    /// Returns `Ok(None)` when no state file exists.
    pub fn load(&self) -> Result<Option<PersistedState>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let state: PersistedState = serde_json::from_str(&content)?;
        if state.version != PersistedState::CURRENT_VERSION {
            return Err(PersistenceError::UnsupportedVersion(state.version));
        }
        debug!("loaded sim state for {} axes", state.axes.len());
        Ok(Some(state))
    }

    /// Load persisted state, degrading to `None` on any failure.
    pub fn load_or_warn(&self) -> Option<PersistedState> {
        match self.load() {
            Ok(state) => state,
            Err(e) => {
                warn!("ignoring sim state file {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Save the given state, replacing any previous file.
    pub fn save(&self, state: &PersistedState) -> Result<(), PersistenceError> {
        let content = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, content)?;
        debug!("saved sim state for {} axes", state.axes.len());
        Ok(())
    }

    /// The file path this manager uses.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
