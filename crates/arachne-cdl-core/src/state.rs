//! Persisted download state.
//!
//! Stored as JSON under `$XDG_STATE_HOME/arachne-cdl/state.json`. A missing
//! or unreadable file is treated as a fresh installation.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// What the downloader remembers between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadState {
    /// Time of the last successful download.
    pub last_success: Option<DateTime<Utc>>,
    /// UUID of the NetworkManager connection owned by this tool.
    pub managed_connection_id: Option<String>,
}

impl DownloadState {
    /// The managed connection id, ignoring an empty string.
    pub fn managed_id(&self) -> Option<&str> {
        self.managed_connection_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

/// JSON file holding [`DownloadState`]. Reads and writes are serialized.
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// State file at the XDG location.
    pub fn at_default_location() -> Self {
        Self::new(default_state_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state, falling back to defaults on any error.
    pub fn load(&self) -> DownloadState {
        let _guard = self.lock.lock();
        self.read_unlocked()
    }

    pub fn save(&self, state: &DownloadState) -> Result<()> {
        let _guard = self.lock.lock();
        self.write_unlocked(state)
    }

    /// Load, modify and save while holding the lock.
    pub fn update<F>(&self, f: F) -> Result<DownloadState>
    where
        F: FnOnce(&mut DownloadState),
    {
        let _guard = self.lock.lock();
        let mut state = self.read_unlocked();
        f(&mut state);
        self.write_unlocked(&state)?;
        Ok(state)
    }

    fn read_unlocked(&self) -> DownloadState {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}", self.path.display());
                return DownloadState::default();
            }
            Err(e) => {
                warn!("Failed to read state file {}: {}", self.path.display(), e);
                return DownloadState::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring corrupt state file {}: {}", self.path.display(), e);
            DownloadState::default()
        })
    }

    fn write_unlocked(&self, state: &DownloadState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, json)?;
        debug!("Saved state to {}", self.path.display());
        Ok(())
    }
}

/// `$XDG_STATE_HOME/arachne-cdl/state.json`, or `~/.local/state/...`.
pub fn default_state_path() -> PathBuf {
    let base = env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .or_else(|| env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/state")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("arachne-cdl").join("state.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path().join("state.json"));
        assert_eq!(file.load(), DownloadState::default());
    }

    #[test]
    fn test_save_creates_parent_and_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path().join("nested/dir/state.json"));
        let state = DownloadState {
            last_success: Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()),
            managed_connection_id: Some("b6f1c2d4".to_string()),
        };

        file.save(&state).unwrap();

        assert_eq!(file.load(), state);
    }

    #[test]
    fn test_corrupt_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(StateFile::new(path).load(), DownloadState::default());
    }

    #[test]
    fn test_update_preserves_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path().join("state.json"));
        file.save(&DownloadState {
            last_success: None,
            managed_connection_id: Some("keep".to_string()),
        })
        .unwrap();

        let now = Utc::now();
        let updated = file.update(|s| s.last_success = Some(now)).unwrap();

        assert_eq!(updated.managed_id(), Some("keep"));
        assert_eq!(file.load().last_success, Some(now));
    }

    #[test]
    fn test_empty_managed_id_is_none() {
        let state = DownloadState {
            last_success: None,
            managed_connection_id: Some(String::new()),
        };
        assert_eq!(state.managed_id(), None);
    }
}
